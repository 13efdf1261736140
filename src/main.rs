use anyhow::{Context, Result, anyhow};
use casekeeper::{
    CaseFilter, CaseId, CaseService, DownstreamSeed, FinalizeRequest, NewCase, OriginType,
    RegisterDraft, SaveOutcome, SkipGuards, Stage, StoreConfig, Taxpayer,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "casekeeper")]
#[command(about = "Case lifecycle store for tax proceedings")]
struct Cli {
    /// Data directory; overrides CASEKEEPER_DATA_DIR
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a case at Intake
    Create {
        #[arg(long)]
        origin: OriginType,
        #[arg(long)]
        gstin: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        trade_name: Option<String>,
        #[arg(long)]
        year: String,
        /// Allow the direct Intake -> Notice Drafted edge
        #[arg(long)]
        bypass_intimation: bool,
        /// Initial details as a JSON object
        #[arg(long)]
        details: Option<String>,
    },
    Show {
        id: CaseId,
    },
    List {
        #[arg(long)]
        origin: Option<OriginType>,
        #[arg(long)]
        stage: Option<Stage>,
        #[arg(long)]
        gstin: Option<String>,
    },
    /// Move a case to another stage (name or numeric code)
    Transition {
        id: CaseId,
        stage: Stage,
        #[arg(long)]
        expect: Option<u64>,
    },
    Finalize {
        id: CaseId,
        #[arg(long)]
        actor: String,
        /// Office communication reference, e.g. 12/2026
        #[arg(long)]
        primary: String,
        /// Case document reference
        #[arg(long)]
        secondary: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        issued_on: NaiveDate,
        #[arg(long)]
        section: Option<String>,
        #[arg(long)]
        officer: Option<String>,
    },
    /// Save a draft snapshot from a JSON file
    Snapshot {
        id: CaseId,
        file: PathBuf,
    },
    History {
        id: CaseId,
    },
    Checkpoint,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = StoreConfig::from_env().context("Invalid store configuration")?;
    if let Some(dir) = cli.data_dir {
        config = config.data_dir(dir);
    }
    let service = CaseService::open(&config).context("Failed to open case store")?;

    match cli.command {
        Command::Create {
            origin,
            gstin,
            name,
            trade_name,
            year,
            bypass_intimation,
            details,
        } => {
            let mut taxpayer = Taxpayer::new(&gstin, &name);
            if let Some(trade_name) = trade_name {
                taxpayer = taxpayer.trade_name(&trade_name);
            }
            let mut new_case = NewCase::new(origin, taxpayer, &year).skip_guards(SkipGuards {
                bypass_intimation,
            });
            if let Some(details) = details {
                let details = serde_json::from_str(&details).context("--details is not valid JSON")?;
                new_case = new_case.details(details);
            }
            let id = service.create(new_case).await?;
            println!("{}", id);
        }
        Command::Show { id } => {
            let record = service.get(id).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::List {
            origin,
            stage,
            gstin,
        } => {
            let filter = CaseFilter {
                origin,
                stage,
                gstin,
                ..Default::default()
            };
            for record in service.list(&filter).await? {
                let header = record.header();
                println!(
                    "{}  {:<12}  {:<24}  v{}  {}  {}",
                    record.id(),
                    record.origin(),
                    record.status(),
                    record.version(),
                    header.taxpayer.gstin,
                    header.financial_year.as_str()
                );
            }
        }
        Command::Transition { id, stage, expect } => {
            let record = match expect {
                Some(version) => service.transition_expecting(id, stage, version).await?,
                None => service.transition(id, stage).await?,
            };
            println!("{} -> {} (version {})", id, record.stage(), record.version());
        }
        Command::Finalize {
            id,
            actor,
            primary,
            secondary,
            subject,
            issued_on,
            section,
            officer,
        } => {
            let request = FinalizeRequest::new(
                &actor,
                RegisterDraft::new(&primary, &subject, issued_on),
                RegisterDraft::new(&secondary, &subject, issued_on),
            )
            .downstream(DownstreamSeed {
                section,
                proper_officer: officer,
                ..Default::default()
            });
            let downstream = service.finalize(id, request).await?;
            println!("finalized {}; adjudication case {}", id, downstream);
        }
        Command::Snapshot { id, file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read '{}'", file.display()))?;
            let blob = serde_json::from_str(&raw)
                .with_context(|| format!("'{}' is not valid JSON", file.display()))?;
            match service.save_snapshot(id, blob).await? {
                SaveOutcome::Unchanged => println!("unchanged"),
                SaveOutcome::Stored { sequence, pruned } => {
                    println!("stored #{} (pruned {})", sequence, pruned)
                }
            }
        }
        Command::History { id } => {
            for entry in service.stage_history(id).await? {
                let from = entry
                    .from
                    .map(|stage| stage.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{}  {} -> {}  v{}", entry.at.to_rfc3339(), from, entry.to, entry.version);
            }
        }
        Command::Checkpoint => {
            if !service.store().is_persistent() {
                return Err(anyhow!("No data directory configured; nothing to checkpoint"));
            }
            service.checkpoint().await?;
            println!("checkpoint written");
        }
    }
    Ok(())
}
