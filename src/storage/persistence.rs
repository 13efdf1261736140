//! Write-ahead log and snapshot checkpoints for the case tables.
//!
//! A committed transaction is logged as `Begin`, its changes in order, then
//! `Commit`. Recovery loads the last snapshot and replays only transactions
//! whose `Commit` marker made it to disk, so a torn write drops the whole
//! transaction rather than part of it.

use super::tables::{TableCounts, Tables};
use crate::core::{CaseError, Result, Timestamp, now};
use crate::transaction::{Change, TransactionId};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;
use tracing::{Level, event};

const WAL_FILE: &str = "casekeeper.wal";
const SNAPSHOT_FILE: &str = "casekeeper.snapshot";
const SNAPSHOT_FORMAT_VERSION: u32 = 1;
pub const DEFAULT_CHECKPOINT_THRESHOLD: usize = 1000;

// ============================================================================
// WAL Entry Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WalEntry {
    Begin(u64),
    Change(Change),
    Commit(u64),
}

// ============================================================================
// Database Snapshot
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: u32,
    pub tables: Tables,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub created_at: Timestamp,
    pub counts: TableCounts,
}

impl DatabaseSnapshot {
    pub fn new(tables: Tables) -> Self {
        let counts = tables.counts();
        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            tables,
            metadata: SnapshotMetadata {
                created_at: now(),
                counts,
            },
        }
    }
}

// ============================================================================
// Durability Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// fsync after every commit
    Sync,
    /// flush to the OS after every commit
    #[default]
    Async,
    /// nothing is written
    None,
}

impl FromStr for DurabilityMode {
    type Err = CaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" => Ok(DurabilityMode::Sync),
            "async" => Ok(DurabilityMode::Async),
            "none" => Ok(DurabilityMode::None),
            other => Err(CaseError::Validation(format!(
                "Unknown durability mode '{}' (expected sync, async or none)",
                other
            ))),
        }
    }
}

// ============================================================================
// WAL Manager
// ============================================================================

pub struct WalManager {
    wal_path: PathBuf,
    wal_file: Option<BufWriter<File>>,
    durability_mode: DurabilityMode,
    entries_since_checkpoint: usize,
    checkpoint_threshold: usize,
}

impl WalManager {
    pub fn new<P: AsRef<Path>>(wal_path: P, durability_mode: DurabilityMode) -> Result<Self> {
        let wal_path = wal_path.as_ref().to_path_buf();
        if let Some(parent) = wal_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let wal_file = if durability_mode != DurabilityMode::None {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&wal_path)?;
            Some(BufWriter::new(file))
        } else {
            None
        };

        Ok(Self {
            wal_path,
            wal_file,
            durability_mode,
            entries_since_checkpoint: 0,
            checkpoint_threshold: DEFAULT_CHECKPOINT_THRESHOLD,
        })
    }

    /// Append entries and flush once at the end.
    pub fn append_all(&mut self, entries: &[WalEntry]) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        let file = self
            .wal_file
            .as_mut()
            .ok_or_else(|| CaseError::Storage("WAL file not initialized".to_string()))?;

        for entry in entries {
            let serialized = rmp_serde::to_vec_named(entry)?;
            let len = serialized.len() as u32;
            file.write_all(&len.to_le_bytes())?;
            file.write_all(&serialized)?;
        }
        file.flush()?;
        if self.durability_mode == DurabilityMode::Sync {
            file.get_mut().sync_all()?;
        }
        self.entries_since_checkpoint += entries.len();
        Ok(())
    }

    #[cfg(test)]
    pub fn append(&mut self, entry: &WalEntry) -> Result<()> {
        self.append_all(std::slice::from_ref(entry))
    }

    /// Read every complete entry. A truncated final entry is treated as the
    /// end of the log.
    pub fn read_all(&self) -> Result<Vec<WalEntry>> {
        if !self.wal_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.wal_path)?;
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();
        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut data = vec![0u8; len];
            match reader.read_exact(&mut data) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    event!(
                        Level::WARN,
                        path = %self.wal_path.display(),
                        complete_entries = entries.len(),
                        "WAL ends with a torn entry; ignoring it"
                    );
                    break;
                }
                Err(e) => return Err(e.into()),
            }
            entries.push(rmp_serde::from_slice(&data)?);
        }
        Ok(entries)
    }

    pub fn clear(&mut self) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        self.wal_file = None;
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.wal_path)?;
        self.wal_file = Some(BufWriter::new(file));
        self.entries_since_checkpoint = 0;
        Ok(())
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.entries_since_checkpoint >= self.checkpoint_threshold
    }

    pub fn entries_since_checkpoint(&self) -> usize {
        self.entries_since_checkpoint
    }

    pub fn set_checkpoint_threshold(&mut self, threshold: usize) {
        self.checkpoint_threshold = threshold;
    }
}

// ============================================================================
// Snapshot Manager
// ============================================================================

pub struct SnapshotManager {
    snapshot_path: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_path: P) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }

    /// Write to a temp file in the same directory, then rename over the old
    /// snapshot, so a crash leaves either the old or the new one.
    pub fn save(&self, snapshot: &DatabaseSnapshot) -> Result<()> {
        let dir = self
            .snapshot_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&dir)?;

        let serialized = rmp_serde::to_vec_named(snapshot)?;
        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(&serialized)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.snapshot_path)
            .map_err(|e| CaseError::Storage(format!("Failed to persist snapshot: {}", e)))?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<DatabaseSnapshot>> {
        if !self.snapshot_path.exists() {
            return Ok(None);
        }
        let mut file = File::open(&self.snapshot_path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        let snapshot: DatabaseSnapshot = rmp_serde::from_slice(&data)?;
        if snapshot.version != SNAPSHOT_FORMAT_VERSION {
            return Err(CaseError::Storage(format!(
                "Unsupported snapshot format version {}",
                snapshot.version
            )));
        }
        Ok(Some(snapshot))
    }

    #[cfg(test)]
    pub fn exists(&self) -> bool {
        self.snapshot_path.exists()
    }
}

// ============================================================================
// Persistence Manager
// ============================================================================

pub struct PersistenceManager {
    wal: WalManager,
    snapshot: SnapshotManager,
    durability_mode: DurabilityMode,
}

impl PersistenceManager {
    pub fn new<P: AsRef<Path>>(data_dir: P, durability_mode: DurabilityMode) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let wal = WalManager::new(data_dir.join(WAL_FILE), durability_mode)?;
        let snapshot = SnapshotManager::new(data_dir.join(SNAPSHOT_FILE));
        Ok(Self {
            wal,
            snapshot,
            durability_mode,
        })
    }

    /// Log one committed transaction as a single framed batch.
    pub fn log_commit(&mut self, txn_id: TransactionId, changes: &[Change]) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut entries = Vec::with_capacity(changes.len() + 2);
        entries.push(WalEntry::Begin(txn_id.as_u64()));
        entries.extend(changes.iter().cloned().map(WalEntry::Change));
        entries.push(WalEntry::Commit(txn_id.as_u64()));
        self.wal.append_all(&entries)
    }

    pub fn checkpoint(&mut self, tables: &Tables) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        self.snapshot.save(&DatabaseSnapshot::new(tables.clone()))?;
        self.wal.clear()?;
        event!(Level::INFO, rows = tables.counts().total(), "checkpoint written");
        Ok(())
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.wal.needs_checkpoint()
    }

    /// Rebuild tables from the snapshot plus committed WAL transactions.
    pub fn recover(&self) -> Result<Tables> {
        let mut tables = match self.snapshot.load()? {
            Some(snapshot) => snapshot.tables,
            None => Tables::default(),
        };

        let mut pending: Option<(u64, Vec<Change>)> = None;
        let mut replayed = 0usize;
        let mut discarded = 0usize;
        for entry in self.wal.read_all()? {
            match entry {
                WalEntry::Begin(id) => {
                    if pending.replace((id, Vec::new())).is_some() {
                        discarded += 1;
                    }
                }
                WalEntry::Change(change) => match pending.as_mut() {
                    Some((_, changes)) => changes.push(change),
                    None => {
                        return Err(CaseError::Storage(
                            "WAL change outside of a transaction".into(),
                        ));
                    }
                },
                WalEntry::Commit(id) => match pending.take() {
                    Some((begun, changes)) if begun == id => {
                        for change in &changes {
                            event!(
                                Level::TRACE,
                                txn = id,
                                table = change.table_name(),
                                case_id = %change.case_id(),
                                "replaying change"
                            );
                            tables.apply(change);
                        }
                        replayed += 1;
                    }
                    _ => {
                        return Err(CaseError::Storage(format!(
                            "WAL commit marker {} has no matching begin",
                            id
                        )));
                    }
                },
            }
        }
        if pending.is_some() {
            discarded += 1;
        }

        event!(
            Level::INFO,
            replayed,
            discarded,
            cases = tables.registry_len(),
            "recovery complete"
        );
        Ok(tables)
    }

    pub fn wal(&self) -> &WalManager {
        &self.wal
    }

    pub fn wal_mut(&mut self) -> &mut WalManager {
        &mut self.wal
    }
}
