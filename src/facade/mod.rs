pub mod service;
pub mod source;

pub use service::CaseService;
pub use source::DocumentSource;
