//! Case rows for both origins and the operations on them.

pub mod controller;
pub mod model;
pub mod patch;

pub use controller::{CaseFilter, check_version, get, list};
pub(crate) use controller::{create, delete, update};
pub use model::{
    AdjudicationCase, CaseHeader, CaseRecord, FrozenSnapshot, NewCase, ScrutinyCase,
};
pub use patch::CasePatch;
