//! Authenticated wallet history.

mod service;

pub use service::{recover_signer, HistoryError, HistoryService};
