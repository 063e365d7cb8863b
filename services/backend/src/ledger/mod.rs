//! Ledger core: the only code that mutates balances

pub mod audit;
pub mod engine;
pub mod retry;
pub mod rules;

pub use engine::{LedgerEngine, Settlement};
pub use retry::CommitRetryPolicy;
