pub mod ledger_store;
pub mod memory_ledger_store;
pub mod postgres_ledger_store;
pub mod redis_ledger_store;

pub use ledger_store::{LedgerCommit, LedgerStore, LedgerTx, WithdrawalTransition};
pub use memory_ledger_store::MemoryLedgerStore;
pub use postgres_ledger_store::PostgresLedgerStore;
pub use redis_ledger_store::RedisLedgerStore;
