//! Redis key layout for the ledger
//!
//! All keys of one user share the `{user_id}` hash tag so a commit script
//! touches a single cluster slot.

const BALANCE_PREFIX: &str = "ledger:balance:";
const TXLOG_PREFIX: &str = "ledger:txlog:";
const WITHDRAWALS_PREFIX: &str = "ledger:withdrawals:";

/// Hash of request id to owning user, for admin lookups by id
const WITHDRAWAL_OWNER_INDEX: &str = "ledger:withdrawal_owner";

/// Balance hash, carries the optimistic `version`
pub fn balance_key(user_id: &str) -> String {
    format!("{}{{{}}}", BALANCE_PREFIX, user_id)
}

/// Append-only list of transaction JSON, oldest first
pub fn txlog_key(user_id: &str) -> String {
    format!("{}{{{}}}", TXLOG_PREFIX, user_id)
}

/// Hash of request id to request JSON
pub fn withdrawals_key(user_id: &str) -> String {
    format!("{}{{{}}}", WITHDRAWALS_PREFIX, user_id)
}

pub fn withdrawal_owner_key() -> &'static str {
    WITHDRAWAL_OWNER_INDEX
}
