//! Lua scripts for atomic ledger writes

/// Create the balance hash if it does not exist yet
///
/// Keys: [balance]
/// Args: [user_id, total, earned, bonus, created_at_ms, updated_at_ms]
///
/// Returns: 1 if created, 0 if the account already existed
pub const CREATE_ACCOUNT_SCRIPT: &str = r#"
local balance = KEYS[1]
if redis.call('EXISTS', balance) == 1 then
  return 0
end

redis.call('HSET', balance,
  'user_id', ARGV[1],
  'total_balance', ARGV[2],
  'earned_balance', ARGV[3],
  'bonus_balance', ARGV[4],
  'created_at_ms', ARGV[5],
  'updated_at_ms', ARGV[6],
  'version', '0'
)
return 1
"#;

/// File a withdrawal request for an existing account
///
/// Keys: [balance, withdrawals, withdrawal_owner]
/// Args: [request_id, request_json, user_id]
///
/// Returns: 1 if stored, 0 if the account does not exist
pub const INSERT_WITHDRAWAL_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return 0
end
redis.call('HSET', KEYS[2], ARGV[1], ARGV[2])
redis.call('HSET', KEYS[3], ARGV[1], ARGV[3])
return 1
"#;

/// Compare-and-swap commit of one ledger operation
///
/// Keys: [balance, txlog, withdrawals]
/// Args: [expected_version, total, earned, updated_at_ms, request_id, request_json, tx_json...]
///
/// `request_id` is empty when the commit carries no withdrawal transition.
///
/// Returns: {'ok'} | {'conflict'} | {'missing_account'} | {'missing_withdrawal'}
///          | {'processed', current_status}
pub const COMMIT_LEDGER_SCRIPT: &str = r#"
local balance = KEYS[1]
local txlog = KEYS[2]
local withdrawals = KEYS[3]
local expected = tonumber(ARGV[1])
local request_id = ARGV[5]

if redis.call('EXISTS', balance) == 0 then
  return { 'missing_account' }
end

local current = tonumber(redis.call('HGET', balance, 'version') or '0')
if current ~= expected then
  return { 'conflict' }
end

if request_id ~= '' then
  local stored = redis.call('HGET', withdrawals, request_id)
  if not stored then
    return { 'missing_withdrawal' }
  end
  local status = cjson.decode(stored)['status']
  if status ~= 'pending' then
    return { 'processed', status }
  end
  redis.call('HSET', withdrawals, request_id, ARGV[6])
end

redis.call('HSET', balance,
  'total_balance', ARGV[2],
  'earned_balance', ARGV[3],
  'updated_at_ms', ARGV[4]
)
redis.call('HINCRBY', balance, 'version', 1)

for i = 7, #ARGV do
  redis.call('RPUSH', txlog, ARGV[i])
end

return { 'ok' }
"#;
