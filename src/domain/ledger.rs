use serde::{Deserialize, Serialize};

use super::{Cents, TransactionRecord};

/// Replay an account's audit trail: the signed sum of all records.
/// For a consistent ledger this equals `balance - initial_balance`.
pub fn replay_balance(records: &[TransactionRecord]) -> Cents {
    records
        .iter()
        .fold(0, |balance, record| balance + record.signed_amount())
}

/// Income/expense totals across an account's full history.
/// Income = deposits + incoming transfers; expense = withdrawals +
/// outgoing transfers. Both are non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analytics {
    pub income: Cents,
    pub expense: Cents,
}

/// Compute analytics from a list of records. The repository computes the
/// same aggregate in SQL; this is the in-memory reference used by tests
/// and by callers that already hold the records.
pub fn compute_analytics(records: &[TransactionRecord]) -> Analytics {
    records.iter().fold(
        Analytics {
            income: 0,
            expense: 0,
        },
        |mut acc, record| {
            if record.kind.is_credit() {
                acc.income += record.amount;
            } else {
                acc.expense += record.amount;
            }
            acc
        },
    )
}
