use chrono::{DateTime, Utc};

use crate::domain::{Account, AccountId, Cents};

use super::AppError;

/// The authenticated binding between a caller and one account, returned by
/// `sign_in` and passed explicitly to every operation that needs it.
/// A session is a point-in-time snapshot, not a live reference: the service
/// refreshes `balance` after each mutating operation, and re-fetches the
/// account wherever authoritative state is required. Multiple concurrent
/// sessions are just multiple values.
#[derive(Debug, Clone)]
pub struct Session {
    pub account_id: AccountId,
    pub account_number: String,
    pub name: String,
    pub balance: Cents,
    pub account_created_at: DateTime<Utc>,
    pub signed_in_at: DateTime<Utc>,
}

impl Session {
    /// Bind a session to an account snapshot.
    pub fn for_account(account: &Account) -> Self {
        Self {
            account_id: account.id,
            account_number: account.account_number.clone(),
            name: account.name.clone(),
            balance: account.balance,
            account_created_at: account.created_at,
            signed_in_at: Utc::now(),
        }
    }
}

/// For callers that hold an `Option<Session>` (one slot per connection,
/// say): maps the signed-out state to a typed failure.
pub fn require_session(session: Option<&mut Session>) -> Result<&mut Session, AppError> {
    session.ok_or(AppError::NotAuthenticated)
}
