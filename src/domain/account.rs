use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type AccountId = Uuid;

/// Account numbers are 10-digit strings drawn uniformly from this range,
/// so every generated number has exactly 10 digits.
pub const ACCOUNT_NUMBER_MIN: u64 = 1_000_000_000;
pub const ACCOUNT_NUMBER_MAX: u64 = 9_999_999_999;

/// A customer account. The `account_number` is the externally visible
/// identifier; `id` never leaves the system. Both are immutable once
/// assigned. Accounts are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    /// 4-digit credential, stored as-is. Mutable only via the explicit
    /// PIN-change operation.
    pub pin: String,
    pub account_number: String,
    /// Invariant: >= 0 after every successful operation.
    pub balance: Cents,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(name: String, pin: String, account_number: String, balance: Cents) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            pin,
            account_number,
            balance,
            created_at: Utc::now(),
        }
    }
}

/// Draw a random 10-digit account number. Uniqueness is enforced at
/// persistence time, not here.
pub fn generate_account_number() -> String {
    rand::rng()
        .random_range(ACCOUNT_NUMBER_MIN..=ACCOUNT_NUMBER_MAX)
        .to_string()
}

/// A PIN is exactly 4 ASCII digits.
pub fn is_valid_pin(pin: &str) -> bool {
    pin.len() == 4 && pin.bytes().all(|b| b.is_ascii_digit())
}

/// Display names must contain at least one non-whitespace character.
pub fn is_valid_name(name: &str) -> bool {
    !name.trim().is_empty()
}
