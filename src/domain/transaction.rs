use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents};

pub type TransactionId = Uuid;

/// The four kinds of balance mutation. Closed set: storage and reporting
/// can match on this exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    TransferOut,
    TransferIn,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "DEPOSIT",
            TransactionKind::Withdraw => "WITHDRAW",
            TransactionKind::TransferOut => "TRANSFER_OUT",
            TransactionKind::TransferIn => "TRANSFER_IN",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DEPOSIT" => Some(TransactionKind::Deposit),
            "WITHDRAW" => Some(TransactionKind::Withdraw),
            "TRANSFER_OUT" => Some(TransactionKind::TransferOut),
            "TRANSFER_IN" => Some(TransactionKind::TransferIn),
            _ => None,
        }
    }

    /// Returns true if this kind increases the account's balance.
    pub fn is_credit(&self) -> bool {
        matches!(self, TransactionKind::Deposit | TransactionKind::TransferIn)
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in an account's audit trail. Records are append-only and
/// immutable; corrections happen through new records, never edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    /// Owning account.
    pub account_id: AccountId,
    pub kind: TransactionKind,
    /// Always positive; the sign is implied by `kind`.
    pub amount: Cents,
    /// The other party's account number, set only for transfer kinds.
    pub counterparty: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Human-readable note, e.g. "Transfer to Alice".
    pub description: Option<String>,
}

impl TransactionRecord {
    pub fn new(account_id: AccountId, kind: TransactionKind, amount: Cents) -> Self {
        assert!(amount > 0, "Transaction amount must be positive");
        Self {
            id: Uuid::new_v4(),
            account_id,
            kind,
            amount,
            counterparty: None,
            timestamp: Utc::now(),
            description: None,
        }
    }

    pub fn with_counterparty(mut self, account_number: impl Into<String>) -> Self {
        self.counterparty = Some(account_number.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The record's effect on the owning account's balance.
    pub fn signed_amount(&self) -> Cents {
        if self.kind.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            TransactionKind::Deposit,
            TransactionKind::Withdraw,
            TransactionKind::TransferOut,
            TransactionKind::TransferIn,
        ] {
            let s = kind.as_str();
            assert_eq!(TransactionKind::from_str(s), Some(kind));
        }
        assert_eq!(TransactionKind::from_str("REFUND"), None);
    }

    #[test]
    fn test_create_record() {
        let account_id = Uuid::new_v4();
        let record = TransactionRecord::new(account_id, TransactionKind::TransferOut, 500)
            .with_counterparty("9999999999")
            .with_description("Transfer to Bob");

        assert_eq!(record.amount, 500);
        assert_eq!(record.account_id, account_id);
        assert_eq!(record.counterparty, Some("9999999999".to_string()));
        assert_eq!(record.description, Some("Transfer to Bob".to_string()));
    }

    #[test]
    fn test_signed_amount() {
        let account_id = Uuid::new_v4();
        let deposit = TransactionRecord::new(account_id, TransactionKind::Deposit, 500);
        let withdrawal = TransactionRecord::new(account_id, TransactionKind::Withdraw, 300);
        let incoming = TransactionRecord::new(account_id, TransactionKind::TransferIn, 200);
        let outgoing = TransactionRecord::new(account_id, TransactionKind::TransferOut, 100);

        assert_eq!(deposit.signed_amount(), 500);
        assert_eq!(withdrawal.signed_amount(), -300);
        assert_eq!(incoming.signed_amount(), 200);
        assert_eq!(outgoing.signed_amount(), -100);
    }

    #[test]
    #[should_panic(expected = "Transaction amount must be positive")]
    fn test_record_requires_positive_amount() {
        TransactionRecord::new(Uuid::new_v4(), TransactionKind::Deposit, 0);
    }
}
