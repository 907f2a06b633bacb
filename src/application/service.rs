use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::domain::{
    generate_account_number, is_valid_name, is_valid_pin, parse_amount, Account, Analytics, Cents,
    TransactionKind, TransactionRecord,
};
use crate::storage::{CreateAccountError, Repository, TransferReceipt};

use super::{AppError, Session};

/// How long a mutating operation waits for an account's serialization lock
/// before giving up with `AppError::Busy`.
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Attempts at generating a fresh account number when sign-up collides.
const SIGN_UP_ATTEMPTS: u32 = 3;

/// Default history page size.
const DEFAULT_HISTORY_LIMIT: i64 = 100;

/// Application service enforcing the business rules on top of the ledger
/// store: sufficient funds, positive amounts, PIN validation, self-transfer
/// prohibition. This is the primary interface for any client.
///
/// Every mutating operation on an account runs under a per-account async
/// lock, so concurrent read-modify-write sequences on the same account
/// cannot interleave. A transfer takes both locks in ascending
/// account-number order.
pub struct AccountService {
    repo: Repository,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    lock_timeout: Duration,
}

impl AccountService {
    /// Create a new service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            locks: Mutex::new(HashMap::new()),
            lock_timeout: LOCK_TIMEOUT,
        }
    }

    #[cfg(test)]
    fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Account lifecycle
    // ========================

    /// Open a new account. Returns the created account; the caller hands
    /// its `account_number` to the user.
    #[instrument(skip(self, pin))]
    pub async fn sign_up(&self, name: &str, pin: &str) -> Result<Account, AppError> {
        if !is_valid_name(name) {
            return Err(AppError::InvalidName);
        }
        if !is_valid_pin(pin) {
            return Err(AppError::InvalidPinFormat);
        }

        // The 10-digit space makes collisions rare; a couple of retries
        // make them invisible.
        let mut last_collision = String::new();
        for _ in 0..SIGN_UP_ATTEMPTS {
            let account_number = generate_account_number();
            match self.repo.create_account(name, pin, &account_number, 0).await {
                Ok(account) => {
                    info!(account_number = %account.account_number, "account created");
                    return Ok(account);
                }
                Err(CreateAccountError::DuplicateAccountNumber(number)) => {
                    warn!(account_number = %number, "account number collision, retrying");
                    last_collision = number;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(AppError::DuplicateAccountNumber(last_collision))
    }

    /// Authenticate against an account number and PIN. On success returns
    /// a session bound to a snapshot of the account.
    #[instrument(skip(self, pin))]
    pub async fn sign_in(&self, account_number: &str, pin: &str) -> Result<Session, AppError> {
        let account = self
            .repo
            .get_account_by_number(account_number)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(account_number.to_string()))?;

        if account.pin != pin {
            return Err(AppError::IncorrectPin);
        }

        info!(account_number = %account.account_number, "signed in");
        Ok(Session::for_account(&account))
    }

    /// End a session. With explicit session handles this is just a drop,
    /// kept as an operation so clients have a single place to hook.
    pub fn logout(&self, session: Session) {
        info!(account_number = %session.account_number, "signed out");
    }

    // ========================
    // Balance mutations
    // ========================

    /// Deposit a positive amount into the session's account.
    /// Returns the new balance.
    #[instrument(skip(self, session), fields(account_number = %session.account_number))]
    pub async fn deposit(&self, session: &mut Session, amount: &str) -> Result<Cents, AppError> {
        let amount = self.parse_amount_text(amount)?;
        let _guard = self.lock_account(&session.account_number).await?;

        let account = self.fetch_account(&session.account_number).await?;
        let new_balance = account
            .balance
            .checked_add(amount)
            .ok_or(AppError::BalanceOverflow)?;

        let mut uow = self.repo.begin().await?;
        uow.set_balance(&account.account_number, new_balance).await?;
        uow.append_transaction(
            &TransactionRecord::new(account.id, TransactionKind::Deposit, amount)
                .with_description("Deposit"),
        )
        .await?;
        uow.commit().await?;

        session.balance = new_balance;
        info!(amount, new_balance, "deposit");
        Ok(new_balance)
    }

    /// Withdraw a positive amount from the session's account. Fails with
    /// `InsufficientBalance` before any write if funds don't cover it.
    /// Returns the new balance.
    #[instrument(skip(self, session), fields(account_number = %session.account_number))]
    pub async fn withdraw(&self, session: &mut Session, amount: &str) -> Result<Cents, AppError> {
        let amount = self.parse_amount_text(amount)?;
        let _guard = self.lock_account(&session.account_number).await?;

        let account = self.fetch_account(&session.account_number).await?;
        if account.balance < amount {
            return Err(AppError::InsufficientBalance {
                balance: account.balance,
                required: amount,
            });
        }
        let new_balance = account.balance - amount;

        let mut uow = self.repo.begin().await?;
        uow.set_balance(&account.account_number, new_balance).await?;
        uow.append_transaction(
            &TransactionRecord::new(account.id, TransactionKind::Withdraw, amount)
                .with_description("Withdrawal"),
        )
        .await?;
        uow.commit().await?;

        session.balance = new_balance;
        info!(amount, new_balance, "withdrawal");
        Ok(new_balance)
    }

    /// Transfer a positive amount to another account atomically. On
    /// success the session's balance is re-read from the store rather
    /// than computed, so it reflects authoritative state.
    #[instrument(skip(self, session), fields(account_number = %session.account_number))]
    pub async fn transfer(
        &self,
        session: &mut Session,
        recipient_account_number: &str,
        amount: &str,
    ) -> Result<TransferReceipt, AppError> {
        let amount = self.parse_amount_text(amount)?;
        if recipient_account_number == session.account_number {
            return Err(AppError::SelfTransferNotAllowed);
        }

        // Both locks in ascending account-number order; numbers are fixed
        // at 10 digits so lexicographic order is numeric order.
        let mut pair = [
            session.account_number.as_str(),
            recipient_account_number,
        ];
        pair.sort_unstable();
        let _first = self.lock_account(pair[0]).await?;
        let _second = self.lock_account(pair[1]).await?;

        let receipt = self
            .repo
            .transfer_atomic(&session.account_number, recipient_account_number, amount)
            .await?;

        let account = self.fetch_account(&session.account_number).await?;
        session.balance = account.balance;

        info!(
            amount,
            recipient = recipient_account_number,
            new_balance = session.balance,
            "transfer"
        );
        Ok(receipt)
    }

    /// Change the session account's PIN. The old PIN is verified against a
    /// fresh fetch, not the session snapshot.
    #[instrument(skip(self, session, old_pin, new_pin), fields(account_number = %session.account_number))]
    pub async fn change_pin(
        &self,
        session: &Session,
        old_pin: &str,
        new_pin: &str,
    ) -> Result<(), AppError> {
        let account = self
            .repo
            .get_account_by_id(session.account_id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(session.account_number.clone()))?;

        if account.pin != old_pin {
            return Err(AppError::IncorrectPin);
        }
        if !is_valid_pin(new_pin) {
            return Err(AppError::InvalidPinFormat);
        }

        self.repo.set_pin(account.id, new_pin).await?;
        info!("PIN changed");
        Ok(())
    }

    // ========================
    // Reads
    // ========================

    /// The session account's transaction records, newest first.
    pub async fn transaction_history(
        &self,
        session: &Session,
        limit: Option<i64>,
    ) -> Result<Vec<TransactionRecord>, AppError> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        Ok(self
            .repo
            .list_transactions(session.account_id, limit)
            .await?)
    }

    /// Income/expense totals across the session account's full history.
    /// Pure read, no side effects.
    pub async fn analytics(&self, session: &Session) -> Result<Analytics, AppError> {
        Ok(self.repo.sum_amounts_by_kind(session.account_id).await?)
    }

    /// Authoritative account state for the session (fresh fetch).
    pub async fn account_info(&self, session: &Session) -> Result<Account, AppError> {
        self.fetch_account(&session.account_number).await
    }

    // ========================
    // Internals
    // ========================

    fn parse_amount_text(&self, input: &str) -> Result<Cents, AppError> {
        parse_amount(input).map_err(|_| AppError::InvalidAmount(input.to_string()))
    }

    async fn fetch_account(&self, account_number: &str) -> Result<Account, AppError> {
        self.repo
            .get_account_by_number(account_number)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(account_number.to_string()))
    }

    /// One lock per account number, created on first use. Entries are
    /// never removed; accounts are never deleted either.
    async fn account_lock(&self, account_number: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(account_number.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn lock_account(&self, account_number: &str) -> Result<OwnedMutexGuard<()>, AppError> {
        let lock = self.account_lock(account_number).await;
        match timeout(self.lock_timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                warn!(account_number, "lock acquisition timed out");
                Err(AppError::Busy)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::TempDir;

    use super::*;

    async fn test_service(lock_timeout: Duration) -> Result<(AccountService, TempDir)> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");
        let service = AccountService::init(db_path.to_str().unwrap())
            .await?
            .with_lock_timeout(lock_timeout);
        Ok((service, temp_dir))
    }

    #[tokio::test]
    async fn test_contended_account_fails_busy_without_mutation() -> Result<()> {
        let (service, _temp) = test_service(Duration::from_millis(50)).await?;

        let account = service.sign_up("Alice", "1234").await?;
        let mut session = service.sign_in(&account.account_number, "1234").await?;

        // Hold the account's lock so the deposit cannot acquire it
        let guard = service.lock_account(&account.account_number).await?;

        let result = service.deposit(&mut session, "100").await;
        assert!(matches!(result, Err(AppError::Busy)));

        // Nothing was written and the session cache is untouched
        assert_eq!(session.balance, 0);
        let fresh = service.account_info(&session).await?;
        assert_eq!(fresh.balance, 0);
        assert!(service.transaction_history(&session, None).await?.is_empty());

        // Once the lock is released the same deposit goes through
        drop(guard);
        assert_eq!(service.deposit(&mut session, "100").await?, 100);

        Ok(())
    }
}
