use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, Analytics, Cents, TransactionKind, TransactionRecord,
};

use super::MIGRATION_001_INITIAL;

/// Error creating an account. Distinct from plumbing failures so callers
/// can react to an account-number collision.
#[derive(Error, Debug)]
pub enum CreateAccountError {
    #[error("account number already exists: {0}")]
    DuplicateAccountNumber(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Error performing an atomic transfer. The not-found and insufficient
/// variants are detected before any write; `Failed` means the unit of work
/// was rolled back after the balance computation step.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("insufficient balance: have {balance}, need {required}")]
    InsufficientBalance { balance: Cents, required: Cents },

    #[error("amount would overflow the recipient balance")]
    BalanceOverflow,

    #[error("transfer failed and was rolled back")]
    Failed(#[source] anyhow::Error),
}

/// Outcome of a completed atomic transfer.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub amount: Cents,
    pub from_account_number: String,
    pub to_account_number: String,
    pub sender_balance: Cents,
    pub recipient_balance: Cents,
}

/// Repository for persisting and querying accounts and their audit trail.
/// The sole owner of persisted state.
pub struct Repository {
    pool: SqlitePool,
}

/// A group of writes that either all commit or are all discarded.
/// Dropping an unfinished unit of work rolls back every write made
/// through it.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given path.
    /// Creates the database file if it doesn't exist.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Begin a unit of work.
    pub async fn begin(&self) -> Result<UnitOfWork> {
        let tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin unit of work")?;
        Ok(UnitOfWork { tx })
    }

    // ========================
    // Account operations
    // ========================

    /// Create a new account. Fails without any partial write if the
    /// account number is already taken.
    pub async fn create_account(
        &self,
        name: &str,
        pin: &str,
        account_number: &str,
        initial_balance: Cents,
    ) -> Result<Account, CreateAccountError> {
        let account = Account::new(
            name.to_string(),
            pin.to_string(),
            account_number.to_string(),
            initial_balance,
        );

        sqlx::query(
            r#"
            INSERT INTO accounts (id, name, pin, account_number, balance, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(&account.name)
        .bind(&account.pin)
        .bind(&account.account_number)
        .bind(account.balance)
        .bind(account.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                CreateAccountError::DuplicateAccountNumber(account_number.to_string())
            }
            _ => CreateAccountError::Other(
                anyhow::Error::from(e).context("Failed to create account"),
            ),
        })?;

        Ok(account)
    }

    /// Get an account by its external account number.
    pub async fn get_account_by_number(&self, account_number: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, pin, account_number, balance, created_at
            FROM accounts
            WHERE account_number = ?
            "#,
        )
        .bind(account_number)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account by number")?;

        match row {
            Some(row) => Ok(Some(row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// Get an account by its internal id.
    pub async fn get_account_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, pin, account_number, balance, created_at
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account by id")?;

        match row {
            Some(row) => Ok(Some(row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// Replace an account's PIN.
    pub async fn set_pin(&self, id: AccountId, new_pin: &str) -> Result<()> {
        sqlx::query("UPDATE accounts SET pin = ? WHERE id = ?")
            .bind(new_pin)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to set PIN")?;
        Ok(())
    }

    // ========================
    // Transaction log operations
    // ========================

    /// List an account's transaction records, newest first, bounded by
    /// `limit`. A plain re-query, not a live stream.
    pub async fn list_transactions(
        &self,
        account_id: AccountId,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, type, amount, recipient_account, timestamp, description
            FROM transactions
            WHERE account_id = ?
            ORDER BY timestamp DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(account_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions")?;

        rows.iter().map(row_to_record).collect()
    }

    /// Compute income/expense totals for an account using SQL aggregation.
    /// This is more efficient than loading all records and folding in memory.
    pub async fn sum_amounts_by_kind(&self, account_id: AccountId) -> Result<Analytics> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN type IN ('DEPOSIT', 'TRANSFER_IN') THEN amount ELSE 0 END), 0) as income,
                COALESCE(SUM(CASE WHEN type IN ('WITHDRAW', 'TRANSFER_OUT') THEN amount ELSE 0 END), 0) as expense
            FROM transactions
            WHERE account_id = ?
            "#,
        )
        .bind(account_id.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum transaction amounts")?;

        Ok(Analytics {
            income: row.get("income"),
            expense: row.get("expense"),
        })
    }

    // ========================
    // Composite operations
    // ========================

    /// Move `amount` from one account to another as a single unit of work:
    /// both balance updates and both audit records commit together or not
    /// at all. A partial transfer is never observable.
    pub async fn transfer_atomic(
        &self,
        from_account_number: &str,
        to_account_number: &str,
        amount: Cents,
    ) -> Result<TransferReceipt, TransferError> {
        let mut uow = self.begin().await.map_err(TransferError::Failed)?;

        let sender = uow
            .get_account_by_number(from_account_number)
            .await
            .map_err(TransferError::Failed)?
            .ok_or_else(|| TransferError::AccountNotFound(from_account_number.to_string()))?;
        let recipient = uow
            .get_account_by_number(to_account_number)
            .await
            .map_err(TransferError::Failed)?
            .ok_or_else(|| TransferError::AccountNotFound(to_account_number.to_string()))?;

        if sender.balance < amount {
            return Err(TransferError::InsufficientBalance {
                balance: sender.balance,
                required: amount,
            });
        }

        let sender_balance = sender.balance - amount;
        let recipient_balance = recipient
            .balance
            .checked_add(amount)
            .ok_or(TransferError::BalanceOverflow)?;

        // From here on any failure drops `uow`, which rolls back every
        // write made so far.
        uow.set_balance(&sender.account_number, sender_balance)
            .await
            .map_err(TransferError::Failed)?;
        uow.set_balance(&recipient.account_number, recipient_balance)
            .await
            .map_err(TransferError::Failed)?;

        let outgoing = TransactionRecord::new(sender.id, TransactionKind::TransferOut, amount)
            .with_counterparty(&recipient.account_number)
            .with_description(format!("Transfer to {}", recipient.name));
        let incoming = TransactionRecord::new(recipient.id, TransactionKind::TransferIn, amount)
            .with_counterparty(&sender.account_number)
            .with_description(format!("Transfer from {}", sender.name));

        uow.append_transaction(&outgoing)
            .await
            .map_err(TransferError::Failed)?;
        uow.append_transaction(&incoming)
            .await
            .map_err(TransferError::Failed)?;

        uow.commit().await.map_err(TransferError::Failed)?;

        debug!(
            from = from_account_number,
            to = to_account_number,
            amount,
            "transfer committed"
        );

        Ok(TransferReceipt {
            amount,
            from_account_number: sender.account_number,
            to_account_number: recipient.account_number,
            sender_balance,
            recipient_balance,
        })
    }
}

impl UnitOfWork {
    /// Get an account by number within this unit of work, so the read and
    /// the subsequent writes see the same state.
    pub async fn get_account_by_number(
        &mut self,
        account_number: &str,
    ) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, pin, account_number, balance, created_at
            FROM accounts
            WHERE account_number = ?
            "#,
        )
        .bind(account_number)
        .fetch_optional(&mut *self.tx)
        .await
        .context("Failed to fetch account by number")?;

        match row {
            Some(row) => Ok(Some(row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// Overwrite an account's balance. The caller must have computed the
    /// new value under the account's serialization lock.
    pub async fn set_balance(&mut self, account_number: &str, new_balance: Cents) -> Result<()> {
        sqlx::query("UPDATE accounts SET balance = ? WHERE account_number = ?")
            .bind(new_balance)
            .bind(account_number)
            .execute(&mut *self.tx)
            .await
            .context("Failed to set balance")?;
        Ok(())
    }

    /// Replace an account's PIN within this unit of work.
    pub async fn set_pin(&mut self, id: AccountId, new_pin: &str) -> Result<()> {
        sqlx::query("UPDATE accounts SET pin = ? WHERE id = ?")
            .bind(new_pin)
            .bind(id.to_string())
            .execute(&mut *self.tx)
            .await
            .context("Failed to set PIN")?;
        Ok(())
    }

    /// Append an immutable record to the audit trail.
    pub async fn append_transaction(&mut self, record: &TransactionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, account_id, type, amount, recipient_account, timestamp, description)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.account_id.to_string())
        .bind(record.kind.as_str())
        .bind(record.amount)
        .bind(&record.counterparty)
        .bind(record.timestamp.to_rfc3339())
        .bind(&record.description)
        .execute(&mut *self.tx)
        .await
        .context("Failed to append transaction")?;
        Ok(())
    }

    /// Make every write in this unit of work durable.
    pub async fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .await
            .context("Failed to commit unit of work")?;
        Ok(())
    }
}

fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
    let id_str: String = row.get("id");
    let created_at_str: String = row.get("created_at");

    Ok(Account {
        id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
        name: row.get("name"),
        pin: row.get("pin"),
        account_number: row.get("account_number"),
        balance: row.get("balance"),
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .context("Invalid created_at timestamp")?
            .with_timezone(&Utc),
    })
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<TransactionRecord> {
    let id_str: String = row.get("id");
    let account_id_str: String = row.get("account_id");
    let kind_str: String = row.get("type");
    let timestamp_str: String = row.get("timestamp");

    Ok(TransactionRecord {
        id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
        account_id: Uuid::parse_str(&account_id_str).context("Invalid account ID")?,
        kind: TransactionKind::from_str(&kind_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid transaction type: {}", kind_str))?,
        amount: row.get("amount"),
        counterparty: row.get("recipient_account"),
        timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
            .context("Invalid timestamp")?
            .with_timezone(&Utc),
        description: row.get("description"),
    })
}
