use thiserror::Error;

use crate::domain::Cents;
use crate::storage::{CreateAccountError, TransferError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account number already exists: {0}")]
    DuplicateAccountNumber(String),

    #[error("Incorrect PIN")]
    IncorrectPin,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient balance: have {balance}, need {required}")]
    InsufficientBalance { balance: Cents, required: Cents },

    #[error("Amount would overflow the account balance")]
    BalanceOverflow,

    #[error("Cannot transfer to your own account")]
    SelfTransferNotAllowed,

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("PIN must be exactly 4 digits")]
    InvalidPinFormat,

    #[error("Name must not be empty")]
    InvalidName,

    #[error("Transfer failed")]
    TransferFailed(#[source] anyhow::Error),

    #[error("Account is busy, try again")]
    Busy,

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl From<CreateAccountError> for AppError {
    fn from(err: CreateAccountError) -> Self {
        match err {
            CreateAccountError::DuplicateAccountNumber(number) => {
                AppError::DuplicateAccountNumber(number)
            }
            CreateAccountError::Other(e) => AppError::Database(e),
        }
    }
}

impl From<TransferError> for AppError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::AccountNotFound(number) => AppError::AccountNotFound(number),
            TransferError::InsufficientBalance { balance, required } => {
                AppError::InsufficientBalance { balance, required }
            }
            TransferError::BalanceOverflow => AppError::BalanceOverflow,
            TransferError::Failed(e) => AppError::TransferFailed(e),
        }
    }
}
