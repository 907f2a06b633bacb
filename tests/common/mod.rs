// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use ledgerbank::application::{AccountService, Session};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(AccountService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = AccountService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Sign up a new account and return a signed-in session for it.
pub async fn open_account(service: &AccountService, name: &str, pin: &str) -> Result<Session> {
    let account = service.sign_up(name, pin).await?;
    let session = service.sign_in(&account.account_number, pin).await?;
    Ok(session)
}

/// Sign up a new account, sign in, and deposit an opening balance.
pub async fn open_funded_account(
    service: &AccountService,
    name: &str,
    pin: &str,
    opening_balance: i64,
) -> Result<Session> {
    let mut session = open_account(service, name, pin).await?;
    service
        .deposit(&mut session, &opening_balance.to_string())
        .await?;
    Ok(session)
}
