use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{AccountService, Session};
use crate::domain::TransactionRecord;

/// Snapshot of one account's audit trail for full export/import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub account_number: String,
    pub records: Vec<TransactionRecord>,
}

/// Exporter for converting an account's history to external formats.
/// Reads only through the service's history operation.
pub struct Exporter<'a> {
    service: &'a AccountService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a AccountService) -> Self {
        Self { service }
    }

    /// Export the session account's transaction history to CSV.
    ///
    /// The header text and column order are a compatibility contract:
    /// `Type, Amount, Recipient/Sender, Date, Description`.
    pub async fn export_history_csv<W: Write>(
        &self,
        session: &Session,
        writer: W,
    ) -> Result<usize> {
        let records = self.service.transaction_history(session, None).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["Type", "Amount", "Recipient/Sender", "Date", "Description"])?;

        let mut count = 0;
        for record in &records {
            csv_writer.write_record([
                record.kind.as_str().to_string(),
                record.amount.to_string(),
                record.counterparty.clone().unwrap_or_default(),
                record.timestamp.to_rfc3339(),
                record.description.clone().unwrap_or_default(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export the session account's history as a JSON snapshot.
    pub async fn export_history_json<W: Write>(
        &self,
        session: &Session,
        mut writer: W,
    ) -> Result<HistorySnapshot> {
        let records = self.service.transaction_history(session, None).await?;

        let snapshot = HistorySnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            account_number: session.account_number.clone(),
            records,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
