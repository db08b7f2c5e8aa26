//! Sequential document numbering
//!
//! Every issued document carries a human-facing number in the wire format
//! `PREFIX-YYYY-NNNNN`: a fixed series prefix, the issuance year, and a
//! 5-digit zero-padded sequence that starts at 1 and resets each year.
//! Allocation happens inside the issuing transaction, under a per-series,
//! per-year lock held by the store adapter, so numbers are gapless per
//! committed document and never reused.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The five numbered series the platform issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSeries {
    /// Receivable documents billed to companies (`CXC`)
    Receivable,
    /// Payable documents owed to providers (`CXP`)
    Payable,
    /// Receipts for payments applied to receivables (`REC`)
    ReceivableReceipt,
    /// Receipts for payments applied to payables (`PRV`)
    PayableReceipt,
    /// Refinancing debts carved out of receivables (`REF`)
    Refinancing,
}

impl DocumentSeries {
    /// The series prefix as printed on documents
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentSeries::Receivable => "CXC",
            DocumentSeries::Payable => "CXP",
            DocumentSeries::ReceivableReceipt => "REC",
            DocumentSeries::PayableReceipt => "PRV",
            DocumentSeries::Refinancing => "REF",
        }
    }

    /// Stable key identifying the `(series, year)` counter row
    pub fn counter_key(&self, year: i32) -> String {
        format!("{}-{}", self.prefix(), year)
    }
}

/// A formatted document number, e.g. `CXC-2026-00042`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentNumber(String);

impl DocumentNumber {
    /// Formats a number from its parts
    pub fn format(series: DocumentSeries, year: i32, sequence: u32) -> Self {
        Self(format!("{}-{}-{:05}", series.prefix(), year, sequence))
    }

    /// Parses a number back into `(prefix, year, sequence)`
    ///
    /// Returns `None` when the string does not match the wire format.
    pub fn parse(raw: &str) -> Option<(DocumentSeries, i32, u32)> {
        let mut parts = raw.splitn(3, '-');
        let prefix = parts.next()?;
        let year: i32 = parts.next()?.parse().ok()?;
        let seq_part = parts.next()?;
        if seq_part.len() != 5 {
            return None;
        }
        let sequence: u32 = seq_part.parse().ok()?;

        let series = match prefix {
            "CXC" => DocumentSeries::Receivable,
            "CXP" => DocumentSeries::Payable,
            "REC" => DocumentSeries::ReceivableReceipt,
            "PRV" => DocumentSeries::PayableReceipt,
            "REF" => DocumentSeries::Refinancing,
            _ => return None,
        };
        Some((series, year, sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DocumentNumber {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}
