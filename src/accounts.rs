//! Chart-of-accounts CSV files in Xero's import layout

use std::path::{Path, PathBuf};

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use thiserror::Error;

/// Header row of Xero's chart-of-accounts import template
pub const CHART_HEADER: [&str; 9] = [
    "*Code",
    "*Name",
    "*Type",
    "*Tax Code",
    "Description",
    "Dashboard",
    "Expense Claims",
    "Enable Payments",
    "Balance",
];

const TAX_CODE: &str = "No Tax (0%)";

const ACCOUNT_TYPES: [&str; 16] = [
    "Inventory",
    "Expense",
    "Fixed",
    "Revenue",
    "Current",
    "Currliab",
    "Depreciatn",
    "DirectCosts",
    "Equity",
    "Liability",
    "NonCurrent",
    "Otherincome",
    "Overheads",
    "Prepayment",
    "Sales",
    "Termliab",
];

const DESCRIPTIONS: [&str; 7] = [
    "Value of tracked items for resale.",
    "Standard-Rated Purchases (8%),An expenditure that has been paid for in advance.",
    "An expenditure that has been paid for in advance.",
    "Unrealised currency gains on outstanding items",
    "Gains or losses made due to currency exchange rate changes",
    "A percentage of total earnings paid to the government.",
    "Outstanding invoices the company has issued out to the client but has not yet received in cash at balance date.",
];

#[derive(Error, Debug)]
pub enum AccountsError {
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid CSV in '{path}': {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Line {line} of '{path}' has {fields} fields, expected at least 5")]
    MalformedRow {
        path: String,
        line: usize,
        fields: usize,
    },
}

/// One ledger account, serialized the way the Accounts endpoint expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Account {
    pub code: String,
    pub name: String,
    #[serde(rename = "Type")]
    pub account_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Read the accounts of one chart file, skipping its header row
pub fn read_accounts(path: &Path) -> Result<Vec<Account>, AccountsError> {
    let shown = path.display().to_string();
    let csv_error = |source| AccountsError::Csv {
        path: shown.clone(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;

    let mut accounts = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error)?;
        if record.len() < 5 {
            return Err(AccountsError::MalformedRow {
                path: shown.clone(),
                line: idx + 2, // header + 0-index
                fields: record.len(),
            });
        }

        accounts.push(Account {
            code: record[0].trim().to_string(),
            name: record[1].trim().to_string(),
            account_type: record[2].trim().to_uppercase(),
            description: record[4].trim().to_string(),
        });
    }

    tracing::debug!(path = %shown, count = accounts.len(), "read chart of accounts");
    Ok(accounts)
}

/// Write `files` chart files of `rows_per_file` accounts each into `dir`.
///
/// Codes run on from `first_code + 1` across all files. Returns the paths
/// written, in order.
pub fn generate_charts<R: Rng + ?Sized>(
    dir: &Path,
    files: usize,
    rows_per_file: usize,
    first_code: u64,
    rng: &mut R,
) -> Result<Vec<PathBuf>, AccountsError> {
    std::fs::create_dir_all(dir).map_err(|source| AccountsError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let mut next_code = first_code;
    let mut paths = Vec::with_capacity(files);

    for n in 0..files {
        let path = dir.join(format!("coa{n}.csv"));
        let shown = path.display().to_string();
        let csv_error = |source| AccountsError::Csv {
            path: shown.clone(),
            source,
        };

        let mut writer = csv::Writer::from_path(&path).map_err(csv_error)?;
        writer.write_record(CHART_HEADER).map_err(csv_error)?;

        for _ in 0..rows_per_file {
            next_code += 1;
            let code = next_code.to_string();
            let name = format!("Test{next_code}");
            let account_type = ACCOUNT_TYPES.choose(rng).copied().unwrap_or("Expense");
            let description = DESCRIPTIONS.choose(rng).copied().unwrap_or_default();

            writer
                .write_record([
                    code.as_str(),
                    name.as_str(),
                    account_type,
                    TAX_CODE,
                    description,
                    "No",
                    "No",
                    "Yes",
                    "",
                ])
                .map_err(csv_error)?;
        }

        writer.flush().map_err(|source| AccountsError::Io {
            path: shown.clone(),
            source,
        })?;

        tracing::info!(path = %shown, rows = rows_per_file, "generated chart of accounts");
        paths.push(path);
    }

    Ok(paths)
}
