//! Chart-of-accounts tooling for a Xero tenant
//!
//! Generates import-template CSV files and uploads their accounts using the
//! access token and tenant stored by `xero-oauth-helper`.

pub mod accounts;
pub mod upload;

pub use accounts::{Account, AccountsError, generate_charts, read_accounts};
pub use upload::{UploadError, UploadOutcome, UploadSummary, Uploader};
