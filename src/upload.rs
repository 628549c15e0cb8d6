//! Uploads ledger accounts to a Xero tenant
//!
//! Accounts are sent one request each through a small pool of concurrent
//! workers. A failed account is reported and left alone; nothing is retried.

use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::accounts::Account;

/// Base URL of the Xero API
pub const XERO_API_URL: &str = "https://api.xero.com";

/// Concurrent uploads used when the caller does not choose
pub const DEFAULT_WORKERS: usize = 2;

const ACCOUNTS_PATH: &str = "/api.xro/2.0/Accounts";

/// Fragment of Xero's validation message for a code or name already in use
const DUPLICATE_MARKER: &str = "Please enter a unique";

#[derive(Error, Debug)]
pub enum UploadError {
    /// Xero refused the account
    #[error("Failed to upload account {code} (status {status}): {body}")]
    Rejected {
        code: String,
        status: u16,
        body: String,
    },

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// What happened to an account that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Created,
    /// The tenant already holds an account with this code or name
    AlreadyExists,
}

/// Totals of one `upload_all` run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub created: usize,
    pub already_exists: usize,
    pub failed: usize,
}

impl UploadSummary {
    pub fn processed(&self) -> usize {
        self.created + self.already_exists + self.failed
    }
}

/// Sends accounts to the Accounts endpoint of one tenant
#[derive(Debug, Clone)]
pub struct Uploader {
    http: reqwest::Client,
    endpoint: String,
    access_token: String,
    tenant_id: String,
}

impl Uploader {
    pub fn new(
        http: reqwest::Client,
        api_base: &str,
        access_token: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint: format!("{}{}", api_base.trim_end_matches('/'), ACCOUNTS_PATH),
            access_token: access_token.into(),
            tenant_id: tenant_id.into(),
        }
    }

    /// Create one account in the tenant
    pub async fn upload_account(&self, account: &Account) -> Result<UploadOutcome, UploadError> {
        let response = self
            .http
            .put(&self.endpoint)
            .bearer_auth(&self.access_token)
            .header("Xero-Tenant-Id", &self.tenant_id)
            .header(ACCEPT, "application/json")
            .json(account)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            return Ok(UploadOutcome::Created);
        }

        let body = response.text().await?;
        if body.contains(DUPLICATE_MARKER) {
            return Ok(UploadOutcome::AlreadyExists);
        }

        Err(UploadError::Rejected {
            code: account.code.clone(),
            status: status.as_u16(),
            body,
        })
    }

    /// Upload every account with at most `workers` requests in flight
    pub async fn upload_all(&self, accounts: Vec<Account>, workers: usize) -> UploadSummary {
        let workers = workers.max(1);
        let total = accounts.len();
        let mut summary = UploadSummary::default();
        let mut tasks = JoinSet::new();

        for account in accounts {
            while tasks.len() >= workers {
                if let Some(done) = tasks.join_next().await {
                    record(&mut summary, done, total);
                }
            }

            let uploader = self.clone();
            tasks.spawn(async move {
                let outcome = uploader.upload_account(&account).await;
                (account.code, outcome)
            });
        }

        while let Some(done) = tasks.join_next().await {
            record(&mut summary, done, total);
        }

        summary
    }
}

type TaskResult = Result<(String, Result<UploadOutcome, UploadError>), tokio::task::JoinError>;

fn record(summary: &mut UploadSummary, done: TaskResult, total: usize) {
    match done {
        Ok((code, Ok(outcome))) => {
            match outcome {
                UploadOutcome::Created => summary.created += 1,
                UploadOutcome::AlreadyExists => summary.already_exists += 1,
            }
            tracing::info!(
                %code,
                ?outcome,
                processed = summary.processed(),
                total,
                "finished processing account"
            );
        }
        Ok((code, Err(e))) => {
            summary.failed += 1;
            tracing::warn!(%code, error = %e, "cannot process account");
        }
        Err(e) => {
            summary.failed += 1;
            tracing::warn!(error = %e, "upload task did not complete");
        }
    }
}
