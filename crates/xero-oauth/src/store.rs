//! `.env` configuration store
//!
//! Configuration is read with `dotenvy` and written back line by line so that
//! comments, blank lines and unrelated keys survive an update untouched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{OAuthError, Result};
use crate::flow::TokenResult;

/// Key under which the access token is persisted
pub const ACCESS_TOKEN_KEY: &str = "ACCESS_TOKEN";
/// Key under which the tenant identifier is persisted
pub const TENANT_ID_KEY: &str = "TENANT_ID";

/// A `.env` file holding `KEY=value` entries
#[derive(Debug, Clone)]
pub struct EnvStore {
    path: PathBuf,
}

impl EnvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry of the file. A missing file reads as empty.
    pub fn read(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let env_file_error = |source| OAuthError::EnvFile {
            path: self.path.display().to_string(),
            source,
        };

        let mut entries = HashMap::new();
        for item in dotenvy::from_path_iter(&self.path).map_err(env_file_error)? {
            let (key, value) = item.map_err(env_file_error)?;
            entries.insert(key, value);
        }
        Ok(entries)
    }

    /// Create or overwrite a single key
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_many(&[(key, value)])
    }

    /// Create or overwrite several keys in one rewrite of the file.
    ///
    /// The first assignment of each key is replaced in place and any later
    /// duplicates of it are dropped; keys not yet present are appended.
    pub fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let existing = match std::fs::read_to_string(&self.path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let mut written = vec![false; entries.len()];
        let mut lines: Vec<String> = Vec::new();

        for line in existing.as_deref().unwrap_or_default().lines() {
            let slot = assignment_key(line)
                .and_then(|key| entries.iter().position(|(wanted, _)| *wanted == key));
            match slot {
                Some(idx) if written[idx] => continue,
                Some(idx) => {
                    let (key, value) = entries[idx];
                    lines.push(format_entry(key, value));
                    written[idx] = true;
                }
                None => lines.push(line.to_string()),
            }
        }

        for (idx, (key, value)) in entries.iter().enumerate() {
            if !written[idx] {
                lines.push(format_entry(key, value));
            }
        }

        let mut content = lines.join("\n");
        content.push('\n');
        std::fs::write(&self.path, content)?;

        // Files we create ourselves hold secrets, keep them owner-only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if existing.is_none() {
                let permissions = std::fs::Permissions::from_mode(0o600);
                std::fs::set_permissions(&self.path, permissions)?;
            }
        }

        tracing::debug!(
            path = %self.path.display(),
            keys = ?entries.iter().map(|(key, _)| *key).collect::<Vec<_>>(),
            "updated env file"
        );

        Ok(())
    }

    /// Write the access token and tenant identifier of a completed run
    pub fn persist(&self, result: &TokenResult) -> Result<()> {
        self.set_many(&[
            (ACCESS_TOKEN_KEY, result.access_token.as_str()),
            (TENANT_ID_KEY, result.tenant_id.as_str()),
        ])
    }
}

/// Key assigned on this line, if the line is an assignment
fn assignment_key(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return None;
    }
    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, _) = trimmed.split_once('=')?;
    let key = key.trim();
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    valid.then_some(key)
}

fn format_entry(key: &str, value: &str) -> String {
    if !value.contains('\'') && !value.contains('\n') {
        return format!("{key}='{value}'");
    }

    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '$' => escaped.push_str("\\$"),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    format!("{key}=\"{escaped}\"")
}
