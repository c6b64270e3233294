//! Environment export adapter.
//!
//! Turns a [`NormalizedSecret`] into `{SERVICE}_{FIELD}` environment
//! variables. The retrieval core never touches the process environment; this
//! adapter is used by the `export` command and by callers that still expect
//! credentials in their environment.
//!
//! ```bash
//! eval "$(enigma export vault bugzilla)"
//! echo "$BUGZILLA_API_KEY"
//! ```

use super::types::{NormalizedSecret, SecretString};
use tracing::{debug, warn};

/// Environment variable name for one field of one service.
///
/// Upper-cased, with every character outside `[A-Za-z0-9_]` replaced by `_`.
pub fn env_var_name(service: &str, field: &str) -> String {
    format!("{}_{}", service, field)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

/// `(name, value)` pairs for every non-empty field of `secret`.
///
/// Notes are never exported.
pub fn export_assignments(secret: &NormalizedSecret) -> Vec<(String, SecretString)> {
    let mut assignments = Vec::with_capacity(secret.len());
    for (field, value) in secret.fields() {
        if value.is_empty() {
            warn!(service = %secret.service(), field = %field, "Skipping empty credential value");
            continue;
        }
        assignments.push((env_var_name(secret.service(), field), value.clone()));
    }
    assignments
}

/// Set the variables of `secret` in the current process.
///
/// Returns the names that were set.
pub fn inject_into_process(secret: &NormalizedSecret) -> Vec<String> {
    export_assignments(secret)
        .into_iter()
        .map(|(name, value)| {
            debug!(variable = %name, "Setting environment variable");
            std::env::set_var(&name, value.expose_secret());
            name
        })
        .collect()
}

/// Quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// `export NAME='value'` line for one assignment.
pub fn export_line(name: &str, value: &SecretString) -> String {
    format!("export {}={}", name, shell_quote(value.expose_secret()))
}
