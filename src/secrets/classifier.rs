//! Failure policy applied at retrieval time.
//!
//! Authentication and configuration failures reach the caller. Every other
//! failure is reported here and replaced by an empty result, so the caller
//! only learns about it through the logs.

use crate::errors::{CredentialError, ErrorKind, Result};
use crate::secrets::backends::BackendKind;
use tracing::{error, info, warn};

/// What the caller receives for a given failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Propagate,
    Empty,
}

/// Decide the return contract for `err`.
pub fn classify(err: &CredentialError) -> Disposition {
    if err.is_recoverable() {
        Disposition::Empty
    } else {
        Disposition::Propagate
    }
}

/// Report `err` and turn recoverable failures into `T::default()`.
pub fn recover<T: Default>(
    backend: BackendKind,
    service: &str,
    field: Option<&str>,
    err: CredentialError,
) -> Result<T> {
    let field = field.unwrap_or("*");
    let kind = err.kind();

    match classify(&err) {
        Disposition::Propagate => {
            error!(
                backend = %backend,
                service = %service,
                error_kind = %kind,
                error = %err,
                "Credential retrieval failed"
            );
            Err(err)
        }
        Disposition::Empty => {
            match kind {
                ErrorKind::NotFound => info!(
                    backend = %backend,
                    service = %service,
                    field = %field,
                    error_kind = %kind,
                    "Credential not found, returning empty value"
                ),
                _ => warn!(
                    backend = %backend,
                    service = %service,
                    field = %field,
                    error_kind = %kind,
                    error = %err,
                    "Credential unavailable, returning empty value"
                ),
            }
            Ok(T::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::types::SecretString;
    use std::time::Duration;
    use tracing_test::traced_test;

    #[test]
    fn test_classify() {
        assert_eq!(classify(&CredentialError::not_found("x")), Disposition::Empty);
        assert_eq!(classify(&CredentialError::rate_limited("aws", "slow")), Disposition::Empty);
        assert_eq!(
            classify(&CredentialError::timeout("fetch", Duration::from_secs(1))),
            Disposition::Empty
        );
        assert_eq!(
            classify(&CredentialError::authentication("vault", "bad token")),
            Disposition::Propagate
        );
        assert_eq!(classify(&CredentialError::configuration("no addr")), Disposition::Propagate);
    }

    #[test]
    fn test_recover_returns_default_for_recoverable() {
        let value: SecretString = recover(
            BackendKind::VaultKv,
            "bugzilla",
            Some("api_key"),
            CredentialError::transient("vault", "503 Service Unavailable"),
        )
        .unwrap();
        assert!(value.is_empty());

        let value: Option<u8> =
            recover(BackendKind::CloudKms, "db", None, CredentialError::not_found("db")).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_recover_propagates_authentication() {
        let result: Result<SecretString> = recover(
            BackendKind::PasswordManagerCli,
            "github",
            Some("username"),
            CredentialError::authentication("bitwarden", "Invalid master password."),
        );
        assert!(matches!(result, Err(CredentialError::Authentication { .. })));
    }

    #[traced_test]
    #[test]
    fn test_not_found_and_denied_differ_only_in_logs() {
        let missing: SecretString = recover(
            BackendKind::VaultKv,
            "bugzilla",
            Some("api_key"),
            CredentialError::not_found("secret/bugzilla"),
        )
        .unwrap();
        let denied: SecretString = recover(
            BackendKind::VaultKv,
            "bugzilla",
            Some("api_key"),
            CredentialError::permission_denied("secret/bugzilla", "403 Forbidden"),
        )
        .unwrap();

        assert_eq!(missing, denied);
        assert!(logs_contain("error_kind=not_found"));
        assert!(logs_contain("error_kind=permission_denied"));
    }
}
