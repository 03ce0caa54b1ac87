// Copyright (c) 2022 Tomohide Takao
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

//! Error taxonomy shared by the directory adapter, the evaluator and the
//! HTTP layer.

use aws_sdk_iam::types::SdkError;
use aws_smithy_types::retry::ProvideErrorKind;
use aws_types::credentials::CredentialsError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Service error codes that mean the caller's identity was rejected or lacks
/// permission for the operation.
const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "InvalidClientTokenId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "UnrecognizedClientException",
];

const NOT_FOUND_CODE: &str = "NoSuchEntity";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("no AWS credentials could be loaded: {0}")]
    NoCredentials(String),

    #[error("AWS credentials are incomplete: {0}")]
    IncompleteCredentials(String),

    #[error("access denied calling {operation}: {message}")]
    AccessDenied {
        operation: &'static str,
        message: String,
    },

    #[error("{resource} not found: {name}")]
    NotFound {
        resource: &'static str,
        name: String,
    },

    #[error("directory call {operation} failed: {message}")]
    DirectoryUnavailable {
        operation: &'static str,
        code: Option<String>,
        message: String,
    },

    #[error("invalid threshold: {0} hours (must be zero or greater)")]
    InvalidThreshold(i64),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn malformed(operation: &'static str, message: impl Into<String>) -> Self {
        Error::DirectoryUnavailable {
            operation,
            code: None,
            message: message.into(),
        }
    }

    /// Maps a service error code returned by IAM or STS onto the taxonomy.
    ///
    /// `name` identifies the entity the call was about, if any, and is used
    /// for `NotFound` errors.
    pub(crate) fn from_service_code(
        operation: &'static str,
        name: Option<&str>,
        code: Option<&str>,
        message: String,
    ) -> Self {
        match code {
            Some(c) if ACCESS_DENIED_CODES.contains(&c) => Error::AccessDenied { operation, message },
            Some(NOT_FOUND_CODE) => Error::NotFound {
                resource: resource_of(operation),
                name: name.unwrap_or_default().to_string(),
            },
            _ => Error::DirectoryUnavailable {
                operation,
                code: code.map(str::to_string),
                message,
            },
        }
    }

    fn from_service_error<E>(operation: &'static str, name: Option<&str>, err: &E) -> Self
    where
        E: ProvideErrorKind + std::fmt::Display,
    {
        Error::from_service_code(operation, name, err.code(), err.to_string())
    }

    /// Classifies an SDK failure of `operation`.
    pub(crate) fn from_sdk<E>(operation: &'static str, name: Option<&str>, err: SdkError<E>) -> Self
    where
        E: ProvideErrorKind + std::error::Error + Send + Sync + 'static,
    {
        match err {
            SdkError::ServiceError { err, .. } => Error::from_service_error(operation, name, &err),
            SdkError::ConstructionFailure(source) => credentials_error(&*source).unwrap_or_else(|| {
                Error::DirectoryUnavailable {
                    operation,
                    code: None,
                    message: source.to_string(),
                }
            }),
            other => Error::DirectoryUnavailable {
                operation,
                code: None,
                message: other.to_string(),
            },
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Error::NoCredentials(_) => "no_credentials",
            Error::IncompleteCredentials(_) => "incomplete_credentials",
            Error::AccessDenied { .. } => "access_denied",
            Error::NotFound { .. } => "not_found",
            Error::DirectoryUnavailable { .. } => "directory_unavailable",
            Error::InvalidThreshold(_) => "invalid_threshold",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NoCredentials(_) | Error::IncompleteCredentials(_) | Error::AccessDenied { .. } => {
                StatusCode::FORBIDDEN
            }
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::InvalidThreshold(_) => StatusCode::BAD_REQUEST,
            Error::DirectoryUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Kind of entity an operation looks up, for `NotFound` errors.
fn resource_of(operation: &str) -> &'static str {
    match operation {
        "GetUser" | "ListAccessKeys" => "user",
        "ListAccountAliases" | "GetAccountSummary" => "account",
        "GetCallerIdentity" => "caller identity",
        _ => "entity",
    }
}

// Credential failures happen while the request is being signed, so they show
// up as construction failures with the provider error somewhere in the chain.
fn credentials_error(err: &(dyn std::error::Error + 'static)) -> Option<Error> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(creds) = e.downcast_ref::<CredentialsError>() {
            return Some(match creds {
                CredentialsError::InvalidConfiguration { .. } => {
                    Error::IncompleteCredentials(creds.to_string())
                }
                _ => Error::NoCredentials(creds.to_string()),
            });
        }
        current = e.source();
    }
    None
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match status {
            StatusCode::INTERNAL_SERVER_ERROR => tracing::error!(error = %self, "request failed"),
            _ => tracing::warn!(error = %self, "request rejected"),
        }

        let mut body = serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        if let Error::DirectoryUnavailable { code: Some(code), .. } = &self {
            body["code"] = serde_json::Value::String(code.clone());
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_iam::error::ListUsersError;
    use aws_smithy_types::retry::ErrorKind;
    use std::fmt;

    #[derive(Debug)]
    struct ServiceFault {
        code: &'static str,
    }

    impl fmt::Display for ServiceFault {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}: the service said no", self.code)
        }
    }

    impl ProvideErrorKind for ServiceFault {
        fn retryable_error_kind(&self) -> Option<ErrorKind> {
            None
        }

        fn code(&self) -> Option<&str> {
            Some(self.code)
        }
    }

    /// Signing-stage error that wraps the provider failure one level down.
    #[derive(Debug)]
    struct SigningFailed(CredentialsError);

    impl fmt::Display for SigningFailed {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "failed to load credentials for signing")
        }
    }

    impl std::error::Error for SigningFailed {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    fn construction_failure<T>(source: T) -> SdkError<ListUsersError>
    where
        T: std::error::Error + Send + Sync + 'static,
    {
        SdkError::ConstructionFailure(Box::new(source))
    }

    #[test]
    fn test_missing_credentials_from_sdk() {
        let err = Error::from_sdk(
            "ListUsers",
            None,
            construction_failure(CredentialsError::not_loaded("no providers in chain")),
        );
        assert!(matches!(err, Error::NoCredentials(_)), "{err:?}");
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_invalid_credentials_config_from_sdk() {
        let err = Error::from_sdk(
            "ListUsers",
            None,
            construction_failure(CredentialsError::invalid_configuration(
                "aws_secret_access_key is missing",
            )),
        );
        assert!(matches!(err, Error::IncompleteCredentials(_)), "{err:?}");
    }

    #[test]
    fn test_credentials_error_found_down_the_source_chain() {
        let err = Error::from_sdk(
            "ListUsers",
            None,
            construction_failure(SigningFailed(CredentialsError::not_loaded(
                "no providers in chain",
            ))),
        );
        assert!(matches!(err, Error::NoCredentials(_)), "{err:?}");
    }

    #[test]
    fn test_construction_failure_without_credentials_error() {
        let err = Error::from_sdk(
            "ListUsers",
            None,
            construction_failure(std::io::Error::new(
                std::io::ErrorKind::Other,
                "could not build request",
            )),
        );
        match err {
            Error::DirectoryUnavailable { operation, code, message } => {
                assert_eq!(operation, "ListUsers");
                assert_eq!(code, None);
                assert!(message.contains("could not build request"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_service_error_uses_provider_code() {
        let denied =
            Error::from_service_error("ListUsers", None, &ServiceFault { code: "AccessDenied" });
        assert!(matches!(denied, Error::AccessDenied { operation: "ListUsers", .. }));

        let missing = Error::from_service_error(
            "ListAccessKeys",
            Some("carol"),
            &ServiceFault { code: "NoSuchEntity" },
        );
        assert_eq!(
            missing,
            Error::NotFound {
                resource: "user",
                name: "carol".to_string()
            }
        );

        let failed =
            Error::from_service_error("ListUsers", None, &ServiceFault { code: "ServiceFailure" });
        match failed {
            Error::DirectoryUnavailable { code, message, .. } => {
                assert_eq!(code.as_deref(), Some("ServiceFailure"));
                assert!(message.contains("the service said no"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_not_found_resource_follows_operation() {
        let err = Error::from_service_code(
            "ListAccountAliases",
            None,
            Some("NoSuchEntity"),
            "missing".to_string(),
        );
        assert!(matches!(err, Error::NotFound { resource: "account", .. }));

        let err = Error::from_service_code(
            "GetCallerIdentity",
            None,
            Some("NoSuchEntity"),
            "missing".to_string(),
        );
        assert!(matches!(err, Error::NotFound { resource: "caller identity", .. }));
    }

    #[test]
    fn test_access_denied_codes() {
        for code in ["AccessDenied", "InvalidClientTokenId", "ExpiredToken"] {
            let err = Error::from_service_code("ListUsers", None, Some(code), "nope".to_string());
            assert!(matches!(err, Error::AccessDenied { operation: "ListUsers", .. }), "{code}");
            assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        }
    }

    #[test]
    fn test_no_such_entity_is_not_found() {
        let err = Error::from_service_code(
            "GetUser",
            Some("alice"),
            Some("NoSuchEntity"),
            "The user with name alice cannot be found.".to_string(),
        );
        assert_eq!(
            err,
            Error::NotFound {
                resource: "user",
                name: "alice".to_string()
            }
        );
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.to_string().contains("alice"));
    }

    #[test]
    fn test_other_codes_are_directory_unavailable() {
        let err = Error::from_service_code(
            "ListUsers",
            None,
            Some("Throttling"),
            "Rate exceeded".to_string(),
        );
        match &err {
            Error::DirectoryUnavailable { operation, code, message } => {
                assert_eq!(*operation, "ListUsers");
                assert_eq!(code.as_deref(), Some("Throttling"));
                assert_eq!(message, "Rate exceeded");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_credential_errors_are_forbidden() {
        assert_eq!(
            Error::NoCredentials("none".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::IncompleteCredentials("partial".into()).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_invalid_threshold_is_bad_request() {
        let err = Error::InvalidThreshold(-3);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("-3"));
    }

    #[tokio::test]
    async fn test_into_response_body() {
        let response = Error::DirectoryUnavailable {
            operation: "ListUsers",
            code: Some("ServiceFailure".to_string()),
            message: "boom".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "directory_unavailable");
        assert_eq!(json["code"], "ServiceFailure");
        assert!(json["message"].as_str().unwrap().contains("boom"));
    }
}
