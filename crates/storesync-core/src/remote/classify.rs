//! Error classification for remote failures.
//!
//! Every failure maps to exactly one [`ErrorType`]. Each type carries a fixed
//! severity, a user-facing message, and an ordered remediation checklist.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{NetworkCode, RemoteError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    SslExpired,
    SslInvalid,
    DnsError,
    ServerDown,
    Timeout,
    AuthError,
    PermissionError,
    NotFound,
    ServerError,
    NetworkError,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

struct Profile {
    severity: Severity,
    message: &'static str,
    actions: &'static [&'static str],
}

impl ErrorType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SslExpired => "ssl_expired",
            Self::SslInvalid => "ssl_invalid",
            Self::DnsError => "dns_error",
            Self::ServerDown => "server_down",
            Self::Timeout => "timeout",
            Self::AuthError => "auth_error",
            Self::PermissionError => "permission_error",
            Self::NotFound => "not_found",
            Self::ServerError => "server_error",
            Self::NetworkError => "network_error",
            Self::Unknown => "unknown",
        }
    }

    /// Only transient categories are worth re-running a job for.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::ServerError | Self::NetworkError)
    }

    pub const fn severity(self) -> Severity {
        self.profile().severity
    }

    const fn profile(self) -> Profile {
        match self {
            Self::SslExpired => Profile {
                severity: Severity::Error,
                message: "The store's SSL certificate has expired.",
                actions: &[
                    "Renew the SSL certificate for the store domain",
                    "Contact your hosting provider to install a valid certificate",
                    "Retry the sync once the certificate has been renewed",
                ],
            },
            Self::SslInvalid => Profile {
                severity: Severity::Error,
                message: "The store's SSL certificate is not trusted.",
                actions: &[
                    "Check that the certificate matches the store domain",
                    "Install a certificate issued by a trusted authority",
                    "Make sure the full certificate chain is served",
                ],
            },
            Self::DnsError => Profile {
                severity: Severity::Error,
                message: "The store's domain name could not be resolved.",
                actions: &[
                    "Check the store URL for typos",
                    "Check the domain's DNS records",
                    "Confirm the domain registration has not expired",
                ],
            },
            Self::ServerDown => Profile {
                severity: Severity::Error,
                message: "The store server refused or dropped the connection.",
                actions: &[
                    "Check that the store website is online",
                    "Check firewall or security plugin rules blocking API access",
                    "Contact your hosting provider",
                ],
            },
            Self::Timeout => Profile {
                severity: Severity::Warning,
                message: "The store took too long to respond.",
                actions: &[
                    "Retry the sync in a few minutes",
                    "Check the store server load",
                    "Contact your hosting provider if timeouts persist",
                ],
            },
            Self::AuthError => Profile {
                severity: Severity::Error,
                message: "The store rejected the API credentials.",
                actions: &[
                    "Verify the API consumer key and secret",
                    "Regenerate the API keys in the store admin",
                    "Update the store connection with the new keys",
                ],
            },
            Self::PermissionError => Profile {
                severity: Severity::Error,
                message: "The API credentials do not have permission for this operation.",
                actions: &[
                    "Grant read/write permission to the API key",
                    "Check that the store connection is enabled",
                    "Check security plugins that restrict REST API access",
                ],
            },
            Self::NotFound => Profile {
                severity: Severity::Warning,
                message: "The requested store resource was not found.",
                actions: &[
                    "Check that the store URL points at the shop root",
                    "Confirm the REST API is enabled and permalinks are configured",
                    "Check that the record still exists on the store",
                ],
            },
            Self::ServerError => Profile {
                severity: Severity::Error,
                message: "The store server returned an internal error.",
                actions: &[
                    "Retry the sync in a few minutes",
                    "Check the store's server error logs",
                    "Contact your hosting provider if the error persists",
                ],
            },
            Self::NetworkError => Profile {
                severity: Severity::Warning,
                message: "A network error prevented reaching the store.",
                actions: &[
                    "Check your network connection",
                    "Retry the sync in a few minutes",
                    "Check that the store is reachable from this network",
                ],
            },
            Self::Unknown => Profile {
                severity: Severity::Error,
                message: "An unexpected error occurred while syncing with the store.",
                actions: &[
                    "Retry the sync",
                    "Review the technical details below",
                    "Contact support if the problem persists",
                ],
            },
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure in the shape shown to callers and written to logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
    pub error_type: ErrorType,
    pub severity: Severity,
    pub user_friendly_message: String,
    pub technical_details: String,
    pub suggested_actions: Vec<String>,
    pub retryable: bool,
}

impl ClassifiedError {
    /// Build the canonical error for `error_type` with caller-supplied details.
    pub fn new(error_type: ErrorType, technical_details: impl Into<String>) -> Self {
        let profile = error_type.profile();
        Self {
            error_type,
            severity: profile.severity,
            user_friendly_message: profile.message.to_string(),
            technical_details: technical_details.into(),
            suggested_actions: profile
                .actions
                .iter()
                .map(|action| (*action).to_string())
                .collect(),
            retryable: error_type.is_retryable(),
        }
    }

    pub fn from_remote(error: &RemoteError) -> Self {
        classify(&RawFailure::from(error))
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.user_friendly_message, self.error_type, self.technical_details
        )
    }
}

impl std::error::Error for ClassifiedError {}

/// The facts a failure exposes: an HTTP status, a network code, or neither.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFailure {
    pub status: Option<u16>,
    pub code: Option<NetworkCode>,
    /// Set when the request never produced an HTTP response
    pub transport: bool,
    pub details: String,
}

impl RawFailure {
    pub fn status(status: u16) -> Self {
        Self {
            status: Some(status),
            details: format!("HTTP {status}"),
            ..Self::default()
        }
    }

    pub fn code(code: &str) -> Self {
        Self {
            code: Some(NetworkCode::parse(code)),
            transport: true,
            details: code.to_string(),
            ..Self::default()
        }
    }
}

impl From<&RemoteError> for RawFailure {
    fn from(error: &RemoteError) -> Self {
        let details = error.to_string();
        match error {
            RemoteError::Transport { code, .. } => Self {
                status: None,
                code: code.clone(),
                transport: true,
                details,
            },
            other => Self {
                status: other.status(),
                code: None,
                transport: false,
                details,
            },
        }
    }
}

/// Map raw failure facts onto the taxonomy. Total: anything unrecognized is `Unknown`.
pub fn classify(raw: &RawFailure) -> ClassifiedError {
    ClassifiedError::new(categorize(raw), raw.details.clone())
}

fn categorize(raw: &RawFailure) -> ErrorType {
    if let Some(code) = &raw.code {
        match code {
            NetworkCode::CertHasExpired => return ErrorType::SslExpired,
            NetworkCode::DepthZeroSelfSignedCert
            | NetworkCode::SelfSignedCertInChain
            | NetworkCode::UnableToVerifyLeafSignature
            | NetworkCode::UnableToGetIssuerCertLocally
            | NetworkCode::CertAltNameInvalid => return ErrorType::SslInvalid,
            NetworkCode::DnsNotFound | NetworkCode::DnsTryAgain => return ErrorType::DnsError,
            NetworkCode::ConnectionRefused | NetworkCode::ConnectionReset => {
                return ErrorType::ServerDown
            }
            NetworkCode::TimedOut | NetworkCode::ConnectionAborted | NetworkCode::SocketTimedOut => {
                return ErrorType::Timeout
            }
            NetworkCode::NetworkUnreachable
            | NetworkCode::HostUnreachable
            | NetworkCode::Other(_) => {}
        }
    }

    match raw.status {
        Some(401) => ErrorType::AuthError,
        Some(403) => ErrorType::PermissionError,
        Some(404) => ErrorType::NotFound,
        Some(status) if status >= 500 => ErrorType::ServerError,
        Some(_) => ErrorType::Unknown,
        None if raw.transport => ErrorType::NetworkError,
        None => ErrorType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn expired_certificate_is_ssl_expired_error() {
        let classified = classify(&RawFailure::code("CERT_HAS_EXPIRED"));
        assert_eq!(classified.error_type, ErrorType::SslExpired);
        assert_eq!(classified.severity, Severity::Error);
        assert!(!classified.retryable);
    }

    #[test]
    fn connection_refused_is_server_down() {
        let classified = classify(&RawFailure::code("ECONNREFUSED"));
        assert_eq!(classified.error_type, ErrorType::ServerDown);
    }

    #[test]
    fn unreachable_network_is_retryable_network_error() {
        let classified = classify(&RawFailure::code("ENETUNREACH"));
        assert_eq!(classified.error_type, ErrorType::NetworkError);
        assert!(classified.retryable);
    }

    #[test]
    fn http_statuses_map_to_categories() {
        let cases = [
            (401, ErrorType::AuthError),
            (403, ErrorType::PermissionError),
            (404, ErrorType::NotFound),
            (500, ErrorType::ServerError),
            (503, ErrorType::ServerError),
            (429, ErrorType::Unknown),
            (400, ErrorType::Unknown),
        ];
        for (status, expected) in cases {
            assert_eq!(classify(&RawFailure::status(status)).error_type, expected);
        }
    }

    #[test]
    fn only_transient_categories_are_retryable() {
        let retryable: Vec<ErrorType> = [
            ErrorType::SslExpired,
            ErrorType::SslInvalid,
            ErrorType::DnsError,
            ErrorType::ServerDown,
            ErrorType::Timeout,
            ErrorType::AuthError,
            ErrorType::PermissionError,
            ErrorType::NotFound,
            ErrorType::ServerError,
            ErrorType::NetworkError,
            ErrorType::Unknown,
        ]
        .into_iter()
        .filter(|error_type| error_type.is_retryable())
        .collect();
        assert_eq!(
            retryable,
            vec![
                ErrorType::Timeout,
                ErrorType::ServerError,
                ErrorType::NetworkError
            ]
        );
    }

    #[test]
    fn every_category_has_ordered_actions() {
        let classified = ClassifiedError::new(ErrorType::AuthError, "HTTP 401");
        assert_eq!(
            classified.suggested_actions.first().map(String::as_str),
            Some("Verify the API consumer key and secret")
        );
        assert_eq!(classified.technical_details, "HTTP 401");
    }

    #[test]
    fn remote_errors_classify_through_raw_failure() {
        let transport = RemoteError::Transport {
            code: None,
            message: "connection closed before message completed".to_string(),
        };
        assert_eq!(
            ClassifiedError::from_remote(&transport).error_type,
            ErrorType::NetworkError
        );

        let decode = RemoteError::Decode("expected an array".to_string());
        assert_eq!(
            ClassifiedError::from_remote(&decode).error_type,
            ErrorType::Unknown
        );

        let unauthorized = RemoteError::Status {
            status: 401,
            body: "woocommerce_rest_cannot_view".to_string(),
        };
        let classified = ClassifiedError::from_remote(&unauthorized);
        assert_eq!(classified.error_type, ErrorType::AuthError);
        assert!(classified.technical_details.contains("woocommerce_rest_cannot_view"));
    }

    #[test]
    fn timeout_code_wins_over_missing_status() {
        let classified = classify(&RawFailure::code("ETIMEDOUT"));
        assert_eq!(classified.error_type, ErrorType::Timeout);
        assert_eq!(classified.severity, Severity::Warning);
        assert!(classified.retryable);
    }
}
