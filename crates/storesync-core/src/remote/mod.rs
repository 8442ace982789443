//! Remote commerce platform access: client, pagination, retry, and error classification.

mod classify;
mod client;
mod pages;
mod retry;

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::util::compact_text;

pub use classify::{classify, ClassifiedError, ErrorType, RawFailure, Severity};
pub use client::{ClientOptions, RemoteClient, API_PREFIX};
pub use pages::{fetch_all, PageSource, PageStream, PAGE_SIZE};
pub use retry::{rate_limit_wait, RateLimitedExecutor, RetryPolicy};

/// Failure of a single call to the remote platform.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP 429; `retry_after` comes from the `Retry-After` header when present
    #[error("rate limited by remote store (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Any other non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// No HTTP response was received
    #[error("transport error: {message}")]
    Transport {
        code: Option<NetworkCode>,
        message: String,
    },

    /// Response arrived but could not be interpreted
    #[error("invalid response from remote store: {0}")]
    Decode(String),

    #[error("invalid remote client configuration: {0}")]
    Configuration(String),

    #[error("remote call cancelled")]
    Cancelled,
}

impl RemoteError {
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Low-level network failure codes, named the way TLS and socket stacks report them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NetworkCode {
    CertHasExpired,
    DepthZeroSelfSignedCert,
    SelfSignedCertInChain,
    UnableToVerifyLeafSignature,
    UnableToGetIssuerCertLocally,
    CertAltNameInvalid,
    DnsNotFound,
    DnsTryAgain,
    ConnectionRefused,
    ConnectionReset,
    TimedOut,
    ConnectionAborted,
    SocketTimedOut,
    NetworkUnreachable,
    HostUnreachable,
    Other(String),
}

impl NetworkCode {
    pub fn parse(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "CERT_HAS_EXPIRED" => Self::CertHasExpired,
            "DEPTH_ZERO_SELF_SIGNED_CERT" => Self::DepthZeroSelfSignedCert,
            "SELF_SIGNED_CERT_IN_CHAIN" => Self::SelfSignedCertInChain,
            "UNABLE_TO_VERIFY_LEAF_SIGNATURE" => Self::UnableToVerifyLeafSignature,
            "UNABLE_TO_GET_ISSUER_CERT_LOCALLY" => Self::UnableToGetIssuerCertLocally,
            "ERR_TLS_CERT_ALTNAME_INVALID" => Self::CertAltNameInvalid,
            "ENOTFOUND" => Self::DnsNotFound,
            "EAI_AGAIN" => Self::DnsTryAgain,
            "ECONNREFUSED" => Self::ConnectionRefused,
            "ECONNRESET" => Self::ConnectionReset,
            "ETIMEDOUT" => Self::TimedOut,
            "ECONNABORTED" => Self::ConnectionAborted,
            "ESOCKETTIMEDOUT" => Self::SocketTimedOut,
            "ENETUNREACH" => Self::NetworkUnreachable,
            "EHOSTUNREACH" => Self::HostUnreachable,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::CertHasExpired => "CERT_HAS_EXPIRED",
            Self::DepthZeroSelfSignedCert => "DEPTH_ZERO_SELF_SIGNED_CERT",
            Self::SelfSignedCertInChain => "SELF_SIGNED_CERT_IN_CHAIN",
            Self::UnableToVerifyLeafSignature => "UNABLE_TO_VERIFY_LEAF_SIGNATURE",
            Self::UnableToGetIssuerCertLocally => "UNABLE_TO_GET_ISSUER_CERT_LOCALLY",
            Self::CertAltNameInvalid => "ERR_TLS_CERT_ALTNAME_INVALID",
            Self::DnsNotFound => "ENOTFOUND",
            Self::DnsTryAgain => "EAI_AGAIN",
            Self::ConnectionRefused => "ECONNREFUSED",
            Self::ConnectionReset => "ECONNRESET",
            Self::TimedOut => "ETIMEDOUT",
            Self::ConnectionAborted => "ECONNABORTED",
            Self::SocketTimedOut => "ESOCKETTIMEDOUT",
            Self::NetworkUnreachable => "ENETUNREACH",
            Self::HostUnreachable => "EHOSTUNREACH",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for NetworkCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        // The request URL carries the store credentials in its query string.
        let error = error.without_url();
        if error.is_decode() {
            return Self::Decode(error_chain(&error));
        }
        if error.is_builder() {
            return Self::Configuration(error_chain(&error));
        }
        if let Some(status) = error.status() {
            return Self::Status {
                status: status.as_u16(),
                body: compact_text(&error.to_string()),
            };
        }

        Self::Transport {
            code: detect_network_code(&error),
            message: error_chain(&error),
        }
    }
}

/// Join an error and its sources into one line.
fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

fn detect_network_code(error: &reqwest::Error) -> Option<NetworkCode> {
    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io_error) = cause.downcast_ref::<std::io::Error>() {
            match io_error.kind() {
                std::io::ErrorKind::ConnectionRefused => return Some(NetworkCode::ConnectionRefused),
                std::io::ErrorKind::ConnectionReset => return Some(NetworkCode::ConnectionReset),
                std::io::ErrorKind::ConnectionAborted => return Some(NetworkCode::ConnectionAborted),
                std::io::ErrorKind::TimedOut => return Some(NetworkCode::TimedOut),
                _ => {}
            }
        }
        source = cause.source();
    }

    let chain = error_chain(error).to_ascii_lowercase();
    code_from_message(&chain).or_else(|| error.is_timeout().then_some(NetworkCode::TimedOut))
}

/// Recognize TLS, DNS, and routing failures from their rendered messages.
fn code_from_message(message: &str) -> Option<NetworkCode> {
    if message.contains("certificate") && message.contains("expired") {
        return Some(NetworkCode::CertHasExpired);
    }
    if message.contains("notvalidforname") || message.contains("not valid for name") {
        return Some(NetworkCode::CertAltNameInvalid);
    }
    if message.contains("self signed") || message.contains("self-signed") {
        return Some(NetworkCode::DepthZeroSelfSignedCert);
    }
    if message.contains("unknownissuer") || message.contains("unknown issuer") {
        return Some(NetworkCode::UnableToGetIssuerCertLocally);
    }
    if message.contains("invalid peer certificate") || message.contains("certificate verify failed")
    {
        return Some(NetworkCode::UnableToVerifyLeafSignature);
    }
    if message.contains("dns error")
        || message.contains("failed to lookup address")
        || message.contains("name or service not known")
        || message.contains("nodename nor servname")
    {
        return Some(NetworkCode::DnsNotFound);
    }
    if message.contains("temporary failure in name resolution") {
        return Some(NetworkCode::DnsTryAgain);
    }
    if message.contains("connection refused") {
        return Some(NetworkCode::ConnectionRefused);
    }
    if message.contains("connection reset") {
        return Some(NetworkCode::ConnectionReset);
    }
    if message.contains("network is unreachable") {
        return Some(NetworkCode::NetworkUnreachable);
    }
    if message.contains("no route to host") || message.contains("host is unreachable") {
        return Some(NetworkCode::HostUnreachable);
    }
    if message.contains("timed out") {
        return Some(NetworkCode::TimedOut);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_code_parse_round_trips_known_codes() {
        for code in ["CERT_HAS_EXPIRED", "ECONNREFUSED", "ENETUNREACH", "EAI_AGAIN"] {
            assert_eq!(NetworkCode::parse(code).as_str(), code);
        }
        assert_eq!(
            NetworkCode::parse("econnreset"),
            NetworkCode::ConnectionReset
        );
        assert_eq!(
            NetworkCode::parse("EPIPE"),
            NetworkCode::Other("EPIPE".to_string())
        );
    }

    #[test]
    fn code_from_message_recognizes_rustls_and_resolver_errors() {
        assert_eq!(
            code_from_message("invalid peer certificate: expired"),
            Some(NetworkCode::CertHasExpired)
        );
        assert_eq!(
            code_from_message("invalid peer certificate: unknownissuer"),
            Some(NetworkCode::UnableToGetIssuerCertLocally)
        );
        assert_eq!(
            code_from_message("dns error: failed to lookup address information"),
            Some(NetworkCode::DnsNotFound)
        );
        assert_eq!(
            code_from_message("tcp connect error: network is unreachable (os error 101)"),
            Some(NetworkCode::NetworkUnreachable)
        );
        assert_eq!(code_from_message("something odd"), None);
    }

    #[test]
    fn remote_error_reports_status() {
        assert_eq!(RemoteError::RateLimited { retry_after: None }.status(), Some(429));
        assert_eq!(
            RemoteError::Status {
                status: 503,
                body: String::new()
            }
            .status(),
            Some(503)
        );
        assert_eq!(RemoteError::Cancelled.status(), None);
    }
}
