//! Authenticated HTTP client for one remote store.

use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::RemoteError;
use crate::config::{StoreConnection, SyncSettings};
use crate::models::EntityType;
use crate::util::compact_text;

/// REST namespace appended to every store base URL.
pub const API_PREFIX: &str = "wp-json/wc/v3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from(&SyncSettings::default())
    }
}

impl From<&SyncSettings> for ClientOptions {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            timeout: settings.http_timeout,
            user_agent: settings.user_agent.clone(),
        }
    }
}

/// HTTP client bound to one store's API root and credentials.
///
/// Each call is a single attempt; retry lives in `RateLimitedExecutor`.
#[derive(Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    api_base: Url,
    api_key: String,
    secret_key: String,
}

impl fmt::Debug for RemoteClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RemoteClient")
            .field("api_base", &self.api_base.as_str())
            .field("api_key", &self.api_key)
            .field("secret_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl RemoteClient {
    /// Build a client for `store`, honoring its TLS policy.
    pub fn for_store(store: &StoreConnection, options: &ClientOptions) -> Result<Self, RemoteError> {
        let api_base = Url::parse(&format!(
            "{}/{API_PREFIX}/",
            store.base_url.trim_end_matches('/')
        ))
        .map_err(|error| RemoteError::Configuration(format!("invalid store url: {error}")))?;

        let mut builder = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.as_str());
        if store.tls.accepts_invalid_certificates() {
            tracing::warn!(
                store_id = %store.store_id,
                "TLS certificate verification is disabled for this store"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            http: builder.build()?,
            api_base,
            api_key: store.api_key.clone(),
            secret_key: store.secret_key.clone(),
        })
    }

    pub const fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// `GET /{entity}?per_page={per_page}&page={page}`
    pub async fn list_page(
        &self,
        entity: EntityType,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Value>, RemoteError> {
        let url = self.endpoint(entity, None)?;
        let response = self
            .authorized(self.http.get(url))
            .query(&[("per_page", per_page), ("page", page)])
            .send()
            .await?;

        match read_json(response).await? {
            Value::Array(items) => Ok(items),
            other => Err(RemoteError::Decode(format!(
                "expected a JSON array of {}, got {}",
                entity.remote_path(),
                json_kind(&other)
            ))),
        }
    }

    /// `POST /{entity}`
    pub async fn create<B>(&self, entity: EntityType, body: &B) -> Result<Value, RemoteError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.endpoint(entity, None)?;
        let response = self.authorized(self.http.post(url)).json(body).send().await?;
        read_json(response).await
    }

    /// `PUT /{entity}/{id}`
    pub async fn update<B>(&self, entity: EntityType, id: i64, body: &B) -> Result<Value, RemoteError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.endpoint(entity, Some(id))?;
        let response = self.authorized(self.http.put(url)).json(body).send().await?;
        read_json(response).await
    }

    /// `DELETE /{entity}/{id}?force=true`
    pub async fn delete(&self, entity: EntityType, id: i64) -> Result<Value, RemoteError> {
        let url = self.endpoint(entity, Some(id))?;
        let response = self
            .authorized(self.http.delete(url))
            .query(&[("force", "true")])
            .send()
            .await?;
        read_json(response).await
    }

    fn endpoint(&self, entity: EntityType, id: Option<i64>) -> Result<Url, RemoteError> {
        let path = match id {
            Some(id) => format!("{}/{id}", entity.remote_path()),
            None => entity.remote_path().to_string(),
        };
        self.api_base
            .join(&path)
            .map_err(|error| RemoteError::Configuration(format!("invalid endpoint {path}: {error}")))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.query(&[
            ("consumer_key", self.api_key.as_str()),
            ("consumer_secret", self.secret_key.as_str()),
        ])
    }
}

async fn read_json(response: Response) -> Result<Value, RemoteError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(RemoteError::RateLimited {
            retry_after: parse_retry_after(response.headers()),
        });
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RemoteError::Status {
            status: status.as_u16(),
            body: parse_api_error(&body),
        });
    }

    Ok(response.json::<Value>().await?)
}

/// `Retry-After` in delta-seconds; HTTP-date and out-of-range values are treated as absent.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let seconds = value.parse::<f64>().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    message: Option<String>,
}

fn parse_api_error(body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        match (payload.message, payload.code) {
            (Some(message), Some(code)) => return compact_text(&format!("{message} ({code})")),
            (Some(message), None) => return compact_text(&message),
            (None, Some(code)) => return compact_text(&code),
            (None, None) => {}
        }
    }
    compact_text(body)
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsPolicy;
    use reqwest::header::HeaderValue;

    fn store() -> StoreConnection {
        StoreConnection::new("store-1", "https://shop.example.com/", "ck_1", "cs_1").unwrap()
    }

    #[test]
    fn api_base_appends_rest_namespace() {
        let client = RemoteClient::for_store(&store(), &ClientOptions::default()).unwrap();
        assert_eq!(
            client.api_base().as_str(),
            "https://shop.example.com/wp-json/wc/v3/"
        );
        assert_eq!(
            client
                .endpoint(EntityType::Order, Some(42))
                .unwrap()
                .as_str(),
            "https://shop.example.com/wp-json/wc/v3/orders/42"
        );
    }

    #[test]
    fn insecure_policy_still_builds_client() {
        let store = store().with_tls(TlsPolicy::AcceptInvalidCertificates);
        assert!(RemoteClient::for_store(&store, &ClientOptions::default()).is_ok());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let client = RemoteClient::for_store(&store(), &ClientOptions::default()).unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("cs_1"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn retry_after_accepts_seconds_only() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(7)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("1.5"));
        assert_eq!(
            parse_retry_after(&headers),
            Some(Duration::from_millis(1_500))
        );

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("1e30"));
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("-3"));
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("NaN"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn api_error_body_prefers_message_and_code() {
        assert_eq!(
            parse_api_error(r#"{"code":"woocommerce_rest_authentication_error","message":"Invalid signature"}"#),
            "Invalid signature (woocommerce_rest_authentication_error)"
        );
        assert_eq!(parse_api_error("  plain failure "), "plain failure");
    }
}
