use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue, AUTHORIZATION, CONTENT_TYPE,
};
use reqwest::Method;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::Config;
use crate::credentials::{Credentials, CredentialsProvider};
use crate::errors::{classify_response, GenMediaError, Result};
use crate::retry::{retry_with_backoff, RetryPolicy};

const KEY_ID_HEADER: HeaderName = HeaderName::from_static("x-key-id");
const KEY_SECRET_HEADER: HeaderName = HeaderName::from_static("x-key-secret");

/// Connect-phase budget, so a slow handshake surfaces as a connect error
/// rather than as the whole-request timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How credentials are presented to the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AuthScheme {
    /// `X-Key-Id` + `X-Key-Secret`.
    KeyHeaders,
    /// `Authorization: Key ID:SECRET`.
    KeyAuthorization,
}

/// JSON-over-HTTPS transport shared by both client flavours.
///
/// Non-success responses are classified into [`GenMediaError`] here, so
/// everything above this layer sees typed errors.
pub(crate) struct Transport {
    http: reqwest::Client,
    config: Config,
    auth: AuthScheme,
    credentials: OnceCell<Credentials>,
    provider: Arc<dyn CredentialsProvider>,
}

impl Transport {
    pub(crate) fn new(
        config: Config,
        auth: AuthScheme,
        credentials: Option<Credentials>,
        provider: Arc<dyn CredentialsProvider>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout().min(CONNECT_TIMEOUT))
            .default_headers(config.headers().clone())
            .build()?;

        Ok(Self {
            http,
            config,
            auth,
            credentials: OnceCell::new_with(credentials),
            provider,
        })
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    /// Explicit credentials, or the provider's answer on first use. A miss
    /// leaves the cell empty so the next request asks again.
    async fn credentials(&self) -> Result<&Credentials> {
        self.credentials
            .get_or_try_init(|| async {
                debug!("resolving credentials from provider");
                self.provider.resolve().ok_or_else(|| {
                    GenMediaError::CredentialsMissing(
                        "no API key configured; pass credentials to the builder or set \
                         GENMEDIA_KEY (or GENMEDIA_KEY_ID and GENMEDIA_KEY_SECRET)"
                            .to_string(),
                    )
                })
            })
            .await
    }

    async fn auth_headers(&self) -> Result<HeaderMap> {
        let creds = self.credentials().await?;
        let invalid = |_: InvalidHeaderValue| {
            GenMediaError::Config("credentials contain invalid header characters".into())
        };

        let mut headers = HeaderMap::new();
        match self.auth {
            AuthScheme::KeyHeaders => {
                headers.insert(KEY_ID_HEADER, HeaderValue::from_str(&creds.key_id).map_err(invalid)?);
                let mut secret = HeaderValue::from_str(&creds.secret).map_err(invalid)?;
                secret.set_sensitive(true);
                headers.insert(KEY_SECRET_HEADER, secret);
            }
            AuthScheme::KeyAuthorization => {
                let mut value =
                    HeaderValue::from_str(&format!("Key {}", creds.combined())).map_err(invalid)?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
        }
        Ok(headers)
    }

    /// One authenticated JSON request, no retries. An empty success body
    /// decodes as `null`.
    #[tracing::instrument(level = "debug", skip(self, query, body))]
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.config.base_url(), path);

        let mut req = self
            .http
            .request(method, &url)
            .headers(self.auth_headers().await?);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(status = status.as_u16(), bytes = text.len(), "response received");

        if !status.is_success() {
            return Err(classify_response(status.as_u16(), &text));
        }
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// [`send`](Self::send) wrapped in the configured retry policy.
    pub(crate) async fn send_with_retry(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value> {
        retry_with_backoff(RetryPolicy::from(&self.config), || {
            self.send(method.clone(), path, query, body)
        })
        .await
    }

    /// Single status query for the poll loop; transient failures are the
    /// loop's concern, so no retry here.
    pub(crate) async fn get(&self, path: String) -> Result<serde_json::Value> {
        self.send(Method::GET, &path, &[], None).await
    }

    /// PUT raw bytes to a pre-signed URL.
    pub(crate) async fn put_bytes(&self, url: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let response = self
            .http
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_response(status.as_u16(), &text));
        }
        Ok(())
    }
}
