use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::Config;
use crate::credentials::{Credentials, CredentialsProvider, EnvCredentials};
use crate::errors::Result;
use crate::models::{GenerateOptions, JobSet, QueueRequest, QueueSubmission};
use crate::poll::{poll_until_settled, PollOptions, Pollable};
use crate::transport::{AuthScheme, Transport};

static SHARED: OnceCell<QueueClient> = OnceCell::const_new();

/// Client for the queue API, where each submission is one request tracked by
/// its `request_id`. Authenticates with `Authorization: Key ID:SECRET`.
///
/// A `QueueClient` is a caller-owned handle: build one per application (or
/// per runtime) and share it by reference.
///
/// # Example
///
/// ```no_run
/// use genmedia::{GenerateOptions, QueueClient, Webhook};
/// use serde_json::json;
///
/// # async fn example() -> genmedia::Result<()> {
/// let queue = QueueClient::new("key_id", "key_secret")?;
/// let request = queue
///     .submit(
///         "flux/dev",
///         &json!({ "prompt": "a paper boat on a pond" }),
///         GenerateOptions::new().with_webhook(Webhook::new("https://example.com/hook")),
///     )
///     .await?;
/// if let Some(results) = request.results() {
///     println!("{}", results.raw.url);
/// }
/// # Ok(())
/// # }
/// ```
pub struct QueueClient {
    transport: Transport,
}

impl QueueClient {
    /// Create a client with the given key pair and default settings.
    pub fn new(key_id: impl Into<String>, secret: impl Into<String>) -> Result<Self> {
        let config = Config::queue_builder().build()?;
        Self::with_config(config, Some(Credentials::new(key_id, secret)))
    }

    /// Create a client whose credentials come from the environment on first use.
    pub fn from_env() -> Result<Self> {
        Self::with_config(Config::queue_builder().build()?, None)
    }

    /// Create a client from a validated [`Config`] (see [`Config::queue_builder`]).
    pub fn with_config(config: Config, credentials: Option<Credentials>) -> Result<Self> {
        Self::with_provider(config, credentials, EnvCredentials)
    }

    /// Like [`with_config`](Self::with_config), with a custom fallback provider.
    pub fn with_provider(
        config: Config,
        credentials: Option<Credentials>,
        provider: impl CredentialsProvider + 'static,
    ) -> Result<Self> {
        let transport =
            Transport::new(config, AuthScheme::KeyAuthorization, credentials, Arc::new(provider))?;
        Ok(Self { transport })
    }

    /// A process-wide client built by [`from_env`](Self::from_env) on first
    /// call. Concurrent first calls are serialized; every caller gets the same
    /// instance.
    ///
    /// The underlying connection pool belongs to the Tokio runtime that made
    /// the first call. Once that runtime shuts down, requests through the
    /// shared client fail with "dispatch task is gone". Programs that start
    /// several runtimes (including `#[tokio::test]` suites) should own a
    /// client per runtime through [`new`](Self::new) or
    /// [`with_config`](Self::with_config) instead.
    pub async fn shared() -> Result<&'static QueueClient> {
        SHARED.get_or_try_init(|| async { Self::from_env() }).await
    }

    pub fn config(&self) -> &Config {
        self.transport.config()
    }

    /// Submit `params` to `model` (e.g. `"flux/dev"`).
    ///
    /// `params` is the whole request body; a webhook goes in the `webhook`
    /// query parameter. The response is normalized into a one-job
    /// [`JobSet`](crate::JobSet) and, unless polling is disabled, polled until
    /// it is completed, nsfw or failed.
    #[tracing::instrument(skip(self, params, options))]
    pub async fn submit(
        &self,
        model: &str,
        params: &impl Serialize,
        options: GenerateOptions,
    ) -> Result<QueueRequest> {
        let body = serde_json::to_value(params)?;
        let path = format!("/{}", model.trim_start_matches('/'));

        let webhook_url = options.webhook.as_ref().map(|w| w.url.as_str());
        let query: Vec<(&str, &str)> = webhook_url.map(|url| ("webhook", url)).into_iter().collect();

        let value = self
            .transport
            .send_with_retry(Method::POST, &path, &query, Some(&body))
            .await?;
        let submission: QueueSubmission = serde_json::from_value(value)?;
        let mut request = QueueRequest::from_submission(submission);
        info!(request_id = %request.request_id, "queue request submitted");

        if options.poll {
            self.wait(&mut request).await?;
        }
        Ok(request)
    }

    /// Fetch the current state of a request.
    pub async fn status(&self, request_id: &str) -> Result<QueueRequest> {
        let mut request = QueueRequest {
            request_id: request_id.to_string(),
            status_url: None,
            cancel_url: None,
            job_set: JobSet {
                id: request_id.to_string(),
                jobs: Vec::new(),
            },
        };
        let payload = self.transport.get(request.status_path()).await?;
        request.apply(payload)?;
        Ok(request)
    }

    /// Ask the queue to drop a request that has not finished yet.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, request_id: &str) -> Result<()> {
        let path = format!("/requests/{request_id}/cancel");
        self.transport
            .send_with_retry(Method::PUT, &path, &[], None)
            .await?;
        info!(request_id, "queue request canceled");
        Ok(())
    }

    /// Poll a request (or any trackable entity) until it settles.
    pub async fn wait<E: Pollable>(&self, entity: &mut E) -> Result<()> {
        let options = PollOptions::from(self.config());
        poll_until_settled(entity, options, |path| self.transport.get(path)).await
    }
}
