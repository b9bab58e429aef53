use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::config::{Config, ConfigBuilder};
use crate::credentials::{Credentials, CredentialsProvider, EnvCredentials};
use crate::errors::Result;
use crate::models::{CustomReference, GenerateOptions, JobSet, UploadTicket, UploadedFile};
use crate::poll::{poll_until_settled, PollOptions, Pollable};
use crate::transport::{AuthScheme, Transport};

/// Builder for constructing a [`Client`] with custom configuration.
///
/// # Example
///
/// ```no_run
/// use genmedia::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> genmedia::Result<()> {
/// let client = ClientBuilder::new()
///     .credentials("key_id", "key_secret")
///     .max_retries(5)
///     .max_poll_time(Duration::from_secs(300))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    credentials: Option<Credentials>,
    provider: Arc<dyn CredentialsProvider>,
    config: ConfigBuilder,
}

impl ClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            credentials: None,
            provider: Arc::new(EnvCredentials),
            config: ConfigBuilder::new(),
        }
    }

    /// Set the API key pair for authentication.
    pub fn credentials(mut self, key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(key_id, secret));
        self
    }

    /// Where to look for credentials when none were set explicitly
    /// (defaults to [`EnvCredentials`]).
    pub fn credentials_provider(mut self, provider: impl CredentialsProvider + 'static) -> Self {
        self.provider = Arc::new(provider);
        self
    }

    /// Override the base URL (defaults to `https://api.genmedia.dev`).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config = self.config.base_url(url);
        self
    }

    /// Set the maximum number of retries for transient errors (0 to 5, defaults to 3).
    pub fn max_retries(mut self, n: u32) -> Self {
        self.config = self.config.max_retries(n);
        self
    }

    /// Set the HTTP request timeout (defaults to 60 seconds).
    pub fn timeout(mut self, d: Duration) -> Self {
        self.config = self.config.timeout(d);
        self
    }

    pub fn retry_backoff(mut self, d: Duration) -> Self {
        self.config = self.config.retry_backoff(d);
        self
    }

    pub fn retry_max_backoff(mut self, d: Duration) -> Self {
        self.config = self.config.retry_max_backoff(d);
        self
    }

    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.config = self.config.poll_interval(d);
        self
    }

    pub fn max_poll_time(mut self, d: Duration) -> Self {
        self.config = self.config.max_poll_time(d);
        self
    }

    /// Add a header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config = self.config.header(name, value);
        self
    }

    /// Build the [`Client`].
    ///
    /// Configuration is validated here; credentials are not. Without explicit
    /// credentials the provider is consulted on the first request, which fails
    /// with [`GenMediaError::CredentialsMissing`](crate::GenMediaError::CredentialsMissing)
    /// if nothing is found.
    pub fn build(self) -> Result<Client> {
        let config = self.config.build()?;
        Client::from_parts(config, self.credentials, self.provider)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Client for the job-set API.
///
/// Submissions return a [`JobSet`]; by default the client polls it until one
/// of its jobs settles.
///
/// # Example
///
/// ```no_run
/// use genmedia::{Client, GenerateOptions};
/// use serde_json::json;
///
/// # async fn example() -> genmedia::Result<()> {
/// let client = Client::new("key_id", "key_secret")?;
///
/// let job_set = client
///     .generate("text-to-image", &json!({ "prompt": "a lighthouse at dusk" }), GenerateOptions::new())
///     .await?;
/// for result in job_set.results() {
///     println!("{}", result.raw.url);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Client {
    transport: Transport,
}

impl Client {
    /// Create a new client with the given key pair and default settings.
    ///
    /// For customization, use [`ClientBuilder`] instead.
    pub fn new(key_id: impl Into<String>, secret: impl Into<String>) -> Result<Self> {
        ClientBuilder::new().credentials(key_id, secret).build()
    }

    /// Create a client from an already validated [`Config`].
    pub fn with_config(config: Config, credentials: Option<Credentials>) -> Result<Self> {
        Self::from_parts(config, credentials, Arc::new(EnvCredentials))
    }

    fn from_parts(
        config: Config,
        credentials: Option<Credentials>,
        provider: Arc<dyn CredentialsProvider>,
    ) -> Result<Self> {
        let transport = Transport::new(config, AuthScheme::KeyHeaders, credentials, provider)?;
        Ok(Self { transport })
    }

    pub fn config(&self) -> &Config {
        self.transport.config()
    }

    /// Submit a generation to `endpoint` (e.g. `"text-to-image"`).
    ///
    /// `params` is sent as the `params` field of the request body, alongside
    /// the optional webhook. The submission is retried on transient failures.
    /// Unless [`GenerateOptions::without_polling`] was used, the returned set
    /// has been polled until settled.
    ///
    /// # Errors
    ///
    /// - [`GenMediaError::Validation`](crate::GenMediaError::Validation) /
    ///   [`GenMediaError::BadInput`](crate::GenMediaError::BadInput) if the API rejects `params`.
    /// - [`GenMediaError::Timeout`](crate::GenMediaError::Timeout) if polling exceeds `max_poll_time`.
    #[tracing::instrument(skip(self, params, options))]
    pub async fn generate(
        &self,
        endpoint: &str,
        params: &impl Serialize,
        options: GenerateOptions,
    ) -> Result<JobSet> {
        let body = submission_body(params, &options)?;
        let path = format!("/v1/{}", endpoint.trim_start_matches('/'));

        let value = self
            .transport
            .send_with_retry(Method::POST, &path, &[], Some(&body))
            .await?;
        let mut job_set: JobSet = serde_json::from_value(value)?;
        info!(job_set = %job_set.id, jobs = job_set.jobs.len(), "job set submitted");

        if options.poll {
            self.wait(&mut job_set).await?;
        }
        Ok(job_set)
    }

    /// Fetch the current state of a job set by its identifier.
    pub async fn get_job_set(&self, id: &str) -> Result<JobSet> {
        let mut job_set = JobSet {
            id: id.to_string(),
            jobs: Vec::new(),
        };
        let payload = self.transport.get(job_set.status_path()).await?;
        job_set.apply(payload)?;
        Ok(job_set)
    }

    /// Submit a custom reference for training, polling it unless disabled.
    #[tracing::instrument(skip(self, params, options))]
    pub async fn create_custom_reference(
        &self,
        params: &impl Serialize,
        options: GenerateOptions,
    ) -> Result<CustomReference> {
        let body = submission_body(params, &options)?;
        let value = self
            .transport
            .send_with_retry(Method::POST, "/v1/custom-references", &[], Some(&body))
            .await?;
        let mut reference: CustomReference = serde_json::from_value(value)?;
        info!(reference = %reference.id, "custom reference submitted");

        if options.poll {
            self.wait(&mut reference).await?;
        }
        Ok(reference)
    }

    /// Fetch the current state of a custom reference.
    pub async fn get_custom_reference(&self, id: &str) -> Result<CustomReference> {
        let value = self
            .transport
            .get(format!("/v1/custom-references/{id}"))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Poll any trackable entity until it settles, using the client's
    /// `poll_interval` and `max_poll_time`.
    pub async fn wait<E: Pollable>(&self, entity: &mut E) -> Result<()> {
        let options = PollOptions::from(self.config());
        poll_until_settled(entity, options, |path| self.transport.get(path)).await
    }

    /// Upload raw bytes and return the URL to reference them by.
    ///
    /// This performs two HTTP calls:
    /// 1. `POST /v1/uploads` to obtain a signed upload URL.
    /// 2. `PUT` the bytes to the signed URL.
    #[tracing::instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn upload(&self, bytes: Vec<u8>, content_type: &str) -> Result<UploadedFile> {
        let body = json!({ "content_type": content_type });
        let value = self
            .transport
            .send_with_retry(Method::POST, "/v1/uploads", &[], Some(&body))
            .await?;
        let ticket: UploadTicket = serde_json::from_value(value)?;

        self.transport
            .put_bytes(&ticket.upload_url, bytes, content_type)
            .await?;

        Ok(UploadedFile {
            url: ticket.file_url,
            content_type: content_type.to_string(),
        })
    }

    /// Read a local file and [`upload`](Self::upload) it, inferring the
    /// content type from its extension.
    pub async fn upload_file(&self, path: impl AsRef<Path>) -> Result<UploadedFile> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        self.upload(bytes, content_type_for(path)).await
    }
}

/// `{"params": ..., "webhook": ...}`.
fn submission_body(params: &impl Serialize, options: &GenerateOptions) -> Result<serde_json::Value> {
    let mut body = json!({ "params": serde_json::to_value(params)? });
    if let Some(webhook) = &options.webhook {
        body["webhook"] = serde_json::to_value(webhook)?;
    }
    Ok(body)
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}
