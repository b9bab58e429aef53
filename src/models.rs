use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::poll::Pollable;

/// Lifecycle of a single generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Nsfw,
    Canceled,
}

impl JobStatus {
    /// Terminal = won't change anymore.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Nsfw | Self::Canceled
        )
    }
}

/// A generated file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MediaResult {
    pub url: String,
    /// e.g. "image/png", "video/mp4".
    #[serde(default)]
    pub media_type: Option<String>,
}

/// Full-size and reduced renditions of a job's output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JobResults {
    pub raw: MediaResult,
    pub min: MediaResult,
}

impl JobResults {
    /// Both slots filled with the same file.
    fn single(media: MediaResult) -> Self {
        Self {
            raw: media.clone(),
            min: media,
        }
    }
}

/// One unit of generation work inside a [`JobSet`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub results: Option<JobResults>,
}

/// A batch of jobs created by one submission.
///
/// Polling replaces `jobs` wholesale with each fresh status payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JobSet {
    pub id: String,
    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl JobSet {
    fn any(&self, status: JobStatus) -> bool {
        self.jobs.iter().any(|j| j.status == status)
    }

    /// At least one job reached a terminal status.
    pub fn is_settled(&self) -> bool {
        self.jobs.iter().any(|j| j.status.is_terminal())
    }

    pub fn is_completed(&self) -> bool {
        self.any(JobStatus::Completed)
    }

    pub fn is_failed(&self) -> bool {
        self.any(JobStatus::Failed)
    }

    pub fn is_nsfw(&self) -> bool {
        self.any(JobStatus::Nsfw)
    }

    pub fn is_canceled(&self) -> bool {
        self.any(JobStatus::Canceled)
    }

    /// Results of every job that has them, in job order.
    pub fn results(&self) -> Vec<&JobResults> {
        self.jobs.iter().filter_map(|j| j.results.as_ref()).collect()
    }
}

impl Pollable for JobSet {
    fn status_path(&self) -> String {
        format!("/v1/job-sets/{}", self.id)
    }

    fn apply(&mut self, payload: serde_json::Value) -> Result<()> {
        let refreshed: JobSetPayload = serde_json::from_value(payload)?;
        self.jobs = refreshed.jobs;
        Ok(())
    }

    fn is_settled(&self) -> bool {
        JobSet::is_settled(self)
    }
}

/// Lifecycle of a custom reference (a trained style or subject).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceStatus {
    NotReady,
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl ReferenceStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A custom reference tracked through training.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CustomReference {
    pub id: String,
    pub status: ReferenceStatus,
}

impl CustomReference {
    pub fn is_completed(&self) -> bool {
        self.status == ReferenceStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == ReferenceStatus::Failed
    }
}

impl Pollable for CustomReference {
    fn status_path(&self) -> String {
        format!("/v1/custom-references/{}", self.id)
    }

    fn apply(&mut self, payload: serde_json::Value) -> Result<()> {
        let refreshed: ReferencePayload = serde_json::from_value(payload)?;
        self.status = refreshed.status;
        Ok(())
    }

    fn is_settled(&self) -> bool {
        self.status.is_terminal()
    }
}

/// A request tracked by the queue API, normalized into a one-job [`JobSet`]
/// whose job and set both carry the `request_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRequest {
    pub request_id: String,
    pub status_url: Option<String>,
    pub cancel_url: Option<String>,
    pub job_set: JobSet,
}

impl QueueRequest {
    pub(crate) fn from_submission(sub: QueueSubmission) -> Self {
        let job_set = normalize(&sub.request_id, sub.status);
        Self {
            request_id: sub.request_id,
            status_url: sub.status_url,
            cancel_url: sub.cancel_url,
            job_set,
        }
    }

    /// Status of the single normalized job.
    pub fn status(&self) -> Option<JobStatus> {
        self.job_set.jobs.first().map(|j| j.status)
    }

    /// Completed, nsfw or failed.
    pub fn is_settled(&self) -> bool {
        self.status().is_some_and(|s| {
            matches!(s, JobStatus::Completed | JobStatus::Nsfw | JobStatus::Failed)
        })
    }

    pub fn results(&self) -> Option<&JobResults> {
        self.job_set.jobs.first().and_then(|j| j.results.as_ref())
    }
}

impl Pollable for QueueRequest {
    fn status_path(&self) -> String {
        format!("/requests/{}/status", self.request_id)
    }

    fn apply(&mut self, payload: serde_json::Value) -> Result<()> {
        let refreshed: QueueStatusPayload = serde_json::from_value(payload)?;
        self.job_set = normalize(&self.request_id, refreshed);
        Ok(())
    }

    fn is_settled(&self) -> bool {
        QueueRequest::is_settled(self)
    }
}

/// Outbound notification attached to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Webhook {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl Webhook {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            secret: None,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }
}

/// Per-call options for submissions.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Notify this endpoint when the work settles.
    pub webhook: Option<Webhook>,
    /// Poll until settled before returning. Default: true.
    pub poll: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            webhook: None,
            poll: true,
        }
    }
}

impl GenerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_webhook(mut self, webhook: Webhook) -> Self {
        self.webhook = Some(webhook);
        self
    }

    /// Return right after submission.
    pub fn without_polling(mut self) -> Self {
        self.poll = false;
        self
    }
}

/// A file written through the upload endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Where the file can be referenced from generation params.
    pub url: String,
    pub content_type: String,
}

// ---------------------------------------------------------------------------
// Internal deserialization helpers (not part of the public API surface)
// ---------------------------------------------------------------------------

/// GET /v1/job-sets/{id} response.
#[derive(Deserialize)]
pub(crate) struct JobSetPayload {
    #[serde(default)]
    pub jobs: Vec<Job>,
}

/// GET /v1/custom-references/{id} response.
#[derive(Deserialize)]
pub(crate) struct ReferencePayload {
    pub status: ReferenceStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct QueueMedia {
    pub url: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl From<QueueMedia> for MediaResult {
    fn from(media: QueueMedia) -> Self {
        MediaResult {
            url: media.url,
            media_type: media.content_type,
        }
    }
}

/// Queue status payload: `status` plus whatever output exists so far.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct QueueStatusPayload {
    pub status: JobStatus,
    #[serde(default)]
    pub images: Vec<QueueMedia>,
    #[serde(default)]
    pub video: Option<QueueMedia>,
}

/// POST /{model} response on the queue API.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct QueueSubmission {
    pub request_id: String,
    #[serde(default)]
    pub status_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
    #[serde(flatten)]
    pub status: QueueStatusPayload,
}

/// POST /v1/uploads response.
#[derive(Deserialize)]
pub(crate) struct UploadTicket {
    pub upload_url: String,
    pub file_url: String,
}

/// The first image, else the video, fills both result slots.
fn normalize(request_id: &str, payload: QueueStatusPayload) -> JobSet {
    let media = payload
        .images
        .into_iter()
        .next()
        .or(payload.video)
        .map(MediaResult::from);

    JobSet {
        id: request_id.to_string(),
        jobs: vec![Job {
            id: request_id.to_string(),
            status: payload.status,
            results: media.map(JobResults::single),
        }],
    }
}
