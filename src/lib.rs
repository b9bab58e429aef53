//! # GenMedia SDK for Rust
//!
//! Async client for the GenMedia generative image and video API. Submit
//! generation jobs, poll them to completion with bounded retries, and get
//! typed errors back when the API says no.
//!
//! Two protocol flavours are supported:
//!
//! - [`Client`] talks to the job-set API: a submission returns a [`JobSet`]
//!   of one or more [`Job`]s.
//! - [`QueueClient`] talks to the queue API: a submission returns a
//!   [`QueueRequest`], normalized into the same [`JobSet`] shape.
//!
//! ## Quick start
//!
//! ```no_run
//! use genmedia::{Client, GenerateOptions};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> genmedia::Result<()> {
//!     let client = Client::new("key_id", "key_secret")?;
//!
//!     // Submit and wait until the first job settles
//!     let job_set = client
//!         .generate("text-to-image", &json!({ "prompt": "foggy harbour" }), GenerateOptions::new())
//!         .await?;
//!
//!     if job_set.is_completed() {
//!         for result in job_set.results() {
//!             println!("{}", result.raw.url);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Builder pattern
//!
//! ```no_run
//! use genmedia::ClientBuilder;
//! use std::time::Duration;
//!
//! # fn example() -> genmedia::Result<()> {
//! let client = ClientBuilder::new()
//!     .credentials("key_id", "key_secret")
//!     .base_url("https://custom.example.com")
//!     .max_retries(5)
//!     .poll_interval(Duration::from_secs(1))
//!     .max_poll_time(Duration::from_secs(120))
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! Without explicit credentials the client reads `GENMEDIA_KEY` (or
//! `GENMEDIA_KEY_ID` and `GENMEDIA_KEY_SECRET`) on its first request.

mod client;
mod config;
mod credentials;
mod errors;
mod models;
mod poll;
mod queue;
mod retry;
mod transport;

pub use client::{Client, ClientBuilder};
pub use config::{Config, ConfigBuilder, MAX_RETRIES_LIMIT};
pub use credentials::{
    Credentials, CredentialsProvider, EnvCredentials, ENV_KEY, ENV_KEY_ID, ENV_KEY_SECRET,
};
pub use errors::{ErrorDetail, GenMediaError, Result};
pub use models::{
    CustomReference, GenerateOptions, Job, JobResults, JobSet, JobStatus, MediaResult,
    QueueRequest, ReferenceStatus, UploadedFile, Webhook,
};
pub use poll::{poll_until_settled, PollOptions, Pollable};
pub use queue::QueueClient;
pub use retry::{retry_with_backoff, RetryPolicy, MAX_JITTER};
