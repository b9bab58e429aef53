//! Quick-start examples for the GenMedia Rust SDK.
//!
//! Run with:
//!   GENMEDIA_KEY=key_id:key_secret RUST_LOG=genmedia=debug cargo run --example quickstart

use std::time::Duration;

use genmedia::{ClientBuilder, GenMediaError, GenerateOptions, QueueClient};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> genmedia::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // -----------------------------------------------------------------------
    // 1. Create a client (reads GENMEDIA_KEY from the environment)
    // -----------------------------------------------------------------------
    let client = ClientBuilder::new()
        .poll_interval(Duration::from_secs(1))
        .max_poll_time(Duration::from_secs(180))
        .build()?;

    // -----------------------------------------------------------------------
    // 2. Generate images and wait for the first job to settle
    // -----------------------------------------------------------------------
    let params = json!({ "prompt": "a lighthouse in a storm, oil painting", "batch_size": 4 });
    match client.generate("text-to-image", &params, GenerateOptions::new()).await {
        Ok(job_set) if job_set.is_completed() => {
            println!("Job set {} completed:", job_set.id);
            for result in job_set.results() {
                println!("  {} (preview {})", result.raw.url, result.min.url);
            }
        }
        Ok(job_set) => println!("Job set {} settled without output: {:?}", job_set.id, job_set.jobs),
        Err(GenMediaError::Validation { message, .. }) => eprintln!("Fix your params: {message}"),
        Err(GenMediaError::InsufficientCredits { .. }) => eprintln!("Top up your credits first"),
        Err(e) => return Err(e),
    }
    println!();

    // -----------------------------------------------------------------------
    // 3. Submit to the queue API without waiting, then poll explicitly
    // -----------------------------------------------------------------------
    let queue = QueueClient::shared().await?;
    let mut request = queue
        .submit(
            "flux/dev",
            &json!({ "prompt": "a paper boat on a pond" }),
            GenerateOptions::new().without_polling(),
        )
        .await?;
    println!("Queued request {}", request.request_id);

    queue.wait(&mut request).await?;
    if let Some(results) = request.results() {
        println!("Result: {}", results.raw.url);
    }

    Ok(())
}
