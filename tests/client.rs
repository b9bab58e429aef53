use std::time::Duration;

use genmedia::{
    Client, ClientBuilder, Credentials, CredentialsProvider, GenMediaError, GenerateOptions,
    JobStatus, ReferenceStatus, Webhook,
};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn builder(server: &MockServer) -> ClientBuilder {
    ClientBuilder::new()
        .credentials("key_123", "secret_456")
        .base_url(server.uri())
        .retry_backoff(Duration::from_millis(1))
        .retry_max_backoff(Duration::from_millis(5))
        .poll_interval(Duration::from_millis(10))
        .max_poll_time(Duration::from_secs(5))
}

fn client(server: &MockServer) -> Client {
    builder(server).build().unwrap()
}

fn job_set(status: &str) -> serde_json::Value {
    json!({ "id": "js_1", "jobs": [{ "id": "job_1", "status": status }] })
}

async fn mount_status_once(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/v1/job-sets/js_1"))
        .respond_with(template)
        .up_to_n_times(1)
        .mount(server)
        .await;
}

async fn mount_submission(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/text-to-image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_set("queued")))
        .mount(server)
        .await;
}

async fn status_queries(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "GET")
        .count()
}

#[tokio::test]
async fn generate_polls_until_completed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/text-to-image"))
        .and(header("x-key-id", "key_123"))
        .and(header("x-key-secret", "secret_456"))
        .and(body_partial_json(json!({ "params": { "prompt": "a red fox" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_set("queued")))
        .expect(1)
        .mount(&server)
        .await;

    mount_status_once(&server, ResponseTemplate::new(200).set_body_json(job_set("queued"))).await;
    mount_status_once(&server, ResponseTemplate::new(200).set_body_json(job_set("in_progress")))
        .await;
    mount_status_once(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "id": "js_1",
            "jobs": [{
                "id": "job_1",
                "status": "completed",
                "results": {
                    "raw": { "url": "https://cdn.example/raw.png", "media_type": "image/png" },
                    "min": { "url": "https://cdn.example/min.webp", "media_type": "image/webp" }
                }
            }]
        })),
    )
    .await;

    let set = client(&server)
        .generate("text-to-image", &json!({ "prompt": "a red fox" }), GenerateOptions::new())
        .await
        .unwrap();

    assert!(set.is_completed());
    assert_eq!(status_queries(&server).await, 3);
    assert_eq!(set.results()[0].raw.url, "https://cdn.example/raw.png");
}

#[tokio::test]
async fn webhook_is_sent_in_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/text-to-image"))
        .and(body_json(json!({
            "params": { "prompt": "x" },
            "webhook": { "url": "https://hooks.example/done", "secret": "whsec" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_set("queued")))
        .expect(1)
        .mount(&server)
        .await;

    let options = GenerateOptions::new()
        .with_webhook(Webhook::new("https://hooks.example/done").with_secret("whsec"))
        .without_polling();
    let set = client(&server)
        .generate("text-to-image", &json!({ "prompt": "x" }), options)
        .await
        .unwrap();

    assert_eq!(set.jobs[0].status, JobStatus::Queued);
    assert_eq!(status_queries(&server).await, 0);
}

#[tokio::test]
async fn transient_status_failure_keeps_polling() {
    let server = MockServer::start().await;
    mount_submission(&server).await;
    mount_status_once(&server, ResponseTemplate::new(503)).await;
    mount_status_once(&server, ResponseTemplate::new(200).set_body_json(job_set("nsfw"))).await;

    let set = client(&server)
        .generate("text-to-image", &json!({}), GenerateOptions::new())
        .await
        .unwrap();

    assert!(set.is_nsfw());
    assert_eq!(status_queries(&server).await, 2);
}

#[tokio::test]
async fn client_error_while_polling_aborts() {
    let server = MockServer::start().await;
    mount_submission(&server).await;
    mount_status_once(&server, ResponseTemplate::new(404).set_body_string("job set not found"))
        .await;
    mount_status_once(&server, ResponseTemplate::new(200).set_body_json(job_set("completed")))
        .await;

    let err = client(&server)
        .generate("text-to-image", &json!({}), GenerateOptions::new())
        .await
        .unwrap_err();

    match err {
        GenMediaError::Api { status_code, body } => {
            assert_eq!(status_code, 404);
            assert_eq!(body, "job set not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(status_queries(&server).await, 1);
}

#[tokio::test]
async fn polling_times_out() {
    let server = MockServer::start().await;
    mount_submission(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/job-sets/js_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_set("in_progress")))
        .mount(&server)
        .await;

    let client = builder(&server)
        .max_poll_time(Duration::from_millis(200))
        .build()
        .unwrap();
    let err = client
        .generate("text-to-image", &json!({}), GenerateOptions::new())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("200ms"), "{err}");
    assert!(matches!(
        err,
        GenMediaError::Timeout { max_poll_time } if max_poll_time == Duration::from_millis(200)
    ));
}

#[tokio::test]
async fn submission_retries_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/text-to-image"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/text-to-image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_set("queued")))
        .expect(1)
        .mount(&server)
        .await;

    let set = client(&server)
        .generate("text-to-image", &json!({}), GenerateOptions::new().without_polling())
        .await
        .unwrap();
    assert_eq!(set.id, "js_1");
}

#[tokio::test]
async fn submission_surfaces_last_error_after_exhausting_retries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/text-to-image"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(3)
        .mount(&server)
        .await;

    let client = builder(&server).max_retries(2).build().unwrap();
    let err = client
        .generate("text-to-image", &json!({}), GenerateOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(502));
}

#[tokio::test]
async fn validation_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/text-to-image"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "detail": [
                { "loc": ["body", "params", "batch_size"], "msg": "Input should be 1 or 4", "type": "literal_error" },
                { "loc": ["body", "params", "prompt"], "msg": "Field required", "type": "missing" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .generate("text-to-image", &json!({ "batch_size": 3 }), GenerateOptions::new())
        .await
        .unwrap_err();

    match err {
        GenMediaError::Validation { message, details } => {
            assert_eq!(
                message,
                "body.params.batch_size: Input should be 1 or 4, body.params.prompt: Field required"
            );
            assert_eq!(details[1].kind.as_deref(), Some("missing"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn auth_and_credit_failures_are_typed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/text-to-image"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "bad key" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/image-to-video"))
        .respond_with(ResponseTemplate::new(403).set_body_string("<html>forbidden</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client
        .generate("text-to-image", &json!({}), GenerateOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GenMediaError::Authentication { .. }));

    let err = client
        .generate("image-to-video", &json!({}), GenerateOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GenMediaError::InsufficientCredits { .. }));
    assert_eq!(err.status_code(), Some(403));
}

struct NoCredentials;

impl CredentialsProvider for NoCredentials {
    fn resolve(&self) -> Option<Credentials> {
        None
    }
}

#[tokio::test]
async fn missing_credentials_fail_before_any_request() {
    let server = MockServer::start().await;

    let client = ClientBuilder::new()
        .credentials_provider(NoCredentials)
        .base_url(server.uri())
        .build()
        .unwrap();
    let err = client
        .generate("text-to-image", &json!({}), GenerateOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GenMediaError::CredentialsMissing(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn provider_credentials_are_used() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/job-sets/js_1"))
        .and(header("x-key-id", "from_provider"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_set("failed")))
        .expect(1)
        .mount(&server)
        .await;

    let client = ClientBuilder::new()
        .credentials_provider(Credentials::new("from_provider", "s"))
        .base_url(server.uri())
        .build()
        .unwrap();
    let set = client.get_job_set("js_1").await.unwrap();

    assert!(set.is_failed());
}

#[tokio::test]
async fn network_failure_propagates_transport_error() {
    let client = ClientBuilder::new()
        .credentials("id", "secret")
        .base_url("http://127.0.0.1:9")
        .max_retries(1)
        .retry_backoff(Duration::from_millis(1))
        .retry_max_backoff(Duration::from_millis(5))
        .build()
        .unwrap();

    let err = client.get_job_set("js_1").await.unwrap_err();
    assert!(matches!(err, GenMediaError::Http(_)), "{err:?}");
    assert!(!err.is_retryable(), "refused connection must not be retried: {err:?}");
}

#[tokio::test]
async fn refused_connection_is_attempted_once() {
    // Three retries at this backoff would sleep at least 2 + 4 + 8 seconds.
    let client = ClientBuilder::new()
        .credentials("id", "secret")
        .base_url("http://127.0.0.1:9")
        .max_retries(3)
        .retry_backoff(Duration::from_secs(2))
        .retry_max_backoff(Duration::from_secs(30))
        .build()
        .unwrap();

    let started = std::time::Instant::now();
    let err = client
        .generate("text-to-image", &json!({}), GenerateOptions::new().without_polling())
        .await
        .unwrap_err();

    assert!(matches!(err, GenMediaError::Http(_)), "{err:?}");
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "refused connection was retried: took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn extra_headers_are_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/job-sets/js_1"))
        .and(header("x-request-source", "nightly-batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_set("completed")))
        .expect(1)
        .mount(&server)
        .await;

    let client = builder(&server)
        .header("x-request-source", "nightly-batch")
        .build()
        .unwrap();
    assert!(client.get_job_set("js_1").await.unwrap().is_completed());
}

#[tokio::test]
async fn custom_reference_is_polled_until_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/custom-references"))
        .and(body_partial_json(json!({ "params": { "name": "brand-style" } })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "ref_9", "status": "not_ready" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/custom-references/ref_9"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "ref_9", "status": "in_progress" })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/custom-references/ref_9"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "ref_9", "status": "completed" })),
        )
        .mount(&server)
        .await;

    let client = client(&server);
    let reference = client
        .create_custom_reference(&json!({ "name": "brand-style" }), GenerateOptions::new())
        .await
        .unwrap();

    assert_eq!(reference.status, ReferenceStatus::Completed);
    assert_eq!(status_queries(&server).await, 2);

    let fetched = client.get_custom_reference("ref_9").await.unwrap();
    assert!(fetched.is_completed());
}

#[tokio::test]
async fn upload_writes_to_signed_url() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/uploads"))
        .and(body_json(json!({ "content_type": "image/png" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "upload_url": format!("{}/signed/abc", server.uri()),
            "file_url": "https://cdn.example/uploads/abc.png"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/signed/abc"))
        .and(header("content-type", "image/png"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = std::env::temp_dir().join("genmedia-upload-test");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let file = dir.join("pixel.png");
    tokio::fs::write(&file, b"\x89PNG fake").await.unwrap();

    let uploaded = client(&server).upload_file(&file).await.unwrap();

    assert_eq!(uploaded.url, "https://cdn.example/uploads/abc.png");
    assert_eq!(uploaded.content_type, "image/png");

    let put = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.method.as_str() == "PUT")
        .unwrap();
    assert_eq!(put.body, b"\x89PNG fake");
}

#[tokio::test]
async fn upload_rejected_by_storage_is_an_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/uploads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "upload_url": format!("{}/signed/expired", server.uri()),
            "file_url": "https://cdn.example/uploads/expired.mp4"
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/signed/expired"))
        .respond_with(ResponseTemplate::new(410).set_body_string("expired"))
        .mount(&server)
        .await;

    let err = client(&server)
        .upload(vec![0, 1, 2], "video/mp4")
        .await
        .unwrap_err();
    assert!(matches!(err, GenMediaError::Api { status_code: 410, .. }));
}
