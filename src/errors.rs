use std::error::Error as _;
use std::io::ErrorKind;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const AUTHENTICATION_MESSAGE: &str = "invalid or missing API credentials";
const INSUFFICIENT_CREDITS_MESSAGE: &str = "not enough credits to run this request";
const DEFAULT_DETAIL_MESSAGE: &str = "Check your input params";

/// All errors that can occur when using the GenMedia SDK.
#[derive(Error, Debug)]
pub enum GenMediaError {
    /// The credentials were rejected (HTTP 401).
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// The account cannot pay for the request (HTTP 403).
    #[error("insufficient credits: {message}")]
    InsufficientCredits { message: String },

    /// The request body failed schema validation (HTTP 422).
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        details: Vec<ErrorDetail>,
    },

    /// The request was malformed (HTTP 400).
    #[error("bad input: {message}")]
    BadInput {
        message: String,
        details: Vec<ErrorDetail>,
    },

    /// Any other non-success response, with its status and raw body.
    #[error("API error {status_code}: {body}")]
    Api { status_code: u16, body: String },

    /// Polling did not reach a settled state within the configured budget.
    #[error("polling timed out after {}ms (max_poll_time)", .max_poll_time.as_millis())]
    Timeout { max_poll_time: Duration },

    /// No credentials were configured and none could be resolved.
    #[error("credentials missing: {0}")]
    CredentialsMissing(String),

    /// The SDK was driven from a context it cannot run in.
    #[error("unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A transport-level HTTP error from reqwest (no response received).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// An I/O error, typically from reading a local upload file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A success response whose payload did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A convenience alias for `Result<T, GenMediaError>`.
pub type Result<T> = std::result::Result<T, GenMediaError>;

/// One entry of a structured `detail` list on 400/422 responses.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ErrorDetail {
    /// Path segments to the offending field; strings or array indices.
    #[serde(default)]
    pub loc: Vec<serde_json::Value>,
    pub msg: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ErrorDetail {
    /// `loc` joined with dots, e.g. `body.params.prompt`.
    pub fn path(&self) -> String {
        self.loc
            .iter()
            .map(|segment| match segment {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DetailPayload {
    List(Vec<ErrorDetail>),
    Text(String),
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<DetailPayload>,
}

impl GenMediaError {
    /// Authentication failure with the fixed message.
    pub fn authentication() -> Self {
        Self::Authentication {
            message: AUTHENTICATION_MESSAGE.to_string(),
        }
    }

    /// Insufficient-credits failure with the fixed message.
    pub fn insufficient_credits() -> Self {
        Self::InsufficientCredits {
            message: INSUFFICIENT_CREDITS_MESSAGE.to_string(),
        }
    }

    /// Validation failure whose message is rendered from `details`.
    pub fn validation(details: Vec<ErrorDetail>) -> Self {
        Self::Validation {
            message: render_details(&details),
            details,
        }
    }

    /// Bad-input failure whose message is rendered from `details`.
    pub fn bad_input(details: Vec<ErrorDetail>) -> Self {
        Self::BadInput {
            message: render_details(&details),
            details,
        }
    }

    /// The HTTP status this error corresponds to, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Authentication { .. } => Some(401),
            Self::InsufficientCredits { .. } => Some(403),
            Self::Validation { .. } => Some(422),
            Self::BadInput { .. } => Some(400),
            Self::Api { status_code, .. } => Some(*status_code),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// A response with status >= 500.
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_some_and(|s| s >= 500)
    }

    /// Transient failures worth another attempt: connection reset, connect
    /// timeout, DNS failure, or any 5xx response. A refused connection or a
    /// timeout after the request went out is not retried.
    pub fn is_retryable(&self) -> bool {
        if self.is_server_error() {
            return true;
        }
        match self {
            Self::Http(e) => transport_failure_is_transient(e.is_connect(), &io_error_kinds(e)),
            _ => false,
        }
    }
}

/// `io::ErrorKind`s found along an error's source chain.
fn io_error_kinds(err: &(dyn std::error::Error + 'static)) -> Vec<ErrorKind> {
    let mut kinds = Vec::new();
    let mut source = Some(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            kinds.push(io.kind());
            // `io::Error::source` skips over a wrapped custom error.
            if let Some(inner) = io.get_ref() {
                source = Some(inner as &(dyn std::error::Error + 'static));
                continue;
            }
        }
        source = cause.source();
    }
    kinds
}

/// Resets are retried at any stage. Connect-phase failures (DNS, connect
/// timeout) are retried unless the peer refused the connection.
fn transport_failure_is_transient(is_connect: bool, io_kinds: &[ErrorKind]) -> bool {
    if io_kinds
        .iter()
        .any(|k| matches!(k, ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted))
    {
        return true;
    }
    is_connect && !io_kinds.contains(&ErrorKind::ConnectionRefused)
}

fn render_details(details: &[ErrorDetail]) -> String {
    if details.is_empty() {
        return DEFAULT_DETAIL_MESSAGE.to_string();
    }
    details
        .iter()
        .map(|d| format!("{}: {}", d.path(), d.msg))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Split a response body's `detail` into a message and structured entries.
fn parse_detail(body: &str) -> (String, Vec<ErrorDetail>) {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail);
    match detail {
        Some(DetailPayload::List(details)) => (render_details(&details), details),
        Some(DetailPayload::Text(text)) => (text, Vec::new()),
        None => (DEFAULT_DETAIL_MESSAGE.to_string(), Vec::new()),
    }
}

/// Map a non-success response onto the error taxonomy.
pub(crate) fn classify_response(status_code: u16, body: &str) -> GenMediaError {
    match status_code {
        401 => GenMediaError::authentication(),
        403 => GenMediaError::insufficient_credits(),
        422 => {
            let (message, details) = parse_detail(body);
            GenMediaError::Validation { message, details }
        }
        400 => {
            let (message, details) = parse_detail(body);
            GenMediaError::BadInput { message, details }
        }
        _ => GenMediaError::Api {
            status_code,
            body: body.to_string(),
        },
    }
}
