//! Answer service error types

use thiserror::Error;

/// Answer service error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AnswerError {
    pub kind: AnswerErrorKind,
    pub message: String,
}

impl AnswerError {
    pub fn new(kind: AnswerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AnswerErrorKind::Network, message)
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self::new(
            AnswerErrorKind::Status(status),
            format!("Answer service returned HTTP {status}: {body}"),
        )
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(AnswerErrorKind::Decode, message)
    }

    pub fn empty_response() -> Self {
        Self::new(
            AnswerErrorKind::EmptyResponse,
            "Answer service response had neither `answer` nor `error`",
        )
    }
}

impl From<reqwest::Error> for AnswerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::decode(e.to_string())
        } else {
            Self::network(e.to_string())
        }
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerErrorKind {
    /// Connect failure, timeout, broken body
    Network,
    /// Non-2xx status
    Status(u16),
    /// Body was not the expected JSON
    Decode,
    /// Neither `answer` nor `error` present
    EmptyResponse,
}
