//! HTTP answer service client

use super::{AnswerError, AnswerService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct AnswerRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct AnswerResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl AnswerResponse {
    /// A non-empty `answer` wins, then a non-empty `error`
    fn into_reply(self) -> Option<String> {
        let present = |v: &String| !v.is_empty();
        self.answer
            .filter(present)
            .or_else(|| self.error.filter(present))
    }
}

/// Client for `POST <endpoint>/chatbot`
pub struct HttpAnswerService {
    client: Client,
    url: String,
}

impl HttpAnswerService {
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> Result<Self, AnswerError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AnswerError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: format!("{}/chatbot", endpoint.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl AnswerService for HttpAnswerService {
    async fn answer(&self, question: &str) -> Result<String, AnswerError> {
        let response = self
            .client
            .post(&self.url)
            .json(&AnswerRequest { query: question })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnswerError::status(status.as_u16(), &body));
        }

        let body: AnswerResponse = response.json().await?;
        body.into_reply().ok_or_else(AnswerError::empty_response)
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
