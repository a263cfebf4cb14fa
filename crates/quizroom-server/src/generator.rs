use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use quizroom_core::question::Question;

use crate::config::GeneratorConfig;

#[derive(Debug)]
pub enum GenerateError {
    /// Transport-level failure reaching the generator service.
    Http(String),
    /// The service answered but the payload failed shape validation.
    BadResponse(String),
}

impl std::fmt::Display for GenerateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(e) => write!(f, "{e}"),
            Self::BadResponse(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for GenerateError {}

/// External question provider. The engine never retries; failures surface
/// to the requesting admin only.
pub trait QuestionGenerator: Send + Sync {
    fn generate<'a>(
        &'a self,
        topic: &'a str,
        difficulty: &'a str,
        count: u8,
    ) -> BoxFuture<'a, Result<Vec<Question>, GenerateError>>;
}

/// Contract check on generator output: exactly `count` items, each with 4
/// options and an in-range correct index.
pub fn validate_set(questions: &[Question], count: u8) -> Result<(), GenerateError> {
    if questions.len() != count as usize {
        return Err(GenerateError::BadResponse(format!(
            "expected {count} questions, got {}",
            questions.len()
        )));
    }
    if let Some(q) = questions.iter().find(|q| !q.is_well_formed()) {
        return Err(GenerateError::BadResponse(format!(
            "malformed question: {}",
            q.id
        )));
    }
    Ok(())
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    topic: &'a str,
    difficulty: &'a str,
    count: u8,
}

#[derive(Deserialize)]
struct GenerateResponse {
    questions: Vec<Question>,
}

/// JSON-over-HTTP client for the question-generation service.
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_token: Option<String>,
}

impl HttpGenerator {
    pub fn new(config: &GeneratorConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_token: config.api_token.clone(),
        }
    }
}

impl QuestionGenerator for HttpGenerator {
    fn generate<'a>(
        &'a self,
        topic: &'a str,
        difficulty: &'a str,
        count: u8,
    ) -> BoxFuture<'a, Result<Vec<Question>, GenerateError>> {
        Box::pin(async move {
            let mut request = self.client.post(&self.endpoint).json(&GenerateRequest {
                topic,
                difficulty,
                count,
            });
            if let Some(ref token) = self.api_token {
                request = request.bearer_auth(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| GenerateError::Http(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(GenerateError::Http(format!(
                    "generator returned {status}"
                )));
            }

            let body: GenerateResponse = response
                .json()
                .await
                .map_err(|e| GenerateError::BadResponse(e.to_string()))?;

            validate_set(&body.questions, count)?;
            Ok(body.questions)
        })
    }
}
