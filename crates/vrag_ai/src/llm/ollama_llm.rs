use std::time::Duration;

use serde::{Deserialize, Serialize};
use vrag_core::error::{codes, AppError};

use super::Llm;
use crate::ollama::OllamaClient;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct OllamaLlm {
    client: OllamaClient,
    timeout: Duration,
    retry: RetryPolicy,
}

impl OllamaLlm {
    pub fn new(client: OllamaClient) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(120),
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn generate_once(&self, model: &str, prompt: &str) -> Result<String, AppError> {
        let url = format!("{}/api/generate", self.client.base_url());
        let req = GenerateRequest {
            model,
            prompt,
            stream: false,
        };
        let body = serde_json::to_value(req).map_err(|e| {
            AppError::new(codes::GENERATION_FAILED, "Failed to encode generate request")
                .with_details(e.to_string())
        })?;

        match ureq::post(&url).timeout(self.timeout).send_json(body) {
            Ok(r) => {
                let body = r.into_string().map_err(|e| {
                    AppError::new(codes::GENERATION_FAILED, "Failed to read generate response")
                        .with_details(e.to_string())
                })?;
                let text = completion_text(&body)?;
                if text.trim().is_empty() {
                    tracing::warn!(model, "generate returned a blank completion");
                }
                Ok(text)
            }
            Err(ureq::Error::Status(status, _)) => Err(AppError::new(
                codes::GENERATION_FAILED,
                "Generate request failed",
            )
            .with_details(format!("model={model}; status={status}"))
            .with_retryable(status >= 500)),
            Err(e) => Err(AppError::new(
                codes::GENERATION_FAILED,
                "Failed to call generate endpoint",
            )
            .with_details(e.to_string())
            .with_retryable(true)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// The model's text exactly as sent; blank completions are passed through.
fn completion_text(body: &str) -> Result<String, AppError> {
    let v: GenerateResponse = serde_json::from_str(body).map_err(|e| {
        AppError::new(codes::GENERATION_FAILED, "Failed to decode generate response")
            .with_details(e.to_string())
    })?;
    Ok(v.response)
}

impl Llm for OllamaLlm {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, AppError> {
        self.retry.run("ollama.generate", || self.generate_once(model, prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_is_returned_unmodified() {
        let body = r#"{"model":"llama3","response":"  BRCA1 c.68_69del is pathogenic.\n","done":true}"#;
        assert_eq!(
            completion_text(body).expect("decode"),
            "  BRCA1 c.68_69del is pathogenic.\n"
        );
    }

    #[test]
    fn blank_completion_is_not_an_error() {
        let body = r#"{"response":"   ","done":true}"#;
        assert_eq!(completion_text(body).expect("decode"), "   ");
    }

    #[test]
    fn body_without_response_is_generation_failed() {
        let err = completion_text(r#"{"error":"model not found"}"#).expect_err("missing field");
        assert_eq!(err.code, codes::GENERATION_FAILED);
    }
}
