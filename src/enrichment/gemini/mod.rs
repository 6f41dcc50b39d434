pub mod models;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_ENCODING, CONTENT_TYPE};
use reqwest::{Request, Response};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next};
use std::time::Duration;
use task_local_extensions::Extensions;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Error while making a http request.
    #[error("failure requesting remote resource: {0}")]
    Request(#[from] reqwest::Error),

    /// Error while executing some middleware code.
    #[error("request middleware failed with: {0}")]
    RequestMiddleware(#[from] reqwest_middleware::Error),

    /// Error while building http headers.
    #[error("encountered invalid HTTP header value: {0}")]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),

    /// Error while serializing a request or parsing a JSON response.
    #[error("failed to handle JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The service answered without any text, e.g. because the answer was blocked.
    #[error("response contained no text")]
    EmptyResponse,
}

/// Adds the API key to every request.
struct ApiKeyMiddleware {
    api_key: HeaderValue,
}

impl ApiKeyMiddleware {
    fn new(api_key: &str) -> Result<ApiKeyMiddleware, ClientError> {
        let mut api_key = HeaderValue::from_str(api_key)?;
        api_key.set_sensitive(true);
        Ok(ApiKeyMiddleware { api_key })
    }
}

#[async_trait::async_trait]
impl Middleware for ApiKeyMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        req.headers_mut().insert(
            HeaderName::from_static(API_KEY_HEADER),
            self.api_key.clone(),
        );
        next.run(req, extensions).await
    }
}

/// Client for the `generateContent` endpoint of the Gemini API.
#[derive(Debug)]
pub struct GeminiClient {
    client: ClientWithMiddleware,
    url: String,
}

impl GeminiClient {
    /// Creates a new client for `model`, e.g. `gemini-2.0-flash`, below `endpoint`, e.g.
    /// `https://generativelanguage.googleapis.com/v1beta`. No request is made here.
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<GeminiClient, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_str("gzip")?);

        let client = ClientBuilder::new(
            reqwest::Client::builder()
                .default_headers(headers)
                .timeout(timeout)
                .build()?,
        )
        .with(ApiKeyMiddleware::new(api_key)?)
        .build();

        Ok(GeminiClient {
            client,
            url: content_url(endpoint, model),
        })
    }

    /// Sends a single-turn prompt and returns the concatenated text of the first candidate.
    pub async fn generate_content(&self, prompt: &str) -> Result<String, ClientError> {
        let body = serde_json::to_vec(&models::GenerateContentRequest::from_prompt(prompt))?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .json::<models::GenerateContentResponse>()
            .await?;

        let text = response.text().ok_or(ClientError::EmptyResponse)?;

        log::debug!("generated {} characters of text", text.len());

        Ok(text)
    }
}

fn content_url(endpoint: &str, model: &str) -> String {
    format!(
        "{}/models/{}:generateContent",
        endpoint.trim_end_matches('/'),
        model
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_url_without_trailing_slash() {
        assert_eq!(
            content_url("https://generativelanguage.googleapis.com/v1beta", "gemini-2.0-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(
            content_url("http://localhost:9000/", "m"),
            "http://localhost:9000/models/m:generateContent"
        );
    }

    #[test]
    fn invalid_api_key_is_rejected() {
        assert!(matches!(
            GeminiClient::new("http://localhost", "m", "line\nbreak", Duration::from_secs(1)),
            Err(ClientError::InvalidHeaderValue(_))
        ));
    }
}
