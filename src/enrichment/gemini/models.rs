use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    pub fn from_prompt(prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_owned()),
                parts: vec![Part {
                    text: prompt.to_owned(),
                }],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct Candidate {
    #[serde(default)]
    pub content: Content,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub model_version: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, `None` if there is no non-blank text.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .candidates
            .first()?
            .content
            .parts
            .iter()
            .map(|part| part.text.as_str())
            .collect();

        let text = text.trim();
        (!text.is_empty()).then(|| text.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_shape() {
        let request = serde_json::to_value(GenerateContentRequest::from_prompt("Servus")).unwrap();
        assert_eq!(
            request,
            serde_json::json!({
                "contents": [{ "role": "user", "parts": [{ "text": "Servus" }] }]
            })
        );
    }

    #[test]
    fn response_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [{ "text": "Namenstag: Anna\n" }, { "text": "Inspiration: Lächle." }]
                    },
                    "finishReason": "STOP"
                }],
                "modelVersion": "gemini-2.0-flash"
            }"#,
        )
        .unwrap();

        assert_eq!(
            response.text().as_deref(),
            Some("Namenstag: Anna\nInspiration: Lächle.")
        );
        assert_eq!(response.candidates[0].finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn response_without_text() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{ "candidates": [{ "finishReason": "SAFETY" }] }"#).unwrap();
        assert_eq!(response.text(), None);

        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.text(), None);
    }
}
