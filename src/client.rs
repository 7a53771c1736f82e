use crate::config::Config;
use crate::error::GenError;
use crate::state::ImagePayload;
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// One outbound text-generation call. No retry logic here; a single
/// attempt, pass or fail.
#[derive(Debug, Clone)]
pub struct TextRequest {
    pub model: String,
    pub prompt: String,
    /// Ask the backend to confine its answer to JSON.
    pub structured_json: bool,
}

/// One outbound image-synthesis call.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub aspect_ratio: String,
    pub resolution: String,
}

#[async_trait]
pub trait GenerationClient: Send + Sync + Debug {
    /// Returns the model's text. A successful response carrying no text
    /// part yields `Ok("")` — the empty-output policy belongs to callers.
    async fn generate_text(&self, req: &TextRequest) -> Result<String, GenError>;

    /// Returns every inline binary part of the response, decoded. May be
    /// empty; callers decide whether that is an error.
    async fn generate_image(&self, req: &ImageRequest) -> Result<Vec<ImagePayload>, GenError>;
}

pub fn create_client(config: &Config) -> Result<Box<dyn GenerationClient>> {
    match config.llm.provider.as_str() {
        "gemini" => {
            let cfg = config.llm.gemini.as_ref().context("Gemini config missing")?;
            Ok(Box::new(GeminiClient::new(&cfg.api_key)))
        }
        _ => anyhow::bail!("Unknown LLM provider: {}", config.llm.provider),
    }
}

// --- Gemini ---

#[derive(Debug)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, "https://generativelanguage.googleapis.com/v1beta")
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn generate_content(
        &self,
        model: &str,
        body: &GeminiRequest,
    ) -> Result<GeminiResponse, GenError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let resp = self.client.post(&url).json(body).send().await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(GenError::Remote(format!("Gemini API error: {error_text}")));
        }

        let response_text = resp.text().await?;
        let result: GeminiResponse = serde_json::from_str(&response_text).map_err(|e| {
            GenError::Remote(format!(
                "Failed to parse Gemini response: {e}. Body: {response_text}"
            ))
        })?;

        if let Some(err) = &result.error {
            return Err(GenError::Remote(format!(
                "Gemini API returned error: {}",
                err.message
            )));
        }

        Ok(result)
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(rename = "responseModalities", skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(rename = "imageConfig", skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
}

#[derive(Serialize)]
struct ImageConfig {
    #[serde(rename = "aspectRatio")]
    aspect_ratio: String,
    #[serde(rename = "imageSize")]
    image_size: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

/// Response parts are either text or inline media. Variant order matters
/// for untagged decoding.
#[derive(Deserialize)]
#[serde(untagged)]
enum GeminiPartResponse {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Deserialize)]
struct GeminiInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

fn user_content(prompt: &str) -> Vec<GeminiContent> {
    vec![GeminiContent {
        role: "user".to_string(),
        parts: vec![GeminiPart {
            text: prompt.to_string(),
        }],
    }]
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate_text(&self, req: &TextRequest) -> Result<String, GenError> {
        let body = GeminiRequest {
            contents: user_content(&req.prompt),
            generation_config: req.structured_json.then(|| GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_modalities: None,
                image_config: None,
            }),
        };

        let result = self.generate_content(&req.model, &body).await?;

        let text = result
            .candidates
            .iter()
            .flatten()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .find_map(|part| match part {
                GeminiPartResponse::Text { text } => Some(text.clone()),
                GeminiPartResponse::InlineData { .. } => None,
            })
            .unwrap_or_default();

        Ok(text)
    }

    async fn generate_image(&self, req: &ImageRequest) -> Result<Vec<ImagePayload>, GenError> {
        let body = GeminiRequest {
            contents: user_content(&req.prompt),
            generation_config: Some(GenerationConfig {
                response_mime_type: None,
                response_modalities: Some(vec!["IMAGE".to_string(), "TEXT".to_string()]),
                image_config: Some(ImageConfig {
                    aspect_ratio: req.aspect_ratio.clone(),
                    image_size: req.resolution.clone(),
                }),
            }),
        };

        let result = self.generate_content(&req.model, &body).await?;

        let mut payloads = Vec::new();
        for candidate in result.candidates.into_iter().flatten() {
            let Some(content) = candidate.content else {
                continue;
            };
            for part in content.parts {
                if let GeminiPartResponse::InlineData { inline_data } = part {
                    let bytes = base64::engine::general_purpose::STANDARD
                        .decode(inline_data.data.as_bytes())
                        .map_err(|e| {
                            GenError::Remote(format!("Failed to decode inline image data: {e}"))
                        })?;
                    payloads.push(ImagePayload {
                        mime_type: inline_data.mime_type,
                        bytes,
                    });
                }
            }
        }

        Ok(payloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_parsing_text_part() {
        let json = r#"{
            "candidates": [
                {
                    "content": {
                        "parts": [ { "text": "Hello world" } ],
                        "role": "model"
                    },
                    "finishReason": "STOP",
                    "index": 0
                }
            ]
        }"#;

        let result: GeminiResponse = serde_json::from_str(json).unwrap();
        let candidate = &result.candidates.as_ref().unwrap()[0];
        let parts = &candidate.content.as_ref().unwrap().parts;
        assert!(matches!(&parts[0], GeminiPartResponse::Text { text } if text == "Hello world"));
    }

    #[test]
    fn response_parsing_inline_image_part() {
        let json = r#"{
            "candidates": [
                {
                    "content": {
                        "parts": [
                            { "text": "Here is your slide." },
                            { "inlineData": { "mimeType": "image/png", "data": "AAAA" } }
                        ],
                        "role": "model"
                    }
                }
            ]
        }"#;

        let result: GeminiResponse = serde_json::from_str(json).unwrap();
        let parts = &result.candidates.as_ref().unwrap()[0]
            .content
            .as_ref()
            .unwrap()
            .parts;
        assert_eq!(parts.len(), 2);
        match &parts[1] {
            GeminiPartResponse::InlineData { inline_data } => {
                assert_eq!(inline_data.mime_type, "image/png");
                assert_eq!(inline_data.data, "AAAA");
            }
            GeminiPartResponse::Text { .. } => panic!("expected inline data part"),
        }
    }

    #[test]
    fn response_parsing_blocked_content() {
        // Safety-blocked responses arrive with no content at all.
        let json = r#"{
            "candidates": [
                { "finishReason": "SAFETY", "index": 0 }
            ]
        }"#;

        let result: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(result.candidates.as_ref().unwrap()[0].content.is_none());
    }

    #[test]
    fn structured_request_sets_json_mime_type() {
        let body = GeminiRequest {
            contents: user_content("hi"),
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_modalities: None,
                image_config: None,
            }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert!(json["generationConfig"].get("imageConfig").is_none());
    }

    #[test]
    fn image_request_carries_shape_config() {
        let body = GeminiRequest {
            contents: user_content("draw"),
            generation_config: Some(GenerationConfig {
                response_mime_type: None,
                response_modalities: Some(vec!["IMAGE".to_string(), "TEXT".to_string()]),
                image_config: Some(ImageConfig {
                    aspect_ratio: "16:9".to_string(),
                    image_size: "2K".to_string(),
                }),
            }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
        assert_eq!(json["generationConfig"]["imageConfig"]["imageSize"], "2K");
    }
}
