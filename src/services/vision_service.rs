// src/services/vision_service.rs
use crate::errors::StockwiseError;
use crate::models::{ProductInsight, UploadedImage};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use log::{debug, warn};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;

const GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

// One upstream call per analysis; transient failures get two more tries.
const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

const ANALYSIS_PROMPT: &str = r#"You are a product cataloguing assistant. All supplied images are views of the SAME product. Analyze them together and respond with ONLY a JSON object, no markdown and no commentary, in exactly this shape:

{
  "shortDescription": "a brief one-sentence product summary",
  "description": "a detailed description synthesizing what every view shows",
  "tags": ["eight", "to", "ten", "distinct", "tags"],
  "keywords": "a single comma-separated string of search keywords"
}

Rules:
- "tags" must contain 8 to 10 entries with no duplicate words.
- "keywords" is one flat string, not an array.
- Output the JSON object and nothing else."#;

/// Upstream that turns a generateContent-style request into reply text.
/// Split out so handler tests can substitute a canned reply for the network.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    async fn generate(&self, request: &Value) -> Result<String, StockwiseError>;
}

pub struct GeminiBackend {
    api_key: String,
    endpoint: String,
    client: Client,
}

impl GeminiBackend {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            endpoint: GEMINI_ENDPOINT.to_string(),
            client: Client::new(),
        }
    }

    /// Returns the reply text, or (retryable, error) on failure.
    async fn call_once(&self, request: &Value) -> Result<String, (bool, StockwiseError)> {
        let response = self
            .client
            .post(format!("{}?key={}", self.endpoint, self.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                (
                    true,
                    StockwiseError::Upstream(format!("vision request failed: {}", e)),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let transient = status.as_u16() == 429 || status.is_server_error();
            return Err((
                transient,
                StockwiseError::Upstream(format!("vision API returned {}: {}", status, body)),
            ));
        }

        let result: Value = response.json().await.map_err(|e| {
            (
                false,
                StockwiseError::Upstream(format!("failed to read vision response: {}", e)),
            )
        })?;

        let text = result["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| {
                (
                    false,
                    StockwiseError::Upstream("no text in vision response".to_string()),
                )
            })?;

        Ok(text.to_string())
    }
}

#[async_trait]
impl VisionBackend for GeminiBackend {
    async fn generate(&self, request: &Value) -> Result<String, StockwiseError> {
        let mut attempt = 1;
        let mut delay = INITIAL_BACKOFF;

        loop {
            match self.call_once(request).await {
                Ok(text) => return Ok(text),
                Err((transient, err)) if transient && attempt < MAX_ATTEMPTS => {
                    warn!("vision call attempt {} failed, retrying: {}", attempt, err);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err((_, err)) => return Err(err),
            }
        }
    }
}

pub struct VisionService {
    backend: Box<dyn VisionBackend>,
}

impl VisionService {
    pub fn new(api_key: String) -> Self {
        Self::with_backend(Box::new(GeminiBackend::new(api_key)))
    }

    pub fn with_backend(backend: Box<dyn VisionBackend>) -> Self {
        Self { backend }
    }

    /// Analyze a batch of product images as views of one product.
    ///
    /// The HTTP layer already rejects empty submissions; the re-check here
    /// keeps a misused call from ever sending a degenerate upstream request.
    pub async fn analyze_images(
        &self,
        files: &[UploadedImage],
    ) -> Result<ProductInsight, StockwiseError> {
        if files.is_empty() {
            return Err(StockwiseError::InvalidInput(
                "No images provided".to_string(),
            ));
        }

        for file in files {
            debug!(
                "analyzing {} ({}, {} bytes)",
                file.filename,
                file.content_type,
                file.data.len()
            );
        }

        let request = build_request(files);
        let reply = self.backend.generate(&request).await?;
        parse_insight(&reply)
    }
}

fn build_request(files: &[UploadedImage]) -> Value {
    let mut parts = vec![json!({ "text": ANALYSIS_PROMPT })];
    for file in files {
        parts.push(json!({
            "inline_data": {
                "mime_type": file.content_type,
                "data": general_purpose::STANDARD.encode(&file.data),
            }
        }));
    }

    json!({
        "contents": [{ "parts": parts }],
        "generationConfig": { "temperature": 0.2 }
    })
}

/// Strip the ```json / ``` fences the model sometimes wraps its reply in.
fn strip_code_fences(text: &str) -> &str {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}

fn parse_insight(reply: &str) -> Result<ProductInsight, StockwiseError> {
    let cleaned = strip_code_fences(reply);
    serde_json::from_str(cleaned).map_err(|e| StockwiseError::MalformedResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_REPLY: &str = r#"{"shortDescription":"A red mug","description":"A glazed ceramic mug shown from four angles.","tags":["red","ceramic","mug","kitchen"],"keywords":"red, ceramic, mug"}"#;

    fn sample_images(count: usize) -> Vec<UploadedImage> {
        (0..count)
            .map(|i| UploadedImage {
                filename: format!("view-{}.png", i),
                content_type: "image/png".to_string(),
                data: vec![0x89, 0x50, 0x4e, 0x47],
            })
            .collect()
    }

    struct CannedBackend(String);

    #[async_trait]
    impl VisionBackend for CannedBackend {
        async fn generate(&self, _request: &Value) -> Result<String, StockwiseError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn fences_are_stripped_before_parsing() {
        let fenced = format!("```json\n{}\n```", VALID_REPLY);
        assert_eq!(strip_code_fences(&fenced), VALID_REPLY);

        let bare_fence = format!("```\n  {}  \n```", VALID_REPLY);
        assert_eq!(strip_code_fences(&bare_fence), VALID_REPLY);

        assert_eq!(strip_code_fences(VALID_REPLY), VALID_REPLY);
    }

    #[test]
    fn fenced_and_unfenced_replies_parse_identically() {
        let fenced = format!("```json\n{}\n```", VALID_REPLY);
        assert_eq!(
            parse_insight(&fenced).unwrap(),
            parse_insight(VALID_REPLY).unwrap()
        );
    }

    #[test]
    fn valid_reply_parses_unchanged() {
        let insight = parse_insight(VALID_REPLY).unwrap();
        assert_eq!(insight.short_description, "A red mug");
        assert_eq!(insight.tags, vec!["red", "ceramic", "mug", "kitchen"]);
        assert_eq!(insight.keywords, "red, ceramic, mug");
    }

    #[test]
    fn plain_text_reply_is_malformed() {
        let err = parse_insight("Sorry, I cannot process this.").unwrap_err();
        assert!(matches!(err, StockwiseError::MalformedResponse(_)));
        assert!(format!("{}", err).starts_with("Invalid JSON from AI"));
    }

    #[test]
    fn extra_or_missing_keys_are_malformed() {
        let extra = r#"{"shortDescription":"x","description":"y","tags":[],"keywords":"","confidence":0.9}"#;
        assert!(matches!(
            parse_insight(extra),
            Err(StockwiseError::MalformedResponse(_))
        ));

        let missing = r#"{"shortDescription":"x","description":"y","tags":[]}"#;
        assert!(matches!(
            parse_insight(missing),
            Err(StockwiseError::MalformedResponse(_))
        ));
    }

    #[test]
    fn request_carries_prompt_plus_one_part_per_image() {
        let request = build_request(&sample_images(2));
        let parts = request["contents"][0]["parts"].as_array().unwrap();

        assert_eq!(parts.len(), 3);
        assert!(
            parts[0]["text"]
                .as_str()
                .unwrap()
                .contains("no duplicate words")
        );
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(
            parts[1]["inline_data"]["data"].as_str().unwrap(),
            general_purpose::STANDARD.encode([0x89u8, 0x50, 0x4e, 0x47])
        );
    }

    #[actix_web::test]
    async fn empty_batch_fails_fast() {
        let service = VisionService::with_backend(Box::new(CannedBackend(String::new())));
        let err = service.analyze_images(&[]).await.unwrap_err();
        assert!(matches!(err, StockwiseError::InvalidInput(msg) if msg == "No images provided"));
    }

    #[actix_web::test]
    async fn analyze_returns_the_parsed_insight() {
        let fenced = format!("```json\n{}\n```", VALID_REPLY);
        let service = VisionService::with_backend(Box::new(CannedBackend(fenced)));

        let insight = service.analyze_images(&sample_images(2)).await.unwrap();
        assert_eq!(insight.short_description, "A red mug");
        assert!(insight.description.contains("ceramic"));
    }

    // Live call against the real API; skips itself when no key is configured.
    #[actix_web::test]
    async fn gemini_live_analysis() {
        let api_key = match std::env::var("GEMINI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => key,
            _ => {
                eprintln!("GEMINI_API_KEY not set; skipping live test");
                return;
            }
        };

        let img = image::RgbImage::from_pixel(32, 32, image::Rgb([180, 40, 40]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let service = VisionService::new(api_key);
        let insight = service
            .analyze_images(&[UploadedImage {
                filename: "swatch.png".to_string(),
                content_type: "image/png".to_string(),
                data: png,
            }])
            .await
            .expect("live analysis failed");

        assert!(!insight.short_description.is_empty());
        assert!(!insight.tags.is_empty());
    }
}
