//! Guessing what a drawing shows, through an external captioning service.
//!
//! The service is a collaborator behind [`Captioner`]. Whatever goes wrong on
//! the way (bad image, network, quota, odd response) ends up as
//! [`FALLBACK_GUESS`] in [`guess`], so callers always get text to broadcast.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::CaptionError;

pub const FALLBACK_GUESS: &str = "Hmm... I can't tell what that is. Try drawing more!";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const PROMPT: &str = "This is a sketch from a shared whiteboard. \
Guess what it shows and answer with one short sentence.";

#[async_trait]
pub trait Captioner: Send + Sync {
    async fn caption(&self, image: &[u8]) -> Result<String, CaptionError>;
}

/// Used when no API key is configured.
pub struct DisabledCaptioner;

#[async_trait]
impl Captioner for DisabledCaptioner {
    async fn caption(&self, _image: &[u8]) -> Result<String, CaptionError> {
        Err(CaptionError::MissingApiKey)
    }
}

/// Gemini `generateContent` with the image sent inline.
pub struct GeminiCaptioner {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiCaptioner {
    pub fn new(api_key: String, model: String, base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum RequestPart {
    Text(String),
    InlineData {
        #[serde(rename = "mimeType")]
        mime_type: String,
        data: String,
    },
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn text(self) -> Option<String> {
        let text = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join("");
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

#[async_trait]
impl Captioner for GeminiCaptioner {
    async fn caption(&self, image: &[u8]) -> Result<String, CaptionError> {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text(PROMPT.to_string()),
                    RequestPart::InlineData {
                        mime_type: sniff_mime_type(image).to_string(),
                        data: base64::engine::general_purpose::STANDARD.encode(image),
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CaptionError::Status { status, body });
        }

        let body: GenerateResponse = response.json().await?;
        body.text().ok_or(CaptionError::EmptyResponse)
    }
}

/// Accepts raw base64 or a `data:<mime>;base64,<data>` URL.
pub fn decode_image(encoded: &str) -> Result<Vec<u8>, CaptionError> {
    let data = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    let bytes = base64::engine::general_purpose::STANDARD.decode(data.trim())?;
    Ok(bytes)
}

fn sniff_mime_type(image: &[u8]) -> &'static str {
    match image {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "image/png",
    }
}

/// Never fails: errors are logged and replaced with [`FALLBACK_GUESS`].
pub async fn guess(captioner: &dyn Captioner, encoded: &str) -> String {
    let result = match decode_image(encoded) {
        Ok(image) => captioner.caption(&image).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(text) => text,
        Err(err) => {
            log::warn!("Guess failed: {}", err);
            FALLBACK_GUESS.to_string()
        }
    }
}
