use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("no captioning API key configured")]
    MissingApiKey,

    #[error("invalid image encoding: {0}")]
    InvalidImage(#[from] base64::DecodeError),

    #[error("captioning request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("captioning service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("captioning service returned no text")]
    EmptyResponse,
}
