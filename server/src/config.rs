use clap::Parser;

/// Realtime collaborative whiteboard relay.
#[derive(Debug, Clone, Parser)]
#[command(name = "whiteboard-server", version)]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// API key for the captioning service. Guesses fall back to a fixed
    /// answer when unset.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, env = "CAPTION_MODEL", default_value = "gemini-1.5-flash")]
    pub caption_model: String,

    /// Extra key handed to clients through `GET /config`.
    #[arg(long, env = "CLIENT_KEY")]
    pub client_key: Option<String>,

    /// Largest websocket message accepted, in bytes. Images travel inline.
    #[arg(long, env = "MAX_MESSAGE_SIZE", default_value_t = 100_000_000)]
    pub max_message_size: usize,
}
