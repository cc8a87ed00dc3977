use thiserror::Error;

/// Client-side failures. None of them is fatal to the agent.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connect failed or the relay connection dropped.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// A cleanup or diagram call was rejected, timed out, or returned garbage.
    #[error("Gateway failure: {0}")]
    Gateway(String),

    /// Rejected locally before any network call.
    #[error("Precondition failed: {0}")]
    Precondition(String),
}

impl ClientError {
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Gateway(format!("request timed out: {err}"))
        } else if err.is_decode() {
            Self::Gateway(format!("malformed response: {err}"))
        } else {
            Self::Gateway(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
