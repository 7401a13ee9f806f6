use tokio_tungstenite::tungstenite;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Channel failure for: {0} - Failure: {1}")]
    ChannelFailure(String, String),
    #[error("Transport error: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    #[error("Replay file {0} unusable - Reason: {1}")]
    ReplayFile(String, String),
    #[error("Invalid backend url: {0}")]
    InvalidUrl(String),
    #[error("Request to {0} failed: {1}")]
    Request(String, reqwest::Error),
    #[error("Request to {0} returned status {1}")]
    UnexpectedStatus(String, u16),
    #[error("Not authorized, credentials cleared")]
    Unauthorized,
    #[error("Report stream failed: {0}")]
    ReportStream(String),
    #[error("Shutdown in progress")]
    Shutdown,
}
