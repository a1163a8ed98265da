//! Error taxonomy for the scraping pipeline.
//!
//! Only a failed page fetch changes control flow (it ends pagination). Every other
//! variant is recovered at the scope of a single record or artifact and logged.

pub type ScrapeResult<T> = Result<T, ScrapeError>;

#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    /// Network or HTTP failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed or unexpected markup for one block
    #[error("parse error: {0}")]
    Parse(String),

    /// Corrupt or unsupported image artifact
    #[error("image decode error: {0}")]
    ImageDecode(String),

    #[error("image encode error: {0}")]
    ImageEncode(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScrapeError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::ImageDecode(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::ImageEncode(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::Transport(format!("HTTP {} for {}", status, url_of(&e))),
            None => Self::Transport(e.to_string()),
        }
    }
}

fn url_of(e: &reqwest::Error) -> String {
    e.url().map(|u| u.to_string()).unwrap_or_else(|| "<unknown url>".to_string())
}

impl From<image::ImageError> for ScrapeError {
    fn from(e: image::ImageError) -> Self {
        Self::ImageDecode(e.to_string())
    }
}

impl From<gif::EncodingError> for ScrapeError {
    fn from(e: gif::EncodingError) -> Self {
        Self::ImageEncode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(ScrapeError::transport("x").to_string().contains("transport error:"));
        assert!(ScrapeError::parse("x").to_string().contains("parse error:"));
        assert!(ScrapeError::decode("x").to_string().contains("image decode error:"));
        assert!(ScrapeError::encode("x").to_string().contains("image encode error:"));
        assert!(ScrapeError::config("x").to_string().contains("configuration error:"));
    }

    #[test]
    fn io_errors_are_transparent() {
        let err: ScrapeError = std::io::Error::other("disk full").into();
        assert_eq!(err.to_string(), "disk full");
    }
}
