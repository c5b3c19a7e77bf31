use thiserror::Error;

/// Failure of a single outbound HTTP call.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(err)
        }
    }
}

/// Failure of one stage of a radar refresh cycle.
///
/// None of these surface to the caller of `camera_image`; they decide
/// which path the cycle takes (fallback, skip compositing) and what gets
/// logged.
#[derive(Debug, Error)]
pub enum RadarError {
    #[error("radar fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("frame decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("animation encode failed: {0}")]
    Encode(String),
}
