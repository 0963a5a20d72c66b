use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("no idle rendering handle available")]
    PoolExhausted,

    #[error("navigation deadline of {0:?} exceeded")]
    NavigationTimeout(Duration),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("renderer crashed: {0}")]
    RendererCrashed(String),

    #[error("browser error: {0}")]
    Browser(String),
}

impl RenderError {
    pub fn should_retry(&self) -> bool {
        match self {
            // Fatal for this URL - don't retry
            Self::InvalidUrl(_) => false,

            // Temporary - a later attempt may succeed
            Self::PoolExhausted => true,
            Self::NavigationTimeout(_) => true,
            Self::Navigation(_) => true,
            Self::RendererCrashed(_) => true,
            Self::Browser(_) => true,
        }
    }

    /// Whether the handle that produced this error can no longer be trusted
    /// and must be discarded rather than returned to the idle set.
    pub fn breaks_handle(&self) -> bool {
        match self {
            Self::RendererCrashed(_) | Self::Browser(_) => true,
            Self::InvalidUrl(_)
            | Self::PoolExhausted
            | Self::NavigationTimeout(_)
            | Self::Navigation(_) => false,
        }
    }

    pub fn from_cdp(err: chromiumoxide::error::CdpError) -> Self {
        let message = err.to_string();
        // Chrome reports a dead renderer process as a crashed/detached target.
        if message.contains("crashed") || message.contains("detached") {
            Self::RendererCrashed(message)
        } else {
            Self::Navigation(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_suspects_but_does_not_break() {
        let err = RenderError::NavigationTimeout(Duration::from_secs(30));
        assert!(err.should_retry());
        assert!(!err.breaks_handle());
    }

    #[test]
    fn crash_breaks_handle() {
        let err = RenderError::RendererCrashed("target crashed".into());
        assert!(err.breaks_handle());
    }

    #[test]
    fn invalid_url_is_permanent() {
        let err = RenderError::InvalidUrl(url::ParseError::EmptyHost);
        assert!(!err.should_retry());
        assert!(!err.breaks_handle());
    }
}
