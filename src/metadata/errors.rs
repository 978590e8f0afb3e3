/// A URL that had to be absolute and well-formed was not.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid url {url:?}: {reason}")]
pub struct InvalidUrlError {
    pub url: String,
    pub reason: String,
}

impl InvalidUrlError {
    pub fn new(url: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("headless rendering is disabled")]
    Disabled,

    #[error("failed to start browser: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("render timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("page is still an anti-bot challenge after rendering")]
    Challenge,

    #[error("render task crashed: {0}")]
    Crashed(String),
}

/// A favicon/image candidate failed its live reachability check.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{url} is not reachable: {reason}")]
pub struct ValidationFailure {
    pub url: String,
    pub reason: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    InvalidUrl(#[from] InvalidUrlError),

    #[error("network error: {0}")]
    Network(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("redirect limit of {limit} exceeded")]
    RedirectLimit { limit: usize },

    #[error("redirect loop at {0}")]
    RedirectLoop(String),

    #[error("http client error: {0}")]
    Client(String),
}
