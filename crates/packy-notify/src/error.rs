use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered {status}")]
    Status { url: String, status: u16 },

    #[error("gave up on {target} after {attempts} attempts: {last}")]
    GaveUp {
        target: &'static str,
        attempts: u32,
        last: String,
    },
}
