use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Column '{column}' is missing from {path}")]
    MissingColumn { column: String, path: String },
    #[error("No worksheet found in {0}")]
    EmptyWorkbook(String),

    #[error("Invalid row range '{0}', expected 'start-end' with 1 <= start <= end")]
    InvalidRowRange(String),
    #[error("Invalid pacing '{0}', expected 'users,interval,pause' with users >= 1")]
    InvalidPacing(String),
    #[error("Invalid max attempts: {0}, must be at least 1")]
    InvalidAttempts(u32),

    #[error("Session id is missing. Pass --session-id or set INSTAGRAM_SESSION_ID.")]
    MissingSession,
    #[error("Invalid api base url: {0}")]
    InvalidApiBase(String),
    #[error("Session id doesn't start with a numeric user id.")]
    InvalidSession,
    #[error("Provider responded with {status}: {message}")]
    ProviderStatus {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Spreadsheet read Error: {0}")]
    Calamine(#[from] calamine::Error),
    #[error("Spreadsheet write Error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}
