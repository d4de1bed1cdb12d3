use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurfcastError {
    #[error("Invalid input: {0}")]
    InputValidation(String),

    #[error("Missing required columns in {source_name}: {columns}")]
    MissingColumns {
        source_name: String,
        columns: String,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chart rendering error: {0}")]
    Chart(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SurfcastError {
    /// How the failure is surfaced to a caller of the recommendation service.
    pub fn class(&self) -> ErrorClass {
        match self {
            SurfcastError::InputValidation(_) | SurfcastError::MissingColumns { .. } => {
                ErrorClass::InputValidation
            }
            _ => ErrorClass::Unexpected,
        }
    }

    /// A problem with one station's data; the batch skips that station rather than abort.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SurfcastError::InsufficientData(_)
                | SurfcastError::MissingColumns { .. }
                | SurfcastError::InputValidation(_)
                | SurfcastError::Io(_)
                | SurfcastError::Csv(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    InputValidation,
    Unexpected,
}

impl ErrorClass {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorClass::InputValidation => 400,
            ErrorClass::Unexpected => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, SurfcastError>;
