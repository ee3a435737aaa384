use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntelError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("Timeout")]
    Timeout,

    #[error("Intelligence provider not configured: {0}")]
    NotConfigured(String),
}

pub type IntelResult<T> = Result<T, IntelError>;

impl From<IntelError> for forecast_core::ForecastError {
    fn from(e: IntelError) -> Self {
        match e {
            IntelError::InvalidResponse(msg) => forecast_core::ForecastError::InvalidResponse(msg),
            IntelError::NotConfigured(msg) => forecast_core::ForecastError::Config(msg),
            other => forecast_core::ForecastError::Provider(other.to_string()),
        }
    }
}
