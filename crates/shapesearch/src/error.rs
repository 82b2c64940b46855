use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShapeSearchError {
    #[error("Dataset load error: {0}")]
    Load(#[from] shapesearch_dataset::DataError),
    #[error("Filter error: {0}")]
    Filter(#[from] crate::filter::FilterError),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ShapeSearchError>;
