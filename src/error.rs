use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("Required field '{field}' not found in response. Available: {available:?}")]
    RequiredFieldNotFound {
        field: String,
        available: Vec<String>,
    },
}
