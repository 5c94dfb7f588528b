use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("Invalid field name: {0}")]
    InvalidField(String),

    #[error("Record body must be a JSON object")]
    NotAnObject,
}

/// Record-level outcome shared by "no such id" and "id belongs to another
/// tenant". The two cases are indistinguishable by construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Record not found")]
    NotFound,
}
