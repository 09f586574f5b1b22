//! Error types shared by stores, caches and the record model

use thiserror::Error;

/// Result alias used across the store and cache contracts
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Failures raised while reshaping or casting a record
#[derive(Debug, Error)]
pub enum RecordError {
    /// Dotted fields under one prefix cannot be folded into nested records
    #[error(
        "structure of the record cannot be reorganized: fields under `{0}` must all be \
         dotted lists of the same size"
    )]
    Reorganize(String),

    /// The dotted path does not lead through nested records
    #[error("unsupported data type conversion for `{0}`")]
    UnsupportedConversion(String),

    /// The value cannot be represented as the requested type
    #[error("cannot cast field `{field}` to {to}: {value}")]
    Cast {
        field: String,
        to: &'static str,
        value: String,
    },
}

/// Errors of the store and cache contracts
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key is routed but no value is currently present
    #[error("not found")]
    NotFound,

    /// No binding routes the key or pattern at all
    #[error("no key")]
    NoKey,

    /// Mutation attempted on a binding without that operation
    #[error("readonly access")]
    ReadOnly,

    /// Startup-time configuration defect
    #[error("invalid bind config: {0}")]
    InvalidBindConfig(String),

    #[error("method is not supported")]
    MethodIsNotSupported,

    #[error("request timed out")]
    Timeout,

    #[error("unsupported connection scheme `{0}`")]
    UnsupportedScheme(String),

    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Record(#[from] RecordError),

    /// Driver or network failure reported by a backend
    #[error("{0}")]
    Backend(String),

    /// Several independent failures collected by a fan-out
    #[error("{}", join_messages(.0))]
    Multiple(Vec<StoreError>),
}

impl StoreError {
    /// Wrap any displayable backend failure
    pub fn backend(err: impl std::fmt::Display) -> Self {
        StoreError::Backend(err.to_string())
    }

    /// NotFound or NoKey: the caller sees "nothing there"
    pub fn is_missing(&self) -> bool {
        matches!(self, StoreError::NotFound | StoreError::NoKey)
    }

    /// Combine collected errors into one outcome
    ///
    /// No error yields `Ok`, a single error is returned unchanged and
    /// several are flattened into `Multiple`.
    pub fn combine(errors: Vec<StoreError>) -> Result<()> {
        let mut flat = Vec::with_capacity(errors.len());
        for err in errors {
            match err {
                StoreError::Multiple(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }

        match flat.len() {
            0 => Ok(()),
            1 => Err(flat.remove(0)),
            _ => Err(StoreError::Multiple(flat)),
        }
    }
}

fn join_messages(errors: &[StoreError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_empty_is_ok() {
        assert!(StoreError::combine(vec![]).is_ok());
    }

    #[test]
    fn test_combine_single_keeps_variant() {
        let err = StoreError::combine(vec![StoreError::ReadOnly]).unwrap_err();
        assert!(matches!(err, StoreError::ReadOnly));
    }

    #[test]
    fn test_combine_flattens() {
        let nested = StoreError::Multiple(vec![StoreError::NotFound, StoreError::ReadOnly]);
        let err = StoreError::combine(vec![nested, StoreError::backend("boom")]).unwrap_err();

        match &err {
            StoreError::Multiple(all) => assert_eq!(all.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.to_string(), "not found; readonly access; boom");
    }

    #[test]
    fn test_is_missing() {
        assert!(StoreError::NotFound.is_missing());
        assert!(StoreError::NoKey.is_missing());
        assert!(!StoreError::ReadOnly.is_missing());
    }
}
