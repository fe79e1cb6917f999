use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A collection does not line up with the one it is indexed against
    #[error("Input mismatch for {context}: expected {expected}, got {actual}")]
    InputMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Empty neighborhood: k = {k} with {available} neighbors available")]
    EmptyNeighborhood { k: usize, available: usize },

    #[error("Oracle failure: {0}")]
    OracleFailure(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn mismatch(context: &'static str, expected: usize, actual: usize) -> Self {
        Error::InputMismatch { context, expected, actual }
    }
}
