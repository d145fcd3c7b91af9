//! Error types for confab-session

use thiserror::Error;

/// Result type alias using confab-session Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during session operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the protocol layer
    #[error(transparent)]
    Proto(#[from] confab_proto::Error),

    /// The operation needs a selected conversation
    #[error("no conversation selected")]
    NoSelection,

    /// The operation needs an outstanding task
    #[error("no task is active for this conversation")]
    NoActiveTask,
}
