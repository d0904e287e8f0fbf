use thiserror::Error;

/// Errors at the lifecycle seam where callers branch on the kind.
/// Everything else travels as contextual `anyhow` errors.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("invalid transition for strategy {id}: {msg}")]
    InvalidTransition { id: String, msg: String },
}
