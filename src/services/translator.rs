use crate::error::{AppError, Result};
use crate::models::auth::AuthOutcome;

/// Maps an account backend outcome onto the edge's error taxonomy.
///
/// `Ok` is the only outcome that maps to success.
pub fn translate(outcome: AuthOutcome) -> Result<()> {
    match outcome {
        AuthOutcome::Ok => Ok(()),
        AuthOutcome::NotFound => Err(AppError::NotFound),
        AuthOutcome::AlreadyExists => Err(AppError::AlreadyExists),
        AuthOutcome::Unhandled(code) => {
            tracing::error!(code, "unhandled account backend error code");
            Err(AppError::Unhandled(code))
        }
    }
}
