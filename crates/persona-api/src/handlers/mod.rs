//! Request handlers organized by resource.

pub mod auction;
pub mod health;
pub mod profile;
pub mod visitors;

use axum::extract::rejection::JsonRejection;

/// Human-readable message for a body that failed to decode.
pub(crate) fn rejection_message(rejection: &JsonRejection) -> String {
    format!("Invalid request body: {}", rejection.body_text())
}
