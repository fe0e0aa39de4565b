//! JSON 404 for unmatched routes.

use crate::error::AppError;

/// Answers every unmatched route with `{success:false, error:"Route not found"}`.
pub async fn not_found_handler() -> AppError {
    AppError::NotFound
}
