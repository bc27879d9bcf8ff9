//! Shared utility functions
//! Common helpers used across the codebase

use std::time::{SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
/// Consistent implementation used throughout the codebase
#[inline]
#[must_use]
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Clean markdown code blocks from model replies
/// Handles ```json and ``` wrappers commonly returned by LLMs
#[inline]
#[must_use]
pub fn clean_model_reply(text: &str) -> &str {
    text.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}
