//! Result type alias for capmirror
//!
//! This module provides a convenient Result type alias that uses MirrorError
//! as the error type.

use super::errors::MirrorError;

/// Result type alias for capmirror operations
///
/// This is a convenience type alias that uses `MirrorError` as the error type.
/// Use this throughout the codebase for fallible operations.
///
/// # Examples
///
/// ```
/// use capmirror::domain::result::Result;
/// use capmirror::domain::errors::MirrorError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(MirrorError::Configuration("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, MirrorError>;
