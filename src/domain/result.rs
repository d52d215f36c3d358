//! Result type alias for Configraph
//!
//! This module provides a convenient Result type alias that uses
//! [`ConfigraphError`] as the error type.

use super::errors::ConfigraphError;

/// Result type alias for Configraph operations
///
/// # Examples
///
/// ```
/// use configraph::domain::result::Result;
/// use configraph::domain::errors::ConfigraphError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(ConfigraphError::Schema("duplicate entity".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, ConfigraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }

    #[test]
    fn test_result_err() {
        let result: Result<i32> = Err(ConfigraphError::Cache("load failed".to_string()));
        assert!(result.is_err());
    }
}
