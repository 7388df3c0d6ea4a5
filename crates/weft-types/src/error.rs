//! Unified error interface for WEFT.
//!
//! Every error enum in the workspace implements [`ErrorCode`] so that
//! callers can branch on a stable machine-readable code rather than on
//! display strings, and so that retry decisions are explicit.
//!
//! # Code Convention
//!
//! | Layer | Prefix |
//! |-------|--------|
//! | weft-store | `STORE_` |
//! | weft-engine | `ENGINE_` |
//! | query service | `QUERY_` |
//! | page fetcher | `FETCH_` |
//! | configuration | `CONFIG_` |
//!
//! # Recoverability
//!
//! An error is **recoverable** when retrying the operation may succeed
//! (rate limit, transient I/O). Contract violations — duplicate
//! component insertion, pool exhaustion — are never recoverable: they
//! indicate a core invariant was broken by the caller.

/// Machine-readable error code interface.
///
/// # Code Format
///
/// - **UPPER_SNAKE_CASE**: e.g. `"STORE_POOL_EXHAUSTED"`
/// - **Prefixed by layer**: e.g. `"QUERY_RATE_LIMITED"`
/// - **Stable**: codes are an API contract and never change
///
/// # Example
///
/// ```
/// use weft_types::ErrorCode;
///
/// #[derive(Debug)]
/// enum QueryError {
///     RateLimited,
///     Failed(String),
/// }
///
/// impl ErrorCode for QueryError {
///     fn code(&self) -> &'static str {
///         match self {
///             Self::RateLimited => "QUERY_RATE_LIMITED",
///             Self::Failed(_) => "QUERY_FAILED",
///         }
///     }
///
///     fn is_recoverable(&self) -> bool {
///         // Rate limiting is transient; a hard failure is not.
///         matches!(self, Self::RateLimited)
///     }
/// }
///
/// assert!(QueryError::RateLimited.is_recoverable());
/// assert!(!QueryError::Failed("boom".into()).is_recoverable());
/// ```
pub trait ErrorCode {
    /// Returns the machine-readable error code.
    fn code(&self) -> &'static str;

    /// Returns whether retrying the failed operation may succeed.
    fn is_recoverable(&self) -> bool;
}

/// Validates that an error code follows WEFT conventions.
///
/// # Checks
///
/// 1. Code is non-empty
/// 2. Code starts with the expected layer prefix
/// 3. Code is UPPER_SNAKE_CASE
///
/// # Panics
///
/// Panics with a descriptive message if validation fails. Intended for
/// use inside tests.
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "error code '{code}' must start with prefix '{expected_prefix}'"
    );
    assert!(
        is_upper_snake_case(code),
        "error code '{code}' must be UPPER_SNAKE_CASE"
    );
}

/// Validates every variant of an error enum at once.
///
/// # Example
///
/// ```
/// use weft_types::{assert_error_codes, ErrorCode};
///
/// #[derive(Debug)]
/// enum E { A, B }
///
/// impl ErrorCode for E {
///     fn code(&self) -> &'static str {
///         match self { Self::A => "X_A", Self::B => "X_B" }
///     }
///     fn is_recoverable(&self) -> bool { false }
/// }
///
/// assert_error_codes(&[E::A, E::B], "X_");
/// ```
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl ErrorCode for TestError {
        fn code(&self) -> &'static str {
            match self {
                Self::Transient => "TEST_TRANSIENT",
                Self::Permanent => "TEST_PERMANENT",
            }
        }

        fn is_recoverable(&self) -> bool {
            matches!(self, Self::Transient)
        }
    }

    #[test]
    fn code_and_recoverability() {
        assert_eq!(TestError::Transient.code(), "TEST_TRANSIENT");
        assert!(TestError::Transient.is_recoverable());
        assert!(!TestError::Permanent.is_recoverable());
    }

    #[test]
    fn all_variants_valid() {
        assert_error_codes(&[TestError::Transient, TestError::Permanent], "TEST_");
    }

    #[test]
    #[should_panic(expected = "must start with prefix")]
    fn wrong_prefix_panics() {
        assert_error_code(&TestError::Transient, "WRONG_");
    }

    #[test]
    fn snake_case_check() {
        assert!(is_upper_snake_case("STORE_POOL_EXHAUSTED"));
        assert!(is_upper_snake_case("A_1"));
        assert!(!is_upper_snake_case(""));
        assert!(!is_upper_snake_case("store_pool"));
        assert!(!is_upper_snake_case("_LEADING"));
        assert!(!is_upper_snake_case("TRAILING_"));
        assert!(!is_upper_snake_case("DOUBLE__UNDERSCORE"));
    }
}
