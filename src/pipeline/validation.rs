//! Request-level input checks.

use thiserror::Error;

/// A recoverable validation problem. The request is still answered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("NAME TOO SHORT: {length} character(s), at least {min} required")]
    TooShort { length: usize, min: usize },
}

/// Check that `name` has at least `min` characters.
pub fn check_name(name: &str, min: usize) -> Result<(), ValidationFailure> {
    let length = name.chars().count();
    if length < min {
        return Err(ValidationFailure::TooShort { length, min });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_name() {
        assert!(check_name("Al", 2).is_ok());
        assert_eq!(
            check_name("A", 2),
            Err(ValidationFailure::TooShort { length: 1, min: 2 })
        );
        assert!(check_name("", 2).is_err());
        // counted in characters, not bytes
        assert!(check_name("é", 2).is_err());
    }
}
