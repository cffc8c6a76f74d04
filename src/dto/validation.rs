//! Validation helpers for DTOs.

use validator::ValidationError;

/// Alphabet join codes are sampled from. Ambiguous glyphs (0/O, 1/I/L) are
/// excluded so codes survive being read aloud in a classroom.
pub const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Length of every generated join code.
pub const JOIN_CODE_LENGTH: usize = 6;

/// Validates that a join code is exactly [`JOIN_CODE_LENGTH`] characters from
/// the code alphabet.
///
/// # Examples
///
/// ```ignore
/// validate_join_code("KX7P2Q") // Ok
/// validate_join_code("kx7p2q") // Err - lowercase
/// validate_join_code("KX7P2")  // Err - too short
/// ```
pub fn validate_join_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != JOIN_CODE_LENGTH {
        let mut err = ValidationError::new("join_code_length");
        err.message = Some(
            format!(
                "Join code must be exactly {JOIN_CODE_LENGTH} characters (got {})",
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code.bytes().all(|b| JOIN_CODE_ALPHABET.contains(&b)) {
        let mut err = ValidationError::new("join_code_format");
        err.message = Some("Join code contains characters outside the code alphabet".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_join_code_valid() {
        assert!(validate_join_code("KX7P2Q").is_ok());
        assert!(validate_join_code("ABCDEF").is_ok());
        assert!(validate_join_code("234567").is_ok());
    }

    #[test]
    fn test_validate_join_code_invalid_length() {
        assert!(validate_join_code("KX7P2").is_err()); // too short
        assert!(validate_join_code("KX7P2QQ").is_err()); // too long
        assert!(validate_join_code("").is_err()); // empty
    }

    #[test]
    fn test_validate_join_code_invalid_format() {
        assert!(validate_join_code("kx7p2q").is_err()); // lowercase
        assert!(validate_join_code("KX7P2O").is_err()); // ambiguous O
        assert!(validate_join_code("KX7P21").is_err()); // ambiguous 1
        assert!(validate_join_code("KX7P2 ").is_err()); // space
    }
}
