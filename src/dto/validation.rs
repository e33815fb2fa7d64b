//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::room::{ROOM_CODE_ALPHABET, ROOM_CODE_LENGTH};

/// Validates that a room code is exactly six characters from the
/// unambiguous room-code alphabet.
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != ROOM_CODE_LENGTH {
        let mut err = ValidationError::new("room_code_length");
        err.message = Some(
            format!(
                "Room code must be exactly {ROOM_CODE_LENGTH} characters (got {})",
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)) {
        let mut err = ValidationError::new("room_code_format");
        err.message =
            Some("Room code must contain only uppercase letters and digits 2-9".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_room_code_valid() {
        assert!(validate_room_code("ABC234").is_ok());
        assert!(validate_room_code("ZZZZZZ").is_ok());
        assert!(validate_room_code("23Q9XY").is_ok());
    }

    #[test]
    fn test_validate_room_code_invalid_length() {
        assert!(validate_room_code("ABC23").is_err()); // too short
        assert!(validate_room_code("ABC2345").is_err()); // too long
        assert!(validate_room_code("").is_err()); // empty
    }

    #[test]
    fn test_validate_room_code_invalid_format() {
        assert!(validate_room_code("abc234").is_err()); // lowercase
        assert!(validate_room_code("ABC230").is_err()); // ambiguous 0
        assert!(validate_room_code("ABC23I").is_err()); // ambiguous I
        assert!(validate_room_code("ABC 23").is_err()); // space
    }
}
