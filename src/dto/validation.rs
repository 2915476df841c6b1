//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted player name, in characters.
pub const MAX_NAME_LEN: usize = 32;
/// Longest accepted free-text answer, in characters.
pub const MAX_ANSWER_LEN: usize = 500;
/// Largest score magnitude a host may send.
pub const MAX_SCORE_MAGNITUDE: i64 = 1_000_000_000;

/// Validates that a player name is non-blank, short and free of control characters.
///
/// # Examples
///
/// ```ignore
/// validate_player_name("Alice")  // Ok
/// validate_player_name("   ")    // Err - blank
/// validate_player_name("a\nb")   // Err - control character
/// ```
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("player_name_blank");
        err.message = Some("Player name must not be blank".into());
        return Err(err);
    }

    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(
            format!("Player name must be at most {MAX_NAME_LEN} characters (got {len})").into(),
        );
        return Err(err);
    }

    if name.chars().any(char::is_control) {
        let mut err = ValidationError::new("player_name_format");
        err.message = Some("Player name must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates the length of a submitted or in-progress answer.
pub fn validate_answer_text(text: &str) -> Result<(), ValidationError> {
    let len = text.chars().count();
    if len > MAX_ANSWER_LEN {
        let mut err = ValidationError::new("answer_length");
        err.message =
            Some(format!("Answer must be at most {MAX_ANSWER_LEN} characters (got {len})").into());
        return Err(err);
    }
    Ok(())
}

/// Validates a host-supplied score or award against [`MAX_SCORE_MAGNITUDE`].
pub fn validate_score(value: i64) -> Result<(), ValidationError> {
    if value.checked_abs().is_none_or(|abs| abs > MAX_SCORE_MAGNITUDE) {
        let mut err = ValidationError::new("score_range");
        err.message = Some(
            format!("Score must lie within ±{MAX_SCORE_MAGNITUDE} (got {value})").into(),
        );
        return Err(err);
    }
    Ok(())
}

/// Validates that a quiz question has a prompt.
pub fn validate_question_prompt(prompt: &str) -> Result<(), ValidationError> {
    if prompt.trim().is_empty() {
        let mut err = ValidationError::new("question_blank");
        err.message = Some("Question prompt must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_player_name_valid() {
        assert!(validate_player_name("Alice").is_ok());
        assert!(validate_player_name("Jean-Luc Picard").is_ok());
        assert!(validate_player_name("Ünïcödé").is_ok());
        assert!(validate_player_name(&"x".repeat(MAX_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_validate_player_name_invalid() {
        assert!(validate_player_name("").is_err());
        assert!(validate_player_name("   ").is_err());
        assert!(validate_player_name("a\tb").is_err());
        assert!(validate_player_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_answer_text() {
        assert!(validate_answer_text("").is_ok());
        assert!(validate_answer_text(&"a".repeat(MAX_ANSWER_LEN)).is_ok());
        assert!(validate_answer_text(&"a".repeat(MAX_ANSWER_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_score() {
        assert!(validate_score(0).is_ok());
        assert!(validate_score(-MAX_SCORE_MAGNITUDE).is_ok());
        assert!(validate_score(MAX_SCORE_MAGNITUDE + 1).is_err());
        assert!(validate_score(i64::MIN).is_err());
        assert!(validate_score(i64::MAX).is_err());
    }

    #[test]
    fn test_validate_question_prompt() {
        assert!(validate_question_prompt("Capital of France?").is_ok());
        assert!(validate_question_prompt(" \n").is_err());
    }
}
