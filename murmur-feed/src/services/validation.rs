use murmur_shared::errors::{AppError, AppResult, ErrorCode};

pub const MAX_CONTENT_CHARS: usize = 1000;
pub const MAX_DISPLAY_NAME_CHARS: usize = 50;
pub const MAX_BIO_CHARS: usize = 500;

fn too_long(code: ErrorCode, message: &str, max_chars: usize) -> AppError {
    AppError::with_details(code, message, serde_json::json!({ "max_chars": max_chars }))
}

/// Trimmed post body, 1..=1000 characters.
pub fn post_content(raw: &str) -> AppResult<&str> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(AppError::new(ErrorCode::InvalidContent, "post content cannot be empty"));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(too_long(
            ErrorCode::InvalidContent,
            "posts are limited to 1,000 characters",
            MAX_CONTENT_CHARS,
        ));
    }
    Ok(content)
}

pub fn display_name(raw: &str) -> AppResult<&str> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::new(ErrorCode::InvalidDisplayName, "display name cannot be empty"));
    }
    if name.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(too_long(
            ErrorCode::InvalidDisplayName,
            "display name is limited to 50 characters",
            MAX_DISPLAY_NAME_CHARS,
        ));
    }
    Ok(name)
}

/// `None` means the bio should be cleared.
pub fn bio(raw: Option<&str>) -> AppResult<Option<&str>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if raw.chars().count() > MAX_BIO_CHARS {
        return Err(too_long(ErrorCode::InvalidBio, "bio is limited to 500 characters", MAX_BIO_CHARS));
    }
    let trimmed = raw.trim();
    Ok((!trimmed.is_empty()).then_some(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_is_trimmed() {
        assert_eq!(post_content("  hello \n").unwrap(), "hello");
    }

    #[test]
    fn blank_content_is_rejected() {
        for raw in ["", "   ", "\n\t"] {
            let err = post_content(raw).unwrap_err();
            assert_eq!(err.error_code(), Some(ErrorCode::InvalidContent));
        }
    }

    #[test]
    fn content_limit_counts_characters_not_bytes() {
        let at_limit = "あ".repeat(MAX_CONTENT_CHARS);
        assert!(post_content(&at_limit).is_ok());

        let over = "a".repeat(MAX_CONTENT_CHARS + 1);
        match post_content(&over).unwrap_err() {
            AppError::Known { code, details, .. } => {
                assert_eq!(code, ErrorCode::InvalidContent);
                assert_eq!(details, Some(serde_json::json!({ "max_chars": 1000 })));
            }
            other => panic!("unexpected error: {other}"),
        }

        // Surrounding whitespace does not count against the limit.
        let padded = format!("  {}  ", "a".repeat(MAX_CONTENT_CHARS));
        assert!(post_content(&padded).is_ok());
    }

    #[test]
    fn display_name_rules() {
        assert_eq!(display_name(" Alice ").unwrap(), "Alice");
        assert!(display_name("  ").is_err());
        assert!(display_name(&"x".repeat(50)).is_ok());
        assert_eq!(
            display_name(&"x".repeat(51)).unwrap_err().error_code(),
            Some(ErrorCode::InvalidDisplayName)
        );
    }

    #[test]
    fn bio_rules() {
        assert_eq!(bio(None).unwrap(), None);
        assert_eq!(bio(Some("   ")).unwrap(), None);
        assert_eq!(bio(Some(" rustacean ")).unwrap(), Some("rustacean"));
        assert!(bio(Some(&"b".repeat(500))).is_ok());
        assert_eq!(
            bio(Some(&"b".repeat(501))).unwrap_err().error_code(),
            Some(ErrorCode::InvalidBio)
        );
    }
}
