pub mod admin_dto;
pub mod auth_dto;
pub mod visit_dto;

use serde::Deserialize;
use validator::ValidationError;

/// Trims a string field and converts blank input to `None`.
pub(crate) fn trim_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}

/// Rejects strings that are empty or whitespace only.
pub(crate) fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("non_blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "trim_optional_string")]
        value: Option<String>,
    }

    #[test]
    fn trim_optional_string_drops_blank_input() {
        let p: Probe = serde_json::from_str(r#"{"value": "  "}"#).unwrap();
        assert_eq!(p.value, None);
        let p: Probe = serde_json::from_str(r#"{"value": " x "}"#).unwrap();
        assert_eq!(p.value.as_deref(), Some("x"));
        let p: Probe = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(p.value, None);
    }

    #[test]
    fn non_blank_rejects_whitespace() {
        assert!(non_blank("  ").is_err());
        assert!(non_blank("").is_err());
        assert!(non_blank("Energie").is_ok());
    }
}
