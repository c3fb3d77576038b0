// Field constraints checked before every write: required text and max lengths.

use std::fmt;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub context: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.context, self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// All violations found for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", joined.join("; "))
    }
}

/// Collects violations for a single record, then reports them all at once.
pub struct Validator {
    context: &'static str,
    errors: Vec<ValidationError>,
}

impl Validator {
    pub fn new(context: &'static str) -> Self {
        Validator {
            context,
            errors: Vec::new(),
        }
    }

    fn push(&mut self, field: &str, message: String) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message,
            context: self.context.to_string(),
        });
    }

    /// Required text: must contain something other than whitespace.
    pub fn required(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        if value.trim().is_empty() {
            self.push(field, "Required field is empty".to_string());
        } else {
            self.max_len(field, Some(value), max);
        }
        self
    }

    pub fn max_len(&mut self, field: &str, value: Option<&str>, max: usize) -> &mut Self {
        if let Some(v) = value {
            let len = v.chars().count();
            if len > max {
                self.push(
                    field,
                    format!("Ensure this value has at most {} characters (it has {})", max, len),
                );
            }
        }
        self
    }

    pub fn finish(&mut self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Validation(ValidationErrors(std::mem::take(
                &mut self.errors,
            ))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_and_max_len() {
        let result = Validator::new("Account")
            .required("name", "   ", 150)
            .required("admin_name", &"x".repeat(151), 150)
            .max_len("city", Some("Recife"), 50)
            .finish();

        match result {
            Err(StoreError::Validation(errors)) => {
                assert_eq!(errors.0.len(), 2);
                assert!(errors.has_field("name"));
                assert!(errors.has_field("admin_name"));
                assert!(!errors.has_field("city"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_max_len_counts_characters() {
        // 20 multi-byte characters still fit a 20-character column
        let value = "ç".repeat(20);
        assert!(Validator::new("LookupEntry")
            .max_len("code", Some(&value), 20)
            .finish()
            .is_ok());
    }
}
