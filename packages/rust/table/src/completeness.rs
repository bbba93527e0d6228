//! The "already has a usable value" predicate shared by every stage.
//!
//! A value is missing when it is absent, blank, one of the configured
//! placeholder strings, or starts with one of the stage's error prefixes.
//! Error-prefixed values are written by a failed fetch, so failing this
//! check is what makes them retried on the next run.

use leadenrich_shared::FieldValue;

/// Placeholder used when nothing else is configured.
pub const NOT_FOUND: &str = "Not Found";

/// Completeness rules for one field.
#[derive(Debug, Clone)]
pub struct Completeness {
    placeholders: Vec<String>,
    error_prefixes: Vec<String>,
}

impl Default for Completeness {
    fn default() -> Self {
        Self::new([NOT_FOUND])
    }
}

impl Completeness {
    /// Rules with the given placeholder denylist and no error prefixes.
    pub fn new<I, S>(placeholders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            placeholders: placeholders
                .into_iter()
                .map(|p| p.into().trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            error_prefixes: Vec::new(),
        }
    }

    /// Also treat values starting with `prefix` as missing.
    pub fn with_error_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.error_prefixes.push(prefix.into());
        self
    }

    /// Whether `value` counts as present.
    pub fn is_present(&self, value: &FieldValue) -> bool {
        match value {
            FieldValue::Absent => false,
            FieldValue::Integer(_) => true,
            FieldValue::Float(x) => !x.is_nan(),
            FieldValue::Text(s) => {
                let trimmed = s.trim();
                !trimmed.is_empty()
                    && !self.placeholders.iter().any(|p| p == trimmed)
                    && !self.error_prefixes.iter().any(|p| trimmed.starts_with(p.as_str()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values() {
        let rules = Completeness::default();
        for value in [
            FieldValue::Absent,
            FieldValue::text(""),
            FieldValue::text("  "),
            FieldValue::text("Not Found"),
            FieldValue::text(" Not Found "),
            FieldValue::Float(f64::NAN),
        ] {
            assert!(!rules.is_present(&value), "{value:?} should be missing");
        }
    }

    #[test]
    fn zero_and_real_text_are_present() {
        let rules = Completeness::default();
        for value in [
            FieldValue::Integer(0),
            FieldValue::Float(0.0),
            FieldValue::text("0"),
            FieldValue::text("0.0"),
            FieldValue::text("N/A-looking-but-real-text"),
        ] {
            assert!(rules.is_present(&value), "{value:?} should be present");
        }
    }

    #[test]
    fn error_prefixes_make_values_retryable() {
        let rules = Completeness::default().with_error_prefix("Could not fetch");
        assert!(!rules.is_present(&FieldValue::text("Could not fetch: Timeout")));
        assert!(rules.is_present(&FieldValue::text("No website available")));
    }

    #[test]
    fn custom_placeholders() {
        let rules = Completeness::new(["N/A", "Not Found"]);
        assert!(!rules.is_present(&FieldValue::text("N/A")));
        assert!(rules.is_present(&FieldValue::text("N/A-looking-but-real-text")));
    }
}
