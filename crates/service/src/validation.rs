//! Field-level validation errors, rendered as `{"field": ["field <message>"]}`.
use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` for `field`, prefixed with the field name.
    pub fn add(&mut self, field: &str, message: impl AsRef<str>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(format!("{field} {}", message.as_ref()));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(value)` when nothing was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_prefixed_and_grouped() {
        let mut errs = FieldErrors::new();
        errs.add("email", "field required");
        errs.add("password", "should have at least 8 characters");
        errs.add("email", "value is not a valid email address");
        let json = serde_json::to_value(&errs).unwrap();
        assert_eq!(json["email"][0], "email field required");
        assert_eq!(json["email"][1], "email value is not a valid email address");
        assert_eq!(json["password"][0], "password should have at least 8 characters");
    }

    #[test]
    fn empty_errors_pass_value_through() {
        assert_eq!(FieldErrors::new().into_result(5), Ok(5));
        let mut errs = FieldErrors::new();
        errs.add("x", "bad");
        assert!(errs.into_result(5).is_err());
    }
}
