//! Required-field contract for prediction input.
//!
//! - Header sets must contain every required column (extra columns are fine,
//!   order does not matter)
//! - Records must carry every required key as a base-10 integer, digits only

use crate::domain::csv::{FieldMap, REQUIRED_FIELDS};
use crate::domain::error::AppError;
use crate::domain::prediction::PredictionRequest;
use crate::domain::single_form::DIGITS_ONLY;
use serde::Serialize;
use std::collections::HashSet;

/// Which required fields failed, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaViolation {
    pub missing: Vec<String>,
    pub invalid: Vec<String>,
    pub message: String,
}

impl From<SchemaViolation> for AppError {
    fn from(violation: SchemaViolation) -> Self {
        AppError::ValidationError(violation.message)
    }
}

#[derive(Debug, Clone)]
pub struct SchemaValidator {
    required: Vec<String>,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new(&REQUIRED_FIELDS)
    }
}

impl SchemaValidator {
    pub fn new(required: &[&str]) -> Self {
        Self {
            required: required.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Passes iff `headers` is a superset of the required columns.
    pub fn check_headers<S: AsRef<str>>(&self, headers: &[S]) -> Result<(), SchemaViolation> {
        let present: HashSet<&str> = headers.iter().map(|h| h.as_ref()).collect();
        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|name| !present.contains(name.as_str()))
            .cloned()
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        Err(SchemaViolation {
            missing,
            invalid: Vec::new(),
            message: format!("CSV must contain columns: {}", self.required.join(", ")),
        })
    }

    /// Passes iff every required key is present and holds a plain
    /// non-negative integer.
    pub fn check_record(&self, fields: &FieldMap) -> Result<(), SchemaViolation> {
        let mut missing = Vec::new();
        let mut invalid = Vec::new();

        for name in &self.required {
            match fields.get(name) {
                None => missing.push(name.clone()),
                Some(value) if !is_plain_integer(value) => invalid.push(name.clone()),
                Some(_) => {}
            }
        }

        if missing.is_empty() && invalid.is_empty() {
            return Ok(());
        }

        let mut parts = Vec::new();
        if !missing.is_empty() {
            parts.push(format!("Missing fields: {}", missing.join(", ")));
        }
        if !invalid.is_empty() {
            parts.push(format!("Non-numeric fields: {}", invalid.join(", ")));
        }

        Err(SchemaViolation {
            missing,
            invalid,
            message: parts.join("; "),
        })
    }

    /// Validate against the default six-field contract and build the
    /// request body.
    pub fn to_request(fields: &FieldMap) -> Result<PredictionRequest, SchemaViolation> {
        SchemaValidator::default().check_record(fields)?;

        let mut values = [0u64; 6];
        for (slot, name) in values.iter_mut().zip(REQUIRED_FIELDS) {
            // check_record guarantees presence and range
            *slot = fields
                .get(name)
                .and_then(|v| v.parse().ok())
                .unwrap_or_default();
        }
        Ok(PredictionRequest::from_values(values))
    }
}

/// Digits only, and small enough to travel as an integer.
fn is_plain_integer(value: &str) -> bool {
    DIGITS_ONLY.is_match(value) && value.parse::<u64>().is_ok()
}
