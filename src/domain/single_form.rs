use crate::domain::csv::{FieldMap, REQUIRED_FIELDS};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub static DIGITS_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").unwrap());

/// The six identifiers of a single prediction, kept as typed text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SingleRecordForm {
    #[serde(default)]
    #[validate(regex(path = *DIGITS_ONLY))]
    pub cm_id: String,
    #[serde(default)]
    #[validate(regex(path = *DIGITS_ONLY))]
    pub pt_id: String,
    #[serde(default)]
    #[validate(regex(path = *DIGITS_ONLY))]
    pub mkt_id: String,
    #[serde(default)]
    #[validate(regex(path = *DIGITS_ONLY))]
    pub mp_year: String,
    #[serde(default)]
    #[validate(regex(path = *DIGITS_ONLY))]
    pub adm0_id: String,
    #[serde(default)]
    #[validate(regex(path = *DIGITS_ONLY))]
    pub adm1_id: String,
}

impl SingleRecordForm {
    fn slot(&mut self, name: &str) -> Option<&mut String> {
        match name {
            "cm_id" => Some(&mut self.cm_id),
            "pt_id" => Some(&mut self.pt_id),
            "mkt_id" => Some(&mut self.mkt_id),
            "mp_year" => Some(&mut self.mp_year),
            "adm0_id" => Some(&mut self.adm0_id),
            "adm1_id" => Some(&mut self.adm1_id),
            _ => None,
        }
    }

    /// Apply an edit. Only digits (or clearing the field) are accepted;
    /// anything else leaves the field unchanged and returns false.
    pub fn set_field(&mut self, name: &str, value: &str) -> bool {
        if !value.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        match self.slot(name) {
            Some(slot) => {
                *slot = value.to_string();
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Values in required-field order
    pub fn values(&self) -> [&str; 6] {
        [
            self.cm_id.as_str(),
            self.pt_id.as_str(),
            self.mkt_id.as_str(),
            self.mp_year.as_str(),
            self.adm0_id.as_str(),
            self.adm1_id.as_str(),
        ]
    }

    pub fn field_map(&self) -> FieldMap {
        REQUIRED_FIELDS
            .iter()
            .zip(self.values())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    /// All six fields non-empty and purely numeric.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
