//! Single-record prediction: `Idle → Validating → Submitting → Result | Error`.

use super::schema_validator::SchemaValidator;
use crate::domain::error::{AppError, Result};
use crate::domain::prediction::PredictionRequest;
use crate::domain::single_form::SingleRecordForm;
use serde::Serialize;
use tracing::debug;
use validator::Validate;

pub const INVALID_FORM: &str = "Please enter numeric values for all fields.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SingleState {
    Idle,
    Validating,
    Submitting,
    Result,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SingleSession {
    /// Form being filled in, nothing submitted yet
    Idle {
        form: SingleRecordForm,
    },
    Validating {
        form: SingleRecordForm,
    },
    Submitting {
        form: SingleRecordForm,
        request: PredictionRequest,
    },
    Result {
        form: SingleRecordForm,
        prediction: f64,
    },
    Error {
        form: SingleRecordForm,
        error: AppError,
    },
}

impl Default for SingleSession {
    fn default() -> Self {
        SingleSession::Idle {
            form: SingleRecordForm::default(),
        }
    }
}

impl SingleSession {
    pub fn state(&self) -> SingleState {
        match self {
            SingleSession::Idle { .. } => SingleState::Idle,
            SingleSession::Validating { .. } => SingleState::Validating,
            SingleSession::Submitting { .. } => SingleState::Submitting,
            SingleSession::Result { .. } => SingleState::Result,
            SingleSession::Error { .. } => SingleState::Error,
        }
    }

    pub fn prediction(&self) -> Option<f64> {
        match self {
            SingleSession::Result { prediction, .. } => Some(*prediction),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&AppError> {
        match self {
            SingleSession::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.failure().map(AppError::user_message)
    }

    pub fn form(&self) -> &SingleRecordForm {
        match self {
            SingleSession::Idle { form }
            | SingleSession::Validating { form }
            | SingleSession::Submitting { form, .. }
            | SingleSession::Result { form, .. }
            | SingleSession::Error { form, .. } => form,
        }
    }

    fn form_mut(&mut self) -> &mut SingleRecordForm {
        match self {
            SingleSession::Idle { form }
            | SingleSession::Validating { form }
            | SingleSession::Submitting { form, .. }
            | SingleSession::Result { form, .. }
            | SingleSession::Error { form, .. } => form,
        }
    }

    /// Type into one field. Non-digit input is rejected and the field keeps
    /// its value; the shown result or error stays until the next submit.
    pub fn edit(mut self, name: &str, value: &str) -> (Self, Result<()>) {
        if matches!(self, SingleSession::Submitting { .. }) {
            return (
                self,
                Err(AppError::Busy("A prediction is already in progress.".to_string())),
            );
        }
        if self.form_mut().set_field(name, value) {
            (self, Ok(()))
        } else {
            (
                self,
                Err(AppError::ValidationError(format!(
                    "Field '{}' accepts digits only.",
                    name
                ))),
            )
        }
    }

    /// Take a new form in. Refused while a request is outstanding.
    pub fn begin(self, form: SingleRecordForm) -> (Self, Result<()>) {
        match self {
            session @ SingleSession::Submitting { .. } => (
                session,
                Err(AppError::Busy("A prediction is already in progress.".to_string())),
            ),
            _ => (SingleSession::Validating { form }, Ok(())),
        }
    }

    /// Check the form; only a valid one moves on to `Submitting`.
    pub fn validate(self) -> (Self, Result<PredictionRequest>) {
        let form = match self {
            SingleSession::Validating { form } => form,
            other => {
                return (
                    other,
                    Err(AppError::Internal("No form awaiting validation".to_string())),
                )
            }
        };

        if let Err(errors) = form.validate() {
            debug!(fields = ?errors.field_errors().keys().collect::<Vec<_>>(), "Form rejected");
            return Self::rejected(form);
        }

        match SchemaValidator::to_request(&form.field_map()) {
            Ok(request) => (SingleSession::Submitting { form, request }, Ok(request)),
            Err(violation) => {
                debug!(message = %violation.message, "Form values out of range");
                Self::rejected(form)
            }
        }
    }

    fn rejected(form: SingleRecordForm) -> (Self, Result<PredictionRequest>) {
        (
            SingleSession::Error {
                form,
                error: AppError::ValidationError(INVALID_FORM.to_string()),
            },
            Err(AppError::ValidationError(INVALID_FORM.to_string())),
        )
    }

    /// `begin` followed by `validate`
    pub fn submit(self, form: SingleRecordForm) -> (Self, Result<PredictionRequest>) {
        match self.begin(form) {
            (session, Ok(())) => session.validate(),
            (session, Err(err)) => (session, Err(err)),
        }
    }

    pub fn complete(self, outcome: Result<f64>) -> Self {
        match self {
            SingleSession::Submitting { form, .. } => match outcome {
                Ok(prediction) => SingleSession::Result { form, prediction },
                Err(error) => SingleSession::Error { form, error },
            },
            other => other,
        }
    }

    /// Clears the form, the result and the error.
    pub fn reset(self) -> Self {
        SingleSession::default()
    }

    pub fn view(&self) -> SingleSessionView {
        SingleSessionView {
            state: self.state(),
            prediction: self.prediction(),
            error: self.error().map(str::to_string),
            failure: self.failure().cloned(),
            form: self.form().clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleSessionView {
    pub state: SingleState,
    pub prediction: Option<f64>,
    pub error: Option<String>,
    /// Typed cause behind `error`
    #[serde(skip)]
    pub failure: Option<AppError>,
    pub form: SingleRecordForm,
}
