//! User visible alerts.
//!
//! Alerts are keyed by a stable code. Raising an alert with a code that is already shown
//! replaces it, so repeated identical failures do not stack up.

use crate::error::ExplorerError;

use serde::Serialize;
use std::error::Error;

/// A dismissable alert.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub code: String,
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn new(
        code: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
            message: message.into(),
        }
    }
}

impl From<&ExplorerError> for Alert {
    fn from(error: &ExplorerError) -> Self {
        let title = match error {
            ExplorerError::BackendRequest { operation, .. }
            | ExplorerError::BackendStatus { operation, .. } => {
                format!("Failed to {}", operation.description())
            }
            ExplorerError::BackendUrl(_) => "Horreum backend is misconfigured".to_string(),
            ExplorerError::FingerprintParse(_) | ExplorerError::FingerprintNotObject { .. } => {
                "Cannot parse fingerprint".to_string()
            }
            ExplorerError::RequestDataJsonRejection(_)
            | ExplorerError::RequestDataValidationSingle(_)
            | ExplorerError::RequestDataValidation(_) => "Invalid request".to_string(),
        };
        let message = match error.source() {
            Some(source) => format!("{}: {}", error, source),
            None => error.to_string(),
        };
        Self::new(error.code(), title, message)
    }
}

/// Alerts currently shown, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Alerts(Vec<Alert>);

impl Alerts {
    /// Show an alert, replacing any alert with the same code in place.
    pub fn raise(&mut self, alert: Alert) {
        match self.0.iter_mut().find(|shown| shown.code == alert.code) {
            Some(shown) => *shown = alert,
            None => self.0.push(alert),
        }
    }

    /// Dismiss the alert with the code, if shown.
    pub fn dismiss(&mut self, code: &str) {
        self.0.retain(|shown| shown.code != code);
    }

    pub fn get(&self, code: &str) -> Option<&Alert> {
        self.0.iter().find(|shown| shown.code == code)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.0.iter()
    }
}
