//! Request and response data of the service API

use crate::alerts::Alerts;
use crate::chart::{ChartData, TimeWindow};
use crate::fingerprint::LabelSet;
use crate::labels::{FireMode, Resolution};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

/// Request data for `POST /v1/labels/resolve`
#[derive(Debug, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResolveRequest {
    /// Label sets to choose from
    pub label_sets: Vec<LabelSet>,
    /// Partial selection, empty when nothing is selected
    #[serde(default)]
    pub selection: LabelSet,
    /// Report partial selections too
    #[serde(default)]
    pub fire_on_partial: bool,
}

impl ResolveRequest {
    pub fn mode(&self) -> FireMode {
        FireMode::new(self.fire_on_partial)
    }
}

/// Query parameters of `GET /v1/tests/{id}/labels`
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelsQuery {
    /// Selection serialised as a fingerprint, as found in a shared URL
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub fire_on_partial: bool,
}

/// Response of both label routes
#[derive(Debug, PartialEq, Serialize)]
pub struct LabelsResponse {
    #[serde(flatten)]
    pub resolution: Resolution,
    pub alerts: Alerts,
}

/// Request data for `POST /v1/changes/chart` and `POST /v1/changes/recent`
#[derive(Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_chart_request"))]
pub struct ChartRequest {
    /// Change detection variables to chart
    #[validate(length(min = 1, message = "variables must not be empty"))]
    pub variables: Vec<i32>,
    /// Fingerprint of the selected label set, if any
    #[serde(default)]
    pub fingerprint: Option<Value>,
    /// Start of the time window in milliseconds since the epoch
    pub from: i64,
    /// End of the time window in milliseconds since the epoch
    pub to: i64,
}

impl ChartRequest {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.from, self.to)
    }
}

/// Validate chart request data
fn validate_chart_request(request: &ChartRequest) -> Result<(), ValidationError> {
    if request.from >= request.to {
        let mut error = ValidationError::new("from must be less than to");
        error.add_param("from".into(), &request.from);
        error.add_param("to".into(), &request.to);
        return Err(error);
    }
    match &request.fingerprint {
        None | Some(Value::Object(_)) => Ok(()),
        Some(_) => Err(ValidationError::new(
            "fingerprint must be an object or null",
        )),
    }
}

/// Response of `POST /v1/changes/chart`
#[derive(Debug, PartialEq, Serialize)]
pub struct ChartResponse {
    pub window: TimeWindow,
    #[serde(flatten)]
    pub data: ChartData,
    /// Failures that left the chart incomplete
    pub alerts: Alerts,
}

/// Response of `POST /v1/changes/recent`
#[derive(Debug, PartialEq, Serialize)]
pub struct RecentResponse {
    /// Window ending just after the most recent datapoint, absent when no variable has any
    pub window: Option<TimeWindow>,
}
