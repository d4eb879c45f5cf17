use crate::backend::{
    AnnotationsQuery, ChangesBackend, LabelSetSource, LastDatapoint, LastDatapointsQuery,
    TimeseriesQuery,
};
use crate::chart::{AnnotationMarker, Datapoint, TimeseriesTarget};
use crate::error::{BackendOperation, ExplorerError};
use crate::fingerprint::LabelSet;
use crate::models::*;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::{json, Value};
use std::sync::Mutex;

/// Returns a label set built from a JSON object literal.
pub(crate) fn labels(value: Value) -> LabelSet {
    match value {
        Value::Object(labels) => labels,
        other => panic!("not a label set: {}", other),
    }
}

/// Create a ResolveRequest object with all fields set.
pub(crate) fn get_test_resolve_request() -> ResolveRequest {
    ResolveRequest {
        label_sets: vec![
            labels(json!({"env": "prod", "arch": "x86"})),
            labels(json!({"env": "prod", "arch": "arm"})),
        ],
        selection: labels(json!({"env": "prod"})),
        fire_on_partial: true,
    }
}

/// Create a ChartRequest object with only required fields set.
pub(crate) fn get_test_chart_request() -> ChartRequest {
    ChartRequest {
        variables: vec![1, 2],
        fingerprint: None,
        from: 1000,
        to: 5000,
    }
}

pub(crate) fn target(variable_id: i32, datapoints: &[(f64, i64)]) -> TimeseriesTarget {
    TimeseriesTarget {
        target: format!("{};", variable_id),
        variable_id,
        datapoints: datapoints
            .iter()
            .map(|(value, timestamp)| Datapoint(*value, *timestamp))
            .collect(),
    }
}

pub(crate) fn marker(change_id: i32, variable_id: i32, time: i64) -> AnnotationMarker {
    AnnotationMarker {
        change_id,
        variable_id,
        run_id: 100 + change_id,
        dataset_ordinal: None,
        time,
        title: "Change".to_string(),
        text: format!("change {}", change_id),
    }
}

/// In-memory stand-in for Horreum.
///
/// A backend failure can be injected per operation. Received authorization headers and queries
/// are recorded.
#[derive(Default)]
pub(crate) struct FakeHorreum {
    pub label_sets: Vec<LabelSet>,
    pub series: Vec<TimeseriesTarget>,
    pub markers: Vec<AnnotationMarker>,
    pub latest: Vec<LastDatapoint>,
    pub failing: Option<BackendOperation>,
    pub auth: Mutex<Vec<Option<String>>>,
    pub timeseries_queries: Mutex<Vec<TimeseriesQuery>>,
    pub annotation_queries: Mutex<Vec<AnnotationsQuery>>,
}

impl FakeHorreum {
    fn call(&self, operation: BackendOperation, auth: Option<&str>) -> Result<(), ExplorerError> {
        self.auth.lock().unwrap().push(auth.map(str::to_string));
        if self.failing == Some(operation) {
            return Err(ExplorerError::BackendStatus {
                operation,
                status: StatusCode::SERVICE_UNAVAILABLE,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl LabelSetSource for FakeHorreum {
    async fn label_sets(
        &self,
        auth: Option<&str>,
        _test_id: i32,
    ) -> Result<Vec<LabelSet>, ExplorerError> {
        self.call(BackendOperation::FetchFingerprints, auth)?;
        Ok(self.label_sets.clone())
    }
}

#[async_trait]
impl ChangesBackend for FakeHorreum {
    async fn timeseries(
        &self,
        auth: Option<&str>,
        query: &TimeseriesQuery,
    ) -> Result<Vec<TimeseriesTarget>, ExplorerError> {
        self.call(BackendOperation::FetchTimeseries, auth)?;
        self.timeseries_queries.lock().unwrap().push(query.clone());
        Ok(self.series.clone())
    }

    async fn annotations(
        &self,
        auth: Option<&str>,
        query: &AnnotationsQuery,
    ) -> Result<Vec<AnnotationMarker>, ExplorerError> {
        self.call(BackendOperation::FetchAnnotations, auth)?;
        self.annotation_queries.lock().unwrap().push(query.clone());
        let variable_id = query
            .annotation
            .query
            .split(';')
            .next()
            .and_then(|id| id.parse::<i32>().ok());
        Ok(self
            .markers
            .iter()
            .filter(|marker| Some(marker.variable_id) == variable_id)
            .cloned()
            .collect())
    }

    async fn last_datapoints(
        &self,
        auth: Option<&str>,
        query: &LastDatapointsQuery,
    ) -> Result<Vec<LastDatapoint>, ExplorerError> {
        self.call(BackendOperation::FetchLastDatapoints, auth)?;
        Ok(self
            .latest
            .iter()
            .filter(|latest| query.variables.contains(&latest.variable))
            .copied()
            .collect())
    }
}
