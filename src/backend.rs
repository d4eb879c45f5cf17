//! Horreum backend.
//!
//! The traits in this module are the seams between the service and the Horreum REST API.
//! [HorreumClient] implements them over HTTP.

use crate::chart::{target_name, AnnotationMarker, TimeWindow, TimeseriesTarget};
use crate::error::{BackendOperation, ExplorerError};
use crate::fingerprint::{fingerprint_to_string, LabelSet};
use crate::suggest::SuggestionSource;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Query range of timeseries and annotation queries.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    pub from: i64,
    pub to: i64,
    /// Include the closest datapoint on either side of the range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_before_and_after: Option<bool>,
}

/// A series requested by a timeseries query.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Target {
    pub target: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Body of `POST /api/changes/query`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimeseriesQuery {
    pub range: Range,
    pub targets: Vec<Target>,
}

impl TimeseriesQuery {
    /// Query the series of each variable for the fingerprint.
    pub fn new(window: TimeWindow, variables: &[i32], fingerprint: Option<&Value>) -> Self {
        Self {
            range: Range {
                from: window.from,
                to: window.to,
                one_before_and_after: Some(true),
            },
            targets: variables
                .iter()
                .map(|variable_id| Target {
                    target: target_name(*variable_id, fingerprint),
                    kind: "timeseries",
                })
                .collect(),
        }
    }
}

/// Annotation selector of an annotations query.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnnotationQuery {
    pub query: String,
}

/// Body of `POST /api/changes/annotations`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnnotationsQuery {
    pub range: Range,
    pub annotation: AnnotationQuery,
}

impl AnnotationsQuery {
    /// Query the changes of one variable for the fingerprint.
    pub fn new(window: TimeWindow, variable_id: i32, fingerprint: Option<&Value>) -> Self {
        Self {
            range: Range {
                from: window.from,
                to: window.to,
                one_before_and_after: None,
            },
            annotation: AnnotationQuery {
                query: target_name(variable_id, fingerprint),
            },
        }
    }
}

/// Body of `POST /api/changes/lastDatapoints`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LastDatapointsQuery {
    pub variables: Vec<i32>,
    pub fingerprint: String,
}

impl LastDatapointsQuery {
    pub fn new(variables: &[i32], fingerprint: Option<&Value>) -> Self {
        Self {
            variables: variables.to_vec(),
            fingerprint: fingerprint_to_string(fingerprint),
        }
    }
}

/// Timestamp of the most recent datapoint of a variable.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct LastDatapoint {
    pub variable: i32,
    pub timestamp: i64,
}

/// Supplies the label sets available for a test.
#[async_trait]
pub trait LabelSetSource: Send + Sync {
    /// Returns the label sets of the test.
    ///
    /// # Arguments
    ///
    /// * `auth`: Optional `Authorization` header value to forward
    /// * `test_id`: Test whose label sets are requested
    async fn label_sets(
        &self,
        auth: Option<&str>,
        test_id: i32,
    ) -> Result<Vec<LabelSet>, ExplorerError>;
}

/// Change detection queries.
#[async_trait]
pub trait ChangesBackend: Send + Sync {
    /// Returns the series requested by the query.
    async fn timeseries(
        &self,
        auth: Option<&str>,
        query: &TimeseriesQuery,
    ) -> Result<Vec<TimeseriesTarget>, ExplorerError>;

    /// Returns the changes detected in the query range.
    async fn annotations(
        &self,
        auth: Option<&str>,
        query: &AnnotationsQuery,
    ) -> Result<Vec<AnnotationMarker>, ExplorerError>;

    /// Returns the timestamps of the most recent datapoints of the variables.
    async fn last_datapoints(
        &self,
        auth: Option<&str>,
        query: &LastDatapointsQuery,
    ) -> Result<Vec<LastDatapoint>, ExplorerError>;
}

/// HTTP client of the Horreum REST API.
#[derive(Clone, Debug)]
pub struct HorreumClient {
    reqwest_client: reqwest::Client,
    base_url: Url,
}

impl HorreumClient {
    /// Create a new Horreum client.
    ///
    /// # Arguments
    ///
    /// * `base_url`: URL at which the Horreum API is served (without the `/api` suffix)
    /// * `timeout`: Timeout of each request
    pub fn new(mut base_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        // Url::join replaces the last path segment unless the path ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let reqwest_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            reqwest_client,
            base_url,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ExplorerError> {
        Ok(self.base_url.join(path)?)
    }

    /// Send a request and decode its JSON response.
    async fn send<T: DeserializeOwned>(
        &self,
        operation: BackendOperation,
        request: reqwest::RequestBuilder,
        auth: Option<&str>,
    ) -> Result<T, ExplorerError> {
        let request = match auth {
            Some(auth) => request.header(AUTHORIZATION, auth),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|source| ExplorerError::BackendRequest { operation, source })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExplorerError::BackendStatus { operation, status });
        }
        response
            .json::<T>()
            .await
            .map_err(|source| ExplorerError::BackendRequest { operation, source })
    }

    /// Returns suggested run search queries.
    #[tracing::instrument(level = "DEBUG", skip(self, auth))]
    pub async fn autocomplete(
        &self,
        auth: Option<&str>,
        query: &str,
    ) -> Result<Vec<String>, ExplorerError> {
        let request = self
            .reqwest_client
            .get(self.url("api/run/autocomplete")?)
            .query(&[("query", query)]);
        self.send(BackendOperation::FetchSuggestions, request, auth)
            .await
    }
}

#[async_trait]
impl LabelSetSource for HorreumClient {
    #[tracing::instrument(level = "DEBUG", skip(self, auth))]
    async fn label_sets(
        &self,
        auth: Option<&str>,
        test_id: i32,
    ) -> Result<Vec<LabelSet>, ExplorerError> {
        let request = self
            .reqwest_client
            .get(self.url(&format!("api/test/{}/fingerprint", test_id))?);
        let fingerprints: Vec<Value> = self
            .send(BackendOperation::FetchFingerprints, request, auth)
            .await?;
        // Datasets without any fingerprint label come back as null; they have no labels.
        Ok(fingerprints
            .into_iter()
            .filter_map(|fingerprint| match fingerprint {
                Value::Object(labels) => Some(labels),
                Value::Null => Some(LabelSet::new()),
                other => {
                    tracing::debug!(?other, "ignoring fingerprint that is not an object");
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl ChangesBackend for HorreumClient {
    #[tracing::instrument(level = "DEBUG", skip(self, auth))]
    async fn timeseries(
        &self,
        auth: Option<&str>,
        query: &TimeseriesQuery,
    ) -> Result<Vec<TimeseriesTarget>, ExplorerError> {
        let request = self
            .reqwest_client
            .post(self.url("api/changes/query")?)
            .json(query);
        self.send(BackendOperation::FetchTimeseries, request, auth)
            .await
    }

    #[tracing::instrument(level = "DEBUG", skip(self, auth))]
    async fn annotations(
        &self,
        auth: Option<&str>,
        query: &AnnotationsQuery,
    ) -> Result<Vec<AnnotationMarker>, ExplorerError> {
        let request = self
            .reqwest_client
            .post(self.url("api/changes/annotations")?)
            .json(query);
        self.send(BackendOperation::FetchAnnotations, request, auth)
            .await
    }

    #[tracing::instrument(level = "DEBUG", skip(self, auth))]
    async fn last_datapoints(
        &self,
        auth: Option<&str>,
        query: &LastDatapointsQuery,
    ) -> Result<Vec<LastDatapoint>, ExplorerError> {
        let request = self
            .reqwest_client
            .post(self.url("api/changes/lastDatapoints")?)
            .json(query);
        self.send(BackendOperation::FetchLastDatapoints, request, auth)
            .await
    }
}

/// Suggestions for one user's run search box, fetched with that user's credentials.
#[derive(Clone, Debug)]
pub struct RunSearch {
    client: HorreumClient,
    auth: Option<String>,
}

impl RunSearch {
    pub fn new(client: HorreumClient, auth: Option<String>) -> Self {
        Self { client, auth }
    }
}

#[async_trait]
impl SuggestionSource for RunSearch {
    async fn suggest(&self, query: &str) -> Result<Vec<String>, ExplorerError> {
        self.client.autocomplete(self.auth.as_deref(), query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::suggest::{SuggestionQueue, SuggestionState};

    use axum::{
        extract::{Json, Path, Query},
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Router,
    };
    use serde_json::json;
    use std::collections::HashMap;
    use std::net::SocketAddr;

    // Serve a stand-in for the Horreum API on an ephemeral port.
    async fn serve(router: Router) -> Url {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let server = axum::Server::bind(&addr).serve(router.into_make_service());
        let url = Url::parse(&format!("http://{}/horreum", server.local_addr())).unwrap();
        tokio::spawn(server);
        url
    }

    fn client(url: Url) -> HorreumClient {
        HorreumClient::new(url, Duration::from_secs(5)).unwrap()
    }

    async fn fingerprints(
        Path(test_id): Path<i32>,
        headers: HeaderMap,
    ) -> (StatusCode, Json<Value>) {
        if headers.get("authorization").map(|h| h.as_bytes()) != Some(b"Bearer token") {
            return (StatusCode::FORBIDDEN, Json(json!([])));
        }
        if test_id != 7 {
            return (StatusCode::NOT_FOUND, Json(json!([])));
        }
        (
            StatusCode::OK,
            Json(json!([{"env": "prod", "arch": "x86"}, null, {"env": "stage"}, 42])),
        )
    }

    async fn query(Json(body): Json<Value>) -> Json<Value> {
        assert_eq!(
            json!({
                "range": {"from": 1, "to": 10, "oneBeforeAndAfter": true},
                "targets": [
                    {"target": "3;{\"env\":\"prod\"}", "type": "timeseries"},
                    {"target": "4;{\"env\":\"prod\"}", "type": "timeseries"}
                ]
            }),
            body
        );
        Json(json!([
            {"target": "3;{\"env\":\"prod\"}", "variableId": 3, "datapoints": [[1.5, 2], [2.5, 4]]},
            {"target": "4;{\"env\":\"prod\"}", "variableId": 4, "datapoints": []}
        ]))
    }

    async fn annotations(Json(body): Json<Value>) -> Json<Value> {
        assert_eq!(
            json!({"range": {"from": 1, "to": 10}, "annotation": {"query": "3;"}}),
            body
        );
        Json(json!([{
            "title": "Change", "text": "", "time": 4, "changeId": 1, "variableId": 3, "runId": 2
        }]))
    }

    async fn last_datapoints(Json(body): Json<Value>) -> Json<Value> {
        assert_eq!(json!({"variables": [3, 4], "fingerprint": ""}), body);
        Json(json!([{"variable": 3, "timestamp": 100}, {"variable": 4, "timestamp": 200}]))
    }

    async fn autocomplete(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        let query = params.get("query").cloned().unwrap_or_default();
        Json(json!([format!("{}.foo", query), format!("{}.bar", query)]))
    }

    fn horreum() -> Router {
        Router::new()
            .route("/horreum/api/test/:test_id/fingerprint", get(fingerprints))
            .route("/horreum/api/changes/query", post(query))
            .route("/horreum/api/changes/annotations", post(annotations))
            .route("/horreum/api/changes/lastDatapoints", post(last_datapoints))
            .route("/horreum/api/run/autocomplete", get(autocomplete))
    }

    #[test]
    fn timeseries_query_body() {
        let query = TimeseriesQuery::new(TimeWindow::new(1, 10), &[3], None);
        assert_eq!(
            json!({
                "range": {"from": 1, "to": 10, "oneBeforeAndAfter": true},
                "targets": [{"target": "3;", "type": "timeseries"}]
            }),
            serde_json::to_value(&query).unwrap()
        );
    }

    #[test]
    fn annotations_query_body() {
        let fingerprint = json!({"env": "prod"});
        let query = AnnotationsQuery::new(TimeWindow::new(1, 10), 3, Some(&fingerprint));
        assert_eq!(
            json!({
                "range": {"from": 1, "to": 10},
                "annotation": {"query": "3;{\"env\":\"prod\"}"}
            }),
            serde_json::to_value(&query).unwrap()
        );
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = client(Url::parse("http://horreum.example.com/prefix").unwrap());
        assert_eq!(
            "http://horreum.example.com/prefix/api/changes/query",
            client.url("api/changes/query").unwrap().as_str()
        );
    }

    #[tokio::test]
    async fn label_sets_forward_auth_and_skip_non_objects() {
        let client = client(serve(horreum()).await);
        let label_sets = client.label_sets(Some("Bearer token"), 7).await.unwrap();
        assert_eq!(3, label_sets.len());
        assert_eq!(Some(&json!("prod")), label_sets[0].get("env"));
        assert!(label_sets[1].is_empty());
    }

    #[tokio::test]
    async fn label_sets_status_errors() {
        let client = client(serve(horreum()).await);
        let error = client.label_sets(None, 7).await.unwrap_err();
        match error {
            ExplorerError::BackendStatus { operation, status } => {
                assert_eq!(BackendOperation::FetchFingerprints, operation);
                assert_eq!(StatusCode::FORBIDDEN, status);
            }
            other => panic!("unexpected error {:?}", other),
        }
        let error = client.label_sets(Some("Bearer token"), 8).await.unwrap_err();
        assert_eq!("FETCH_FINGERPRINTS", error.code());
    }

    #[tokio::test]
    async fn timeseries_and_annotations() {
        let client = client(serve(horreum()).await);
        let fingerprint = json!({"env": "prod"});
        let window = TimeWindow::new(1, 10);
        let series = client
            .timeseries(None, &TimeseriesQuery::new(window, &[3, 4], Some(&fingerprint)))
            .await
            .unwrap();
        assert_eq!(2, series.len());
        assert_eq!(2, series[0].datapoints.len());
        let markers = client
            .annotations(None, &AnnotationsQuery::new(window, 3, None))
            .await
            .unwrap();
        assert_eq!(1, markers.len());
        assert_eq!(4, markers[0].time);
    }

    #[tokio::test]
    async fn last_datapoints_query() {
        let client = client(serve(horreum()).await);
        let latest = client
            .last_datapoints(None, &LastDatapointsQuery::new(&[3, 4], None))
            .await
            .unwrap();
        assert_eq!(
            vec![
                LastDatapoint { variable: 3, timestamp: 100 },
                LastDatapoint { variable: 4, timestamp: 200 }
            ],
            latest
        );
    }

    #[tokio::test]
    async fn unreachable_backend() {
        // Nothing listens on the discard port.
        let client = client(Url::parse("http://127.0.0.1:9").unwrap());
        let query = TimeseriesQuery::new(TimeWindow::new(0, 1), &[1], None);
        let error = client.timeseries(None, &query).await.unwrap_err();
        assert!(matches!(
            error,
            ExplorerError::BackendRequest {
                operation: BackendOperation::FetchTimeseries,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn run_search_suggestions() {
        let client = client(serve(horreum()).await);
        let queue = SuggestionQueue::new(RunSearch::new(client, None), Duration::from_millis(1));
        queue.submit("$.info").await;
        assert_eq!(
            SuggestionState::Ready {
                query: "$.info".to_string(),
                suggestions: vec!["$.info.foo".to_string(), "$.info.bar".to_string()],
            },
            queue.latest()
        );
    }
}
