//! Web application: routes and request handlers

use crate::alerts::{Alert, Alerts};
use crate::app_state::{AppState, SharedAppState};
use crate::backend::{AnnotationsQuery, LastDatapointsQuery, TimeseriesQuery};
use crate::chart;
use crate::cli::CommandLineArgs;
use crate::error::ExplorerError;
use crate::fingerprint::{parse_fingerprint, LabelSet};
use crate::labels;
use crate::metrics;
use crate::models;
use crate::validated_json::ValidatedJson;

use axum::{
    body::Body,
    extract::{Json, Path, Query, State},
    http::header,
    http::{HeaderMap, Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use tower_http::validate_request::ValidateRequestHeaderLayer;

/// The service served by [crate::server::serve]
pub type Service = NormalizePath<Router>;

/// Initialise the application
pub fn init(args: &CommandLineArgs) {
    tracing::info!(horreum_url = %args.horreum_url, "using Horreum backend");
}

/// Returns a [axum::Router] for the service API
///
/// # Arguments
///
/// * `state`: Backends shared by all request handlers
pub fn router(state: SharedAppState) -> Router {
    fn v1(state: SharedAppState) -> Router {
        Router::new()
            .route("/labels/resolve", post(resolve_labels))
            .route("/tests/:test_id/labels", get(test_labels))
            .route("/changes/chart", post(change_chart))
            .route("/changes/recent", post(recent_window))
            .layer(ValidateRequestHeaderLayer::custom(
                // Validate that an authorization header has been provided.
                |request: &mut Request<Body>| {
                    if request.headers().contains_key(header::AUTHORIZATION) {
                        Ok(())
                    } else {
                        Err(StatusCode::UNAUTHORIZED.into_response())
                    }
                },
            ))
            .with_state(state)
    }

    Router::new()
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/v1", v1(state))
        .layer(
            TraceLayer::new_for_http()
                .on_request(metrics::request_counter)
                .on_response(metrics::record_response_metrics),
        )
}

/// Returns a [Service] for the service API
///
/// The router is wrapped with a layer that trims trailing slashes from the request path.
///
/// # Arguments
///
/// * `args`: Command line arguments
pub fn service(args: &CommandLineArgs) -> Service {
    let state = Arc::new(AppState::new(args));
    NormalizePathLayer::trim_trailing_slash().layer(router(state))
}

/// Returns the `Authorization` header to forward to Horreum.
fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

/// Resolve a partial selection against the label sets in the request
async fn resolve_labels(
    ValidatedJson(request): ValidatedJson<models::ResolveRequest>,
) -> Json<models::LabelsResponse> {
    let resolution = labels::resolve(&request.label_sets, &request.selection, request.mode());
    metrics::record_resolution(resolution.selection.as_ref());
    Json(models::LabelsResponse {
        resolution,
        alerts: Alerts::default(),
    })
}

/// Resolve the selection in a shared URL against the label sets of a test
///
/// A malformed fingerprint never fails the request: the selection is left empty and an alert
/// is returned alongside the resolution.
#[tracing::instrument(level = "DEBUG", skip(state, headers))]
async fn test_labels(
    State(state): State<SharedAppState>,
    Path(test_id): Path<i32>,
    Query(query): Query<models::LabelsQuery>,
    headers: HeaderMap,
) -> Result<Json<models::LabelsResponse>, ExplorerError> {
    let label_sets = state
        .label_sets
        .label_sets(authorization(&headers), test_id)
        .await?;
    let mut alerts = Alerts::default();
    let selection = match query.fingerprint.as_deref().map(parse_fingerprint) {
        None => LabelSet::new(),
        Some(Ok(selection)) => selection.unwrap_or_default(),
        Some(Err(error)) => {
            tracing::warn!(%error, "ignoring malformed fingerprint");
            alerts.raise(Alert::from(&error));
            LabelSet::new()
        }
    };
    let mode = labels::FireMode::new(query.fire_on_partial);
    let resolution = labels::resolve(&label_sets, &selection, mode);
    metrics::record_resolution(resolution.selection.as_ref());
    Ok(Json(models::LabelsResponse { resolution, alerts }))
}

/// Fetch the series and changes of the variables and align them into chart rows
#[tracing::instrument(level = "DEBUG", skip(state, headers))]
async fn change_chart(
    State(state): State<SharedAppState>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<models::ChartRequest>,
) -> Result<Json<models::ChartResponse>, ExplorerError> {
    let auth = authorization(&headers);
    let window = request.window();
    let fingerprint = request.fingerprint.as_ref();

    let query = TimeseriesQuery::new(window, &request.variables, fingerprint);
    let series = state.changes.timeseries(auth, &query).await?;

    // Missing changes leave the series chartable, so they are reported as an alert.
    let mut alerts = Alerts::default();
    let mut markers = Vec::new();
    for variable_id in &request.variables {
        let query = AnnotationsQuery::new(window, *variable_id, fingerprint);
        match state.changes.annotations(auth, &query).await {
            Ok(found) => markers.extend(found),
            Err(error) => {
                tracing::warn!(variable_id, %error, "charting without change annotations");
                alerts.raise(Alert::from(&error));
            }
        }
    }

    let data = chart::align(&series, &markers);
    metrics::record_chart(&data);
    Ok(Json(models::ChartResponse {
        window,
        data,
        alerts,
    }))
}

/// Find the window of the same span ending just after the most recent datapoint
#[tracing::instrument(level = "DEBUG", skip(state, headers))]
async fn recent_window(
    State(state): State<SharedAppState>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<models::ChartRequest>,
) -> Result<Json<models::RecentResponse>, ExplorerError> {
    let query = LastDatapointsQuery::new(&request.variables, request.fingerprint.as_ref());
    let latest = state
        .changes
        .last_datapoints(authorization(&headers), &query)
        .await?;
    let window = latest
        .iter()
        .map(|datapoint| datapoint.timestamp)
        .max()
        .map(|timestamp| request.window().shift_to_latest(timestamp));
    Ok(Json(models::RecentResponse { window }))
}
