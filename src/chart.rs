//! Change chart alignment.
//!
//! Timeseries of change detection variables are merged into rows sorted by timestamp, and
//! detected changes are positioned on top of them.

use crate::fingerprint::fingerprint_to_string;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single `[value, timestamp]` sample.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Datapoint(pub f64, pub i64);

impl Datapoint {
    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn timestamp(&self) -> i64 {
        self.1
    }
}

/// Datapoints of one variable for one fingerprint.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeseriesTarget {
    /// Series name, `<variableId>;<fingerprint>`
    pub target: String,
    pub variable_id: i32,
    #[serde(default)]
    pub datapoints: Vec<Datapoint>,
}

/// A change detected by the backend.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationMarker {
    pub change_id: i32,
    pub variable_id: i32,
    pub run_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_ordinal: Option<i32>,
    pub time: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
}

/// Identifies the change behind a clickable annotation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRef {
    pub change_id: i32,
    pub variable_id: i32,
    pub run_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_ordinal: Option<i32>,
}

impl From<&AnnotationMarker> for ChangeRef {
    fn from(marker: &AnnotationMarker) -> Self {
        Self {
            change_id: marker.change_id,
            variable_id: marker.variable_id,
            run_id: marker.run_id,
            dataset_ordinal: marker.dataset_ordinal,
        }
    }
}

/// One chart row: a timestamp and the value of every series that reported at it.
///
/// Series without a sample at the timestamp are absent, not zero.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartRow {
    pub timestamp: i64,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

/// Where an annotation is drawn.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AnnotationPosition {
    /// On a datapoint of the series; clicking it opens the change.
    Point {
        time: i64,
        value: f64,
        target: String,
        title: String,
        text: String,
        change: ChangeRef,
    },
    /// A vertical line at the time, spanning the chart. Not clickable.
    Line {
        time: i64,
        title: String,
        text: String,
    },
}

/// What the chart shows.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChartData {
    /// Rows sorted by ascending timestamp, with positioned annotations.
    Series {
        rows: Vec<ChartRow>,
        annotations: Vec<AnnotationPosition>,
    },
    /// No series has any datapoint in the window. The user may ask for the most recent
    /// datapoints instead, see [TimeWindow::shift_to_latest].
    NoDatapoints,
}

/// A time range in milliseconds since the epoch.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub from: i64,
    pub to: i64,
}

impl TimeWindow {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    pub fn span(&self) -> i64 {
        self.to - self.from
    }

    /// Returns a window of the same span ending just after the latest datapoint.
    pub fn shift_to_latest(&self, latest: i64) -> Self {
        let to = latest.saturating_add(1);
        Self {
            from: to.saturating_sub(self.span()),
            to,
        }
    }
}

/// Name of the series of a variable for a fingerprint, as understood by the backend.
pub fn target_name(variable_id: i32, fingerprint: Option<&Value>) -> String {
    format!("{};{}", variable_id, fingerprint_to_string(fingerprint))
}

/// Merges the series into rows sorted by ascending timestamp.
pub fn align_series(series: &[TimeseriesTarget]) -> Vec<ChartRow> {
    let mut rows: BTreeMap<i64, ChartRow> = BTreeMap::new();
    for target in series {
        for datapoint in &target.datapoints {
            rows.entry(datapoint.timestamp())
                .or_insert_with(|| ChartRow {
                    timestamp: datapoint.timestamp(),
                    values: BTreeMap::new(),
                })
                .values
                .insert(target.target.clone(), datapoint.value());
        }
    }
    rows.into_values().collect()
}

/// Positions every annotation.
///
/// An annotation lands on a datapoint of its variable's series with exactly the same timestamp
/// when there is one, and becomes a vertical line otherwise.
pub fn position_annotations(
    series: &[TimeseriesTarget],
    annotations: &[AnnotationMarker],
) -> Vec<AnnotationPosition> {
    annotations
        .iter()
        .map(|marker| {
            let hit = series
                .iter()
                .filter(|target| target.variable_id == marker.variable_id)
                .find_map(|target| {
                    target
                        .datapoints
                        .iter()
                        .find(|datapoint| datapoint.timestamp() == marker.time)
                        .map(|datapoint| (target, datapoint))
                });
            match hit {
                Some((target, datapoint)) => AnnotationPosition::Point {
                    time: marker.time,
                    value: datapoint.value(),
                    target: target.target.clone(),
                    title: marker.title.clone(),
                    text: marker.text.clone(),
                    change: ChangeRef::from(marker),
                },
                None => AnnotationPosition::Line {
                    time: marker.time,
                    title: marker.title.clone(),
                    text: marker.text.clone(),
                },
            }
        })
        .collect()
}

/// Builds the chart from series and annotations.
pub fn align(series: &[TimeseriesTarget], annotations: &[AnnotationMarker]) -> ChartData {
    if series.iter().all(|target| target.datapoints.is_empty()) {
        return ChartData::NoDatapoints;
    }
    ChartData::Series {
        rows: align_series(series),
        annotations: position_annotations(series, annotations),
    }
}

/// Formats a value for axes and tooltips.
///
/// Values above ten million are shown in millions, values above ten thousand in thousands.
pub fn format_value(value: f64) -> String {
    if value > 10_000_000.0 {
        format!("{:.2} M", value / 1_000_000.0)
    } else if value > 10_000.0 {
        format!("{:.2} k", value / 1_000.0)
    } else {
        format!("{:.2}", value)
    }
}
