//! This crate provides the label filtering and change chart logic of a
//! [Horreum](https://horreum.hyperfoil.io) performance test explorer, together with a small
//! service exposing it over HTTP.
//!
//! Horreum identifies a series of test results by a *fingerprint*: a JSON object of label
//! values. Users narrow the available label sets down by picking values key by key, and
//! selections travel in shared URLs as serialised fingerprints. Change detection results are
//! charted by aligning the timeseries of several variables on a common time axis and placing
//! detected changes on top.
//!
//! * [fingerprint] stringifies and parses fingerprints.
//! * [labels] resolves partial selections against label sets.
//! * [chart] aligns timeseries and positions change annotations.
//! * [sequence] and [suggest] keep asynchronous queries in order.
//! * [backend] talks to the Horreum REST API.
//!
//! The service is built on top of a number of open source components.
//!
//! * [Tokio](tokio), the most popular asynchronous Rust runtime.
//! * [Axum](axum) web framework, built by the Tokio team, on top of the [hyper] HTTP library.
//! * [Serde](serde) performs (de)serialisation of JSON request and response data.
//! * [reqwest] is used to query the Horreum API.

pub mod alerts;
pub mod app;
pub mod app_state;
pub mod backend;
pub mod chart;
pub mod cli;
pub mod error;
pub mod fingerprint;
pub mod labels;
pub mod metrics;
pub mod models;
pub mod sequence;
pub mod server;
pub mod suggest;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod validated_json;
