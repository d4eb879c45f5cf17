use crate::backend::{ChangesBackend, HorreumClient, LabelSetSource};
use crate::cli::CommandLineArgs;

use std::sync::Arc;
use std::time::Duration;

/// Shared application state passed to each request handler.
pub struct AppState {
    /// Source of the label sets of a test.
    pub label_sets: Arc<dyn LabelSetSource>,

    /// Change detection queries.
    pub changes: Arc<dyn ChangesBackend>,
}

impl AppState {
    /// Create and return an [AppState] backed by the Horreum server in the arguments.
    pub fn new(args: &CommandLineArgs) -> Self {
        let client = HorreumClient::new(
            args.horreum_url.clone(),
            Duration::from_secs(args.backend_timeout),
        )
        .expect("failed to create Horreum client");
        let client = Arc::new(client);
        Self::with_backends(client.clone(), client)
    }

    /// Create and return an [AppState] with the given backends.
    pub fn with_backends(
        label_sets: Arc<dyn LabelSetSource>,
        changes: Arc<dyn ChangesBackend>,
    ) -> Self {
        Self {
            label_sets,
            changes,
        }
    }
}

/// AppState wrapped in an Atomic Reference Count (Arc) to allow multiple references.
pub type SharedAppState = Arc<AppState>;
