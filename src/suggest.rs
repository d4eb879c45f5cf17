//! Debounced suggestions for free text search.
//!
//! Each input stream owns one [SuggestionQueue]. A new query replaces the one waiting for its
//! debounce delay. At most one fetch is in flight at a time; a query that becomes due while a
//! fetch is running waits in a single slot (the newest query wins) and is fetched as soon as the
//! running fetch completes. Results of superseded queries are never published.

use crate::alerts::Alert;
use crate::error::ExplorerError;
use crate::sequence::{RequestSequence, Ticket};

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

/// Source of suggestions for a query.
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    /// Returns suggestions for the query.
    async fn suggest(&self, query: &str) -> Result<Vec<String>, ExplorerError>;
}

/// Latest published outcome of a [SuggestionQueue].
#[derive(Clone, Debug, Default, PartialEq)]
pub enum SuggestionState {
    /// Nothing fetched yet
    #[default]
    Idle,
    /// Suggestions for the latest query
    Ready { query: String, suggestions: Vec<String> },
    /// Fetching suggestions for the latest query failed
    Failed { query: String, alert: Alert },
}

#[derive(Debug, Default)]
struct QueueState {
    in_flight: bool,
    pending: Option<(Ticket, String)>,
}

/// Clears the in-flight flag when the fetch loop ends, including when the submitting future is
/// dropped mid-fetch.
struct InFlight<'a> {
    state: &'a Mutex<QueueState>,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = lock(self.state);
            state.in_flight = false;
            // Queued behind a cancelled fetch, so nobody is left to fetch it.
            state.pending = None;
        }
    }
}

fn lock(state: &Mutex<QueueState>) -> MutexGuard<'_, QueueState> {
    // The state is plain data, a panic elsewhere cannot leave it inconsistent.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Debouncing, serialising suggestion fetcher for one input stream.
pub struct SuggestionQueue<S> {
    source: S,
    delay: Duration,
    sequence: RequestSequence,
    state: Mutex<QueueState>,
    published: watch::Sender<SuggestionState>,
}

impl<S: SuggestionSource> SuggestionQueue<S> {
    pub fn new(source: S, delay: Duration) -> Self {
        let (published, _) = watch::channel(SuggestionState::Idle);
        Self {
            source,
            delay,
            sequence: RequestSequence::new(),
            state: Mutex::new(QueueState::default()),
            published,
        }
    }

    /// Receiver of published suggestion states.
    pub fn subscribe(&self) -> watch::Receiver<SuggestionState> {
        self.published.subscribe()
    }

    /// The most recently published state.
    pub fn latest(&self) -> SuggestionState {
        self.published.borrow().clone()
    }

    /// Is a fetch running?
    pub fn is_loading(&self) -> bool {
        lock(&self.state).in_flight
    }

    /// Submit the current text of the input.
    ///
    /// Returns once the query was superseded, queued behind a running fetch, or fetched along
    /// with any queries queued behind it meanwhile.
    pub async fn submit(&self, query: impl Into<String>) {
        let query = query.into();
        let ticket = self.sequence.issue();
        tokio::time::sleep(self.delay).await;
        if !self.sequence.is_current(ticket) {
            return;
        }
        {
            let mut state = lock(&self.state);
            if state.in_flight {
                state.pending = Some((ticket, query));
                return;
            }
            state.in_flight = true;
        }
        let mut in_flight = InFlight {
            state: &self.state,
            armed: true,
        };

        let mut next = Some((ticket, query));
        while let Some((ticket, query)) = next.take() {
            let result = self.source.suggest(&query).await;
            let outcome = match result {
                Ok(suggestions) => SuggestionState::Ready { query, suggestions },
                Err(error) => {
                    tracing::warn!(%query, %error, "failed to fetch suggestions");
                    SuggestionState::Failed {
                        query,
                        alert: Alert::from(&error),
                    }
                }
            };
            if let Some(outcome) = self.sequence.accept(ticket, outcome) {
                self.published.send_replace(outcome);
            }
            // Taking the pending query and clearing the flag happen under one lock, so a query
            // queued meanwhile is never dropped.
            let mut state = lock(&self.state);
            next = state.pending.take();
            if next.is_none() {
                state.in_flight = false;
                in_flight.armed = false;
            }
        }
    }
}
