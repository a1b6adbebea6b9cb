use tracing::{debug, info, instrument, warn};

use crate::domain::Record;
use crate::source::{FetchError, FetchResult, RecordSource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Success(FetchResult),
    Error(String),
}

/// A page fetch the host has to run, tagged with the generation it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub generation: u64,
    pub page: usize,
}

/// Outcome of a [`FetchRequest`], sent back to the event loop.
#[derive(Debug)]
pub struct Completion {
    pub generation: u64,
    pub result: Result<FetchResult, FetchError>,
}

/// Load/error state machine. Every request starts a new generation and only
/// the completion of the latest generation is applied.
#[derive(Debug)]
pub struct FetchTracker {
    state: LoadState,
    generation: u64,
}

impl Default for FetchTracker {
    fn default() -> Self {
        Self {
            state: LoadState::Idle,
            generation: 0,
        }
    }
}

impl FetchTracker {
    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Records of the last successful fetch, empty in any other state.
    pub fn records(&self) -> &[Record] {
        match &self.state {
            LoadState::Success(result) => &result.records,
            _ => &[],
        }
    }

    pub fn begin(&mut self, page: usize) -> FetchRequest {
        self.generation += 1;
        self.state = LoadState::Loading;
        debug!("Fetch generation {} for page {page}", self.generation);
        FetchRequest {
            generation: self.generation,
            page,
        }
    }

    /// Applies a completion. Returns the new state, or `None` if the completion is stale.
    pub fn complete(&mut self, completion: Completion) -> Option<&LoadState> {
        if completion.generation != self.generation {
            warn!(
                "Discarding stale fetch generation {} (latest {})",
                completion.generation, self.generation
            );
            return None;
        }
        self.state = match completion.result {
            Ok(result) => {
                info!("Fetched {} records, more: {}", result.records.len(), result.has_more);
                LoadState::Success(result)
            }
            Err(err) => {
                warn!("Fetch failed: {err}");
                LoadState::Error(err.message)
            }
        };
        Some(&self.state)
    }
}

/// Runs `request` against `source`.
#[instrument(skip(source))]
pub async fn execute(source: &dyn RecordSource, request: FetchRequest) -> Completion {
    Completion {
        generation: request.generation,
        result: source.fetch_page(request.page).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: u64) -> FetchResult {
        FetchResult {
            records: vec![Record {
                id: n,
                name: format!("n{n}"),
                username: format!("u{n}"),
                email: format!("e{n}"),
            }],
            has_more: true,
        }
    }

    #[test]
    fn starts_idle() {
        let tracker = FetchTracker::default();
        assert_eq!(tracker.state(), &LoadState::Idle);
        assert!(tracker.records().is_empty());
    }

    #[test]
    fn success_and_error_transitions() {
        let mut tracker = FetchTracker::default();
        let request = tracker.begin(1);
        assert_eq!(tracker.state(), &LoadState::Loading);
        tracker.complete(Completion {
            generation: request.generation,
            result: Ok(page(1)),
        });
        assert_eq!(tracker.state(), &LoadState::Success(page(1)));
        assert_eq!(tracker.records().len(), 1);

        let request = tracker.begin(2);
        tracker.complete(Completion {
            generation: request.generation,
            result: Err(FetchError::new("boom")),
        });
        assert_eq!(tracker.state(), &LoadState::Error("boom".into()));
        assert!(tracker.records().is_empty());
    }

    #[test]
    fn stale_completion_is_discarded() {
        let mut tracker = FetchTracker::default();
        let first = tracker.begin(1);
        let second = tracker.begin(2);
        assert!(
            tracker
                .complete(Completion {
                    generation: first.generation,
                    result: Ok(page(1)),
                })
                .is_none()
        );
        assert_eq!(tracker.state(), &LoadState::Loading);

        tracker.complete(Completion {
            generation: second.generation,
            result: Ok(page(2)),
        });
        assert_eq!(tracker.state(), &LoadState::Success(page(2)));
    }
}
