use metrics::counter;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::config::AppConfig;
use crate::error::{SwipeError, SwipeResult};
use crate::models::{EdgeState, Identity, NewIdentity};
use crate::services::match_detector::{self, Decision, Outcome, UnskipOutcome};
use crate::services::recommendation::{self, CandidatePool, RecommendationBatch};
use crate::store::{IdentityStore, InterestLedger, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwipeLimits {
    pub batch_size: usize,
    pub skipped_history: usize,
}

impl Default for SwipeLimits {
    fn default() -> Self {
        Self { batch_size: 10, skipped_history: 10 }
    }
}

impl From<&AppConfig> for SwipeLimits {
    fn from(config: &AppConfig) -> Self {
        Self {
            batch_size: config.recommendation_batch,
            skipped_history: config.skipped_history_limit,
        }
    }
}

/// Entry point for every swipe operation. Owns the store and the sampling RNG.
pub struct SwipeService<S: Store> {
    store: S,
    rng: Mutex<StdRng>,
    limits: SwipeLimits,
}

impl<S: Store> SwipeService<S> {
    pub fn new(store: S, limits: SwipeLimits) -> Self {
        Self::with_rng(store, limits, StdRng::from_entropy())
    }

    pub fn with_rng(store: S, limits: SwipeLimits, rng: StdRng) -> Self {
        Self { store, rng: Mutex::new(rng), limits }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // --- Identities ---

    pub fn register(&self, new: NewIdentity) -> SwipeResult<Identity> {
        let identity = self.store.with_conn(|conn| conn.create_identity(&new))?;
        tracing::info!(handle = %identity.handle, pid = identity.pid, "identity registered");
        Ok(identity)
    }

    pub fn find_by_handle(&self, handle: &str) -> SwipeResult<Option<Identity>> {
        self.store.with_conn(|conn| conn.find_by_handle(handle))
    }

    /// Unknown handles are ignored.
    pub fn set_visibility(&self, handle: &str, visible: bool) -> SwipeResult<()> {
        self.store.with_conn(|conn| conn.set_visibility(handle, visible))?;
        tracing::info!(handle = %handle, visible, "visibility updated");
        Ok(())
    }

    // --- Evaluations ---

    pub fn evaluate(&self, requester: &str, target: &str, decision: Decision) -> SwipeResult<Outcome> {
        let outcome = self.store.transition(requester, target, |conn| {
            require_identity(conn, requester)?;
            require_identity(conn, target)?;
            match_detector::evaluate(conn, requester, target, decision)
        })?;

        counter!("swipes_total", "outcome" => outcome.as_str()).increment(1);
        if outcome == Outcome::Matched {
            counter!("matches_total").increment(1);
        }
        tracing::info!(requester = %requester, target = %target, outcome = outcome.as_str(), "swipe evaluated");

        Ok(outcome)
    }

    pub fn unskip(&self, requester: &str, target: &str) -> SwipeResult<UnskipOutcome> {
        let outcome = self
            .store
            .transition(requester, target, |conn| match_detector::unskip(conn, requester, target))?;

        tracing::info!(requester = %requester, target = %target, outcome = ?outcome, "unskip");
        Ok(outcome)
    }

    // --- Reads ---

    pub fn recommend(&self, requester: &str) -> SwipeResult<RecommendationBatch> {
        let pool = self.candidates(requester)?;
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(pool.sample(&mut *rng))
    }

    /// Store reads for `recommend`; runs without the RNG lock.
    pub(crate) fn candidates(&self, requester: &str) -> SwipeResult<CandidatePool> {
        self.store.with_conn(|conn| {
            require_identity(conn, requester)?;
            recommendation::candidates(conn, requester, self.limits.batch_size)
        })
    }

    /// Everyone matched with `requester`, most recent first.
    pub fn list_matches(&self, requester: &str) -> SwipeResult<Vec<Identity>> {
        self.store.with_conn(|conn| {
            let mut edges = conn.list_by_source_state(requester, EdgeState::Matched)?;
            edges.extend(conn.list_by_target_state(requester, EdgeState::Matched)?);
            edges.sort_by(|a, b| b.matched_at.cmp(&a.matched_at).then(b.id.cmp(&a.id)));

            let handles: Vec<String> = edges
                .into_iter()
                .map(|e| if e.source == requester { e.target } else { e.source })
                .collect();
            load_in_order(conn, handles)
        })
    }

    /// The most recent skips of `requester`, capped at the skipped-history limit.
    pub fn list_skipped(&self, requester: &str) -> SwipeResult<Vec<Identity>> {
        let cap = self.limits.skipped_history;
        self.store.with_conn(|conn| {
            let handles: Vec<String> = conn
                .list_by_source_state(requester, EdgeState::Skipped)?
                .into_iter()
                .rev()
                .take(cap)
                .map(|e| e.target)
                .collect();
            load_in_order(conn, handles)
        })
    }

    pub fn ping(&self) -> SwipeResult<()> {
        self.store.ping()
    }
}

fn require_identity<C>(conn: &mut C, handle: &str) -> SwipeResult<Identity>
where
    C: IdentityStore + ?Sized,
{
    conn.find_by_handle(handle)?
        .ok_or_else(|| SwipeError::UnknownIdentity(handle.to_string()))
}

/// Batch-loads identities and returns them in the order of `handles`.
fn load_in_order<C>(conn: &mut C, handles: Vec<String>) -> SwipeResult<Vec<Identity>>
where
    C: IdentityStore + ?Sized,
{
    if handles.is_empty() {
        return Ok(vec![]);
    }

    let order: HashMap<&str, usize> = handles.iter().enumerate().map(|(i, h)| (h.as_str(), i)).collect();
    let mut identities = conn.find_by_handles(&handles)?;
    identities.sort_by_key(|i| order.get(i.handle.as_str()).copied().unwrap_or(usize::MAX));
    Ok(identities)
}
