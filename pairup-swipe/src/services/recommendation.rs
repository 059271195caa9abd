//! Picks the next batch of identities to show a requester.
//!
//! Pending suitors (identities with a `Sent` edge towards the requester) come
//! first, in the order they sent. The remainder is a uniform sample over every
//! visible identity the requester has not judged and that has not skipped or
//! matched the requester.

use rand::seq::index;
use rand::Rng;
use std::collections::{HashMap, HashSet};

use crate::error::SwipeResult;
use crate::models::{EdgeState, Identity};
use crate::store::{IdentityStore, InterestLedger};

/// Candidates in selection order.
#[derive(Debug, Clone, Default)]
pub struct RecommendationBatch {
    pub candidates: Vec<Identity>,
    /// How many leading candidates came from the reciprocal-interest pool.
    pub reciprocal: usize,
}

impl RecommendationBatch {
    /// Card-stack order: the last selected candidate first.
    pub fn presentation_order(self) -> Vec<Identity> {
        let mut cards = self.candidates;
        cards.reverse();
        cards
    }

    pub fn handles(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.handle.as_str()).collect()
    }
}

/// Everything eligible for `requester`, gathered without touching the RNG.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    /// Pending suitors, in send order, already capped at `limit`.
    suitors: Vec<Identity>,
    /// Eligible identities not among the suitors.
    fill: Vec<Identity>,
    limit: usize,
}

impl CandidatePool {
    pub fn len(&self) -> usize {
        self.suitors.len() + self.fill.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Suitors first, then a uniform sample of the fill pool up to `limit`.
    pub fn sample<R: Rng + ?Sized>(self, rng: &mut R) -> RecommendationBatch {
        let Self { mut suitors, fill, limit } = self;
        let reciprocal = suitors.len();

        let amount = limit.saturating_sub(reciprocal).min(fill.len());
        let picked = index::sample(rng, fill.len(), amount);
        suitors.extend(picked.into_iter().map(|i| fill[i].clone()));

        RecommendationBatch { candidates: suitors, reciprocal }
    }
}

pub fn candidates<C>(conn: &mut C, requester: &str, limit: usize) -> SwipeResult<CandidatePool>
where
    C: IdentityStore + InterestLedger + ?Sized,
{
    let mut judged: HashSet<String> = HashSet::new();
    for state in EdgeState::ALL {
        judged.extend(conn.list_by_source_state(requester, state)?.into_iter().map(|e| e.target));
    }

    let mut closed: HashSet<String> = HashSet::new();
    for state in [EdgeState::Skipped, EdgeState::Matched] {
        closed.extend(conn.list_by_target_state(requester, state)?.into_iter().map(|e| e.source));
    }

    let visible = conn.list_visible()?;
    let by_handle: HashMap<&str, &Identity> = visible.iter().map(|i| (i.handle.as_str(), i)).collect();

    let mut suitors: Vec<Identity> = Vec::with_capacity(limit);
    let mut seen: HashSet<&str> = HashSet::new();

    for edge in conn.list_by_target_state(requester, EdgeState::Sent)? {
        if suitors.len() == limit {
            break;
        }
        if judged.contains(&edge.source) {
            continue;
        }
        if let Some(identity) = by_handle.get(edge.source.as_str()) {
            if seen.insert(identity.handle.as_str()) {
                suitors.push((*identity).clone());
            }
        }
    }

    let fill: Vec<Identity> = visible
        .iter()
        .filter(|y| {
            y.handle != requester
                && !judged.contains(&y.handle)
                && !closed.contains(&y.handle)
                && !seen.contains(y.handle.as_str())
        })
        .cloned()
        .collect();

    Ok(CandidatePool { suitors, fill, limit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewIdentity;
    use crate::services::match_detector::{evaluate, Decision};
    use crate::store::MemoryState;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seeded(handles: &[&str]) -> MemoryState {
        let mut conn = MemoryState::default();
        for (pid, handle) in handles.iter().enumerate() {
            conn.create_identity(&NewIdentity {
                handle: handle.to_string(),
                pid: pid as i64,
                contact_code: String::new(),
                credential_hash: "0".repeat(64),
            })
            .unwrap();
        }
        conn
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn select(conn: &mut MemoryState, requester: &str, limit: usize, rng: &mut StdRng) -> SwipeResult<RecommendationBatch> {
        Ok(candidates(conn, requester, limit)?.sample(rng))
    }

    #[test]
    fn never_offers_requester_or_hidden_identities() {
        let mut conn = seeded(&["alice", "bob", "carol", "dave"]);
        conn.set_visibility("carol", false).unwrap();

        let batch = select(&mut conn, "alice", 10, &mut rng()).unwrap();
        let mut handles = batch.handles();
        handles.sort();
        assert_eq!(handles, vec!["bob", "dave"]);
    }

    #[test]
    fn hidden_suitor_is_not_offered() {
        let mut conn = seeded(&["alice", "bob"]);
        evaluate(&mut conn, "bob", "alice", Decision::Accept).unwrap();
        conn.set_visibility("bob", false).unwrap();

        let batch = select(&mut conn, "alice", 10, &mut rng()).unwrap();
        assert!(batch.candidates.is_empty());
    }

    #[test]
    fn suitors_come_first_in_send_order() {
        let handles: Vec<String> = (0..20).map(|i| format!("user{i:02}")).collect();
        let mut all: Vec<&str> = handles.iter().map(String::as_str).collect();
        all.push("alice");
        let mut conn = seeded(&all);

        evaluate(&mut conn, "user13", "alice", Decision::Accept).unwrap();
        evaluate(&mut conn, "user04", "alice", Decision::Accept).unwrap();

        let batch = select(&mut conn, "alice", 10, &mut rng()).unwrap();
        assert_eq!(batch.reciprocal, 2);
        assert_eq!(batch.handles()[..2], ["user13", "user04"]);
        assert_eq!(batch.candidates.len(), 10);

        let distinct: HashSet<&str> = batch.handles().into_iter().collect();
        assert_eq!(distinct.len(), 10);
    }

    #[test]
    fn judged_identities_are_excluded() {
        let mut conn = seeded(&["alice", "bob", "carol", "dave", "erin"]);
        evaluate(&mut conn, "alice", "bob", Decision::Skip).unwrap();
        evaluate(&mut conn, "alice", "carol", Decision::Accept).unwrap();
        // dave sent to alice but alice already skipped him
        evaluate(&mut conn, "dave", "alice", Decision::Accept).unwrap();
        evaluate(&mut conn, "alice", "dave", Decision::Skip).unwrap();

        let batch = select(&mut conn, "alice", 10, &mut rng()).unwrap();
        assert_eq!(batch.handles(), vec!["erin"]);
        assert_eq!(batch.reciprocal, 0);
    }

    #[test]
    fn rejecters_and_matches_are_excluded() {
        let mut conn = seeded(&["alice", "bob", "carol", "dave"]);
        evaluate(&mut conn, "bob", "alice", Decision::Skip).unwrap();
        evaluate(&mut conn, "carol", "alice", Decision::Accept).unwrap();
        evaluate(&mut conn, "alice", "carol", Decision::Accept).unwrap();

        let batch = select(&mut conn, "alice", 10, &mut rng()).unwrap();
        assert_eq!(batch.handles(), vec!["dave"]);
    }

    #[test]
    fn batch_is_capped() {
        let handles: Vec<String> = (0..30).map(|i| format!("user{i:02}")).collect();
        let mut all: Vec<&str> = handles.iter().map(String::as_str).collect();
        all.push("alice");
        let mut conn = seeded(&all);
        for h in &handles[..15] {
            evaluate(&mut conn, h, "alice", Decision::Accept).unwrap();
        }

        let batch = select(&mut conn, "alice", 10, &mut rng()).unwrap();
        assert_eq!(batch.candidates.len(), 10);
        assert_eq!(batch.reciprocal, 10);
        assert_eq!(batch.handles()[0], "user00");
    }

    #[test]
    fn same_seed_same_sample() {
        let handles: Vec<String> = (0..50).map(|i| format!("user{i:02}")).collect();
        let all: Vec<&str> = handles.iter().map(String::as_str).collect();
        let mut conn = seeded(&all);

        let a = select(&mut conn, "user00", 10, &mut StdRng::seed_from_u64(99)).unwrap();
        let b = select(&mut conn, "user00", 10, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(a.handles(), b.handles());
    }

    #[test]
    fn pool_is_gathered_once_and_sampled_later() {
        let handles: Vec<String> = (0..12).map(|i| format!("user{i:02}")).collect();
        let mut all: Vec<&str> = handles.iter().map(String::as_str).collect();
        all.push("alice");
        let mut conn = seeded(&all);
        evaluate(&mut conn, "user03", "alice", Decision::Accept).unwrap();

        let pool = candidates(&mut conn, "alice", 5).unwrap();
        assert_eq!(pool.len(), 12);

        // the store may change after gathering without affecting the sample
        evaluate(&mut conn, "alice", "user05", Decision::Skip).unwrap();
        let batch = pool.sample(&mut rng());
        assert_eq!(batch.candidates.len(), 5);
        assert_eq!(batch.handles()[0], "user03");
        assert_eq!(batch.reciprocal, 1);
    }

    #[test]
    fn empty_pool_samples_nothing() {
        let mut conn = seeded(&["alice"]);
        let pool = candidates(&mut conn, "alice", 10).unwrap();
        assert!(pool.is_empty());
        assert!(pool.sample(&mut rng()).candidates.is_empty());
    }

    #[test]
    fn presentation_reverses_selection() {
        let mut conn = seeded(&["alice", "bob", "carol"]);
        evaluate(&mut conn, "bob", "alice", Decision::Accept).unwrap();

        let batch = select(&mut conn, "alice", 10, &mut rng()).unwrap();
        assert_eq!(batch.handles(), vec!["bob", "carol"]);
        let cards: Vec<String> = batch.presentation_order().into_iter().map(|c| c.handle).collect();
        assert_eq!(cards, vec!["carol", "bob"]);
    }
}
