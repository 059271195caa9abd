use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::{IdentityStore, InterestLedger, Recorded, Store};
use crate::error::{SwipeError, SwipeResult};
use crate::models::{EdgeState, Identity, InterestEdge, NewIdentity};

/// Inverse of one write, replayed newest first on rollback.
#[derive(Debug)]
enum Undo {
    CreatedIdentity(String),
    Visibility(String, bool),
    /// Previous version of the edge; `None` if it did not exist.
    Edge(i64, Option<InterestEdge>),
}

/// In-process state. Edges are keyed by surrogate id, so iteration is
/// insertion order.
#[derive(Debug, Default)]
pub struct MemoryState {
    identities: BTreeMap<String, Identity>,
    edges: BTreeMap<i64, InterestEdge>,
    pairs: HashMap<(String, String), i64>,
    next_edge_id: i64,
    last_matched_at: Option<DateTime<Utc>>,
    /// Present only while a transition is running.
    journal: Option<Vec<Undo>>,
}

impl MemoryState {
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn begin(&mut self) {
        self.journal = Some(Vec::new());
    }

    fn commit(&mut self) {
        self.journal = None;
    }

    fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for undo in journal.into_iter().rev() {
            match undo {
                Undo::CreatedIdentity(handle) => {
                    self.identities.remove(&handle);
                }
                Undo::Visibility(handle, visible) => {
                    if let Some(identity) = self.identities.get_mut(&handle) {
                        identity.visible = visible;
                    }
                }
                Undo::Edge(id, previous) => {
                    if let Some(current) = self.edges.remove(&id) {
                        self.pairs.remove(&(current.source, current.target));
                    }
                    if let Some(edge) = previous {
                        self.pairs.insert((edge.source.clone(), edge.target.clone()), edge.id);
                        self.edges.insert(edge.id, edge);
                    }
                }
            }
        }
    }

    fn record(&mut self, undo: Undo) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(undo);
        }
    }

    /// Strictly increasing, so match order survives a coarse clock.
    fn match_stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_matched_at {
            Some(last) if now <= last => last + Duration::nanoseconds(1),
            _ => now,
        };
        self.last_matched_at = Some(stamp);
        stamp
    }

    fn edges_where<P>(&self, pred: P) -> Vec<InterestEdge>
    where
        P: Fn(&InterestEdge) -> bool,
    {
        self.edges.values().filter(|e| pred(e)).cloned().collect()
    }
}

impl IdentityStore for MemoryState {
    fn create_identity(&mut self, new: &NewIdentity) -> SwipeResult<Identity> {
        if self.identities.contains_key(&new.handle) {
            return Err(SwipeError::DuplicateIdentity(new.handle.clone()));
        }
        let identity = Identity {
            handle: new.handle.clone(),
            pid: new.pid,
            contact_code: new.contact_code.clone(),
            credential_hash: new.credential_hash.clone(),
            visible: true,
            created_at: Utc::now(),
        };
        self.identities.insert(identity.handle.clone(), identity.clone());
        self.record(Undo::CreatedIdentity(identity.handle.clone()));
        Ok(identity)
    }

    fn find_by_handle(&mut self, handle: &str) -> SwipeResult<Option<Identity>> {
        Ok(self.identities.get(handle).cloned())
    }

    fn find_by_handles(&mut self, handles: &[String]) -> SwipeResult<Vec<Identity>> {
        Ok(handles
            .iter()
            .filter_map(|h| self.identities.get(h).cloned())
            .collect())
    }

    fn set_visibility(&mut self, handle: &str, visible: bool) -> SwipeResult<()> {
        if let Some(identity) = self.identities.get_mut(handle) {
            let previous = std::mem::replace(&mut identity.visible, visible);
            self.record(Undo::Visibility(handle.to_string(), previous));
        }
        Ok(())
    }

    fn list_visible(&mut self) -> SwipeResult<Vec<Identity>> {
        Ok(self.identities.values().filter(|i| i.visible).cloned().collect())
    }
}

impl InterestLedger for MemoryState {
    fn record_interest(&mut self, source: &str, target: &str, state: EdgeState) -> SwipeResult<Recorded> {
        if source == target {
            return Err(SwipeError::InvalidEdge);
        }

        let key = (source.to_string(), target.to_string());
        if let Some(edge) = self.pairs.get(&key).and_then(|id| self.edges.get(id)) {
            return Ok(Recorded::Existing(edge.clone()));
        }

        self.next_edge_id += 1;
        let edge = InterestEdge {
            id: self.next_edge_id,
            source: key.0.clone(),
            target: key.1.clone(),
            state,
            created_at: Utc::now(),
            matched_at: None,
        };
        self.pairs.insert(key, edge.id);
        self.edges.insert(edge.id, edge.clone());
        self.record(Undo::Edge(edge.id, None));
        Ok(Recorded::Inserted(edge))
    }

    fn update_state(&mut self, edge_id: i64, state: EdgeState) -> SwipeResult<()> {
        let matched_at = (state == EdgeState::Matched).then(|| self.match_stamp());
        if let Some(edge) = self.edges.get_mut(&edge_id) {
            let previous = edge.clone();
            edge.state = state;
            edge.matched_at = matched_at;
            self.record(Undo::Edge(edge_id, Some(previous)));
        }
        Ok(())
    }

    fn find_edge(&mut self, source: &str, target: &str) -> SwipeResult<Option<InterestEdge>> {
        let key = (source.to_string(), target.to_string());
        Ok(self.pairs.get(&key).and_then(|id| self.edges.get(id)).cloned())
    }

    fn remove_edge(&mut self, edge_id: i64) -> SwipeResult<()> {
        if let Some(edge) = self.edges.remove(&edge_id) {
            self.pairs.remove(&(edge.source.clone(), edge.target.clone()));
            self.record(Undo::Edge(edge_id, Some(edge)));
        }
        Ok(())
    }

    fn list_by_source_state(&mut self, source: &str, state: EdgeState) -> SwipeResult<Vec<InterestEdge>> {
        Ok(self.edges_where(|e| e.source == source && e.state == state))
    }

    fn list_by_target_state(&mut self, target: &str, state: EdgeState) -> SwipeResult<Vec<InterestEdge>> {
        Ok(self.edges_where(|e| e.target == target && e.state == state))
    }
}

/// Single-mutex store. Every transition runs under the lock against the live
/// state; the writes it journaled are undone if it fails.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> SwipeResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| SwipeError::StoreUnavailable("memory store lock poisoned".into()))
    }
}

impl Store for MemoryStore {
    type Conn = MemoryState;

    fn with_conn<T, F>(&self, f: F) -> SwipeResult<T>
    where
        F: FnOnce(&mut MemoryState) -> SwipeResult<T>,
    {
        let mut guard = self.lock()?;
        f(&mut *guard)
    }

    fn transition<T, F>(&self, _a: &str, _b: &str, f: F) -> SwipeResult<T>
    where
        F: FnOnce(&mut MemoryState) -> SwipeResult<T>,
    {
        let mut guard = self.lock()?;
        guard.begin();
        let result = f(&mut *guard);
        match result {
            Ok(_) => guard.commit(),
            Err(_) => guard.rollback(),
        }
        result
    }

    fn ping(&self) -> SwipeResult<()> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_identity(handle: &str) -> NewIdentity {
        NewIdentity {
            handle: handle.into(),
            pid: 1,
            contact_code: String::new(),
            credential_hash: "0".repeat(64),
        }
    }

    #[test]
    fn duplicate_handle_is_rejected() {
        let mut state = MemoryState::default();
        state.create_identity(&new_identity("alice")).unwrap();
        let err = state.create_identity(&new_identity("alice")).unwrap_err();
        assert!(matches!(err, SwipeError::DuplicateIdentity(h) if h == "alice"));
    }

    #[test]
    fn record_interest_never_overwrites() {
        let mut state = MemoryState::default();
        let first = state.record_interest("alice", "bob", EdgeState::Sent).unwrap();
        let second = state.record_interest("alice", "bob", EdgeState::Skipped).unwrap();

        assert!(matches!(first, Recorded::Inserted(_)));
        assert!(matches!(&second, Recorded::Existing(e) if e.state == EdgeState::Sent));
        assert_eq!(first.edge().id, second.edge().id);
        assert_eq!(state.edge_count(), 1);
    }

    #[test]
    fn self_edge_is_invalid() {
        let mut state = MemoryState::default();
        let err = state.record_interest("alice", "alice", EdgeState::Sent).unwrap_err();
        assert!(matches!(err, SwipeError::InvalidEdge));
    }

    #[test]
    fn lists_follow_insertion_order() {
        let mut state = MemoryState::default();
        for target in ["carol", "bob", "dave"] {
            state.record_interest("alice", target, EdgeState::Skipped).unwrap();
        }
        state.record_interest("alice", "erin", EdgeState::Sent).unwrap();

        let skipped: Vec<String> = state
            .list_by_source_state("alice", EdgeState::Skipped)
            .unwrap()
            .into_iter()
            .map(|e| e.target)
            .collect();
        assert_eq!(skipped, vec!["carol", "bob", "dave"]);
        assert_eq!(state.list_by_target_state("erin", EdgeState::Sent).unwrap().len(), 1);
    }

    #[test]
    fn removed_pair_can_be_recorded_again() {
        let mut state = MemoryState::default();
        let edge = state.record_interest("alice", "bob", EdgeState::Skipped).unwrap().edge().clone();
        state.remove_edge(edge.id).unwrap();
        assert_eq!(state.find_edge("alice", "bob").unwrap(), None);

        let again = state.record_interest("alice", "bob", EdgeState::Sent).unwrap();
        assert!(matches!(again, Recorded::Inserted(e) if e.id != edge.id));
    }

    #[test]
    fn failed_transition_leaves_no_partial_edge() {
        let store = MemoryStore::new();
        let result: SwipeResult<()> = store.transition("alice", "bob", |conn| {
            conn.record_interest("alice", "bob", EdgeState::Sent)?;
            Err(SwipeError::AlreadyMatched)
        });
        assert!(result.is_err());

        let edge = store.with_conn(|conn| conn.find_edge("alice", "bob")).unwrap();
        assert_eq!(edge, None);
    }

    #[test]
    fn failed_transition_restores_every_touched_edge() {
        let store = MemoryStore::new();
        let (sent, skipped) = store
            .with_conn(|conn| {
                conn.create_identity(&new_identity("alice"))?;
                let sent = conn.record_interest("bob", "alice", EdgeState::Sent)?.edge().clone();
                let skipped = conn.record_interest("alice", "bob", EdgeState::Skipped)?.edge().clone();
                Ok((sent, skipped))
            })
            .unwrap();

        let result: SwipeResult<()> = store.transition("alice", "bob", |conn| {
            conn.update_state(sent.id, EdgeState::Matched)?;
            conn.remove_edge(skipped.id)?;
            conn.record_interest("alice", "carol", EdgeState::Sent)?;
            conn.create_identity(&new_identity("carol"))?;
            conn.set_visibility("alice", false)?;
            Err(SwipeError::StoreUnavailable("boom".into()))
        });
        assert!(result.is_err());

        store
            .with_conn(|conn| {
                assert_eq!(conn.find_edge("bob", "alice")?, Some(sent.clone()));
                assert_eq!(conn.find_edge("alice", "bob")?, Some(skipped.clone()));
                assert_eq!(conn.find_edge("alice", "carol")?, None);
                assert_eq!(conn.find_by_handle("carol")?, None);
                assert!(conn.find_by_handle("alice")?.map(|i| i.visible).unwrap_or(false));
                assert_eq!(conn.edge_count(), 2);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn committed_transition_survives_a_later_failure() {
        let store = MemoryStore::new();
        store
            .transition("alice", "bob", |conn| conn.record_interest("alice", "bob", EdgeState::Sent).map(|_| ()))
            .unwrap();
        let _ = store.transition("alice", "carol", |_| -> SwipeResult<()> { Err(SwipeError::InvalidEdge) });

        let edge = store.with_conn(|conn| conn.find_edge("alice", "bob")).unwrap();
        assert_eq!(edge.map(|e| e.state), Some(EdgeState::Sent));
    }

    #[test]
    fn matching_stamps_strictly_increase() {
        let mut state = MemoryState::default();
        let mut ids = Vec::new();
        for target in ["bob", "carol", "dave"] {
            ids.push(state.record_interest(target, "alice", EdgeState::Sent).unwrap().edge().id);
        }
        for id in ids.iter().rev() {
            state.update_state(*id, EdgeState::Matched).unwrap();
        }

        let stamps: Vec<_> = ids.iter().map(|id| state.edges[id].matched_at.unwrap()).collect();
        assert!(stamps[2] < stamps[1] && stamps[1] < stamps[0]);
    }
}
