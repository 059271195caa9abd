//! Persistence for identities and interest edges.
//!
//! Two backends implement the same traits: [`PgStore`] (diesel over an r2d2
//! pool) and [`MemoryStore`] (a mutex-guarded map used by tests and local runs).

mod memory;
mod postgres;

pub use memory::{MemoryState, MemoryStore};
pub use postgres::PgStore;

use crate::error::SwipeResult;
use crate::models::{EdgeState, Identity, InterestEdge, NewIdentity};

pub trait IdentityStore {
    /// Fails with `DuplicateIdentity` if the handle is taken.
    fn create_identity(&mut self, new: &NewIdentity) -> SwipeResult<Identity>;

    fn find_by_handle(&mut self, handle: &str) -> SwipeResult<Option<Identity>>;

    /// Unordered; callers sort.
    fn find_by_handles(&mut self, handles: &[String]) -> SwipeResult<Vec<Identity>>;

    /// No-op for an unknown handle.
    fn set_visibility(&mut self, handle: &str, visible: bool) -> SwipeResult<()>;

    fn list_visible(&mut self) -> SwipeResult<Vec<Identity>>;
}

/// Result of `record_interest`.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Inserted(InterestEdge),
    /// An edge already existed for the pair and was left as is.
    Existing(InterestEdge),
}

impl Recorded {
    pub fn edge(&self) -> &InterestEdge {
        match self {
            Self::Inserted(edge) | Self::Existing(edge) => edge,
        }
    }
}

pub trait InterestLedger {
    /// Inserts (source, target, state) unless an edge exists for the pair.
    fn record_interest(&mut self, source: &str, target: &str, state: EdgeState) -> SwipeResult<Recorded>;

    /// Moving to `Matched` stamps `matched_at`.
    fn update_state(&mut self, edge_id: i64, state: EdgeState) -> SwipeResult<()>;

    fn find_edge(&mut self, source: &str, target: &str) -> SwipeResult<Option<InterestEdge>>;

    fn remove_edge(&mut self, edge_id: i64) -> SwipeResult<()>;

    /// Insertion order.
    fn list_by_source_state(&mut self, source: &str, state: EdgeState) -> SwipeResult<Vec<InterestEdge>>;

    /// Insertion order.
    fn list_by_target_state(&mut self, target: &str, state: EdgeState) -> SwipeResult<Vec<InterestEdge>>;
}

/// A backend handing out connections that speak both store traits.
pub trait Store: Send + Sync + 'static {
    type Conn: IdentityStore + InterestLedger;

    /// Runs `f` on a connection, outside any transaction.
    fn with_conn<T, F>(&self, f: F) -> SwipeResult<T>
    where
        F: FnOnce(&mut Self::Conn) -> SwipeResult<T>;

    /// Runs `f` as one all-or-nothing transition, holding the lock for the
    /// unordered pair {a, b} until it commits or rolls back.
    fn transition<T, F>(&self, a: &str, b: &str, f: F) -> SwipeResult<T>
    where
        F: FnOnce(&mut Self::Conn) -> SwipeResult<T>;

    /// Cheap liveness probe for health checks.
    fn ping(&self) -> SwipeResult<()>;
}

/// Key shared by (a, b) and (b, a).
pub(crate) fn pair_lock_key(a: &str, b: &str) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("interest:{lo}:{hi}")
}
