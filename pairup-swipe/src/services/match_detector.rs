//! The swipe state machine for an ordered pair (source, target).
//!
//! A match is stored as a single `Matched` edge: the one the first accepter
//! created. The second accepter never gets a row of their own. Reciprocal
//! lookups therefore always key on (target, source).
//!
//! These functions assume the caller holds the pair lock (see
//! [`Store::transition`](crate::store::Store::transition)).

use serde::{Deserialize, Serialize};

use crate::error::{SwipeError, SwipeResult};
use crate::models::{EdgeState, InterestEdge};
use crate::store::{InterestLedger, Recorded};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Skip,
    Accept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Skipped,
    Sent,
    Matched,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Sent => "sent",
            Self::Matched => "matched",
        }
    }
}

impl From<EdgeState> for Outcome {
    fn from(state: EdgeState) -> Self {
        match state {
            EdgeState::Skipped => Self::Skipped,
            EdgeState::Sent => Self::Sent,
            EdgeState::Matched => Self::Matched,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnskipOutcome {
    Ok,
    NotFound,
}

/// Applies `source`'s decision about `target`.
///
/// Either direction being `Matched` rejects the call. A skip never clobbers a
/// `Sent` edge. Accepting someone previously skipped re-runs the reciprocal
/// check and reuses the skip edge.
pub fn evaluate<C>(conn: &mut C, source: &str, target: &str, decision: Decision) -> SwipeResult<Outcome>
where
    C: InterestLedger + ?Sized,
{
    if source == target {
        return Err(SwipeError::InvalidEdge);
    }

    let forward = conn.find_edge(source, target)?;
    let reverse = conn.find_edge(target, source)?;

    let is_matched = |e: &Option<InterestEdge>| matches!(e, Some(edge) if edge.state == EdgeState::Matched);
    if is_matched(&forward) || is_matched(&reverse) {
        return Err(SwipeError::AlreadyMatched);
    }

    match decision {
        Decision::Skip => match forward {
            Some(existing) => Ok(existing.state.into()),
            None => record(conn, source, target, EdgeState::Skipped),
        },
        Decision::Accept => {
            if let Some(existing) = &forward {
                if existing.state == EdgeState::Sent {
                    return Ok(Outcome::Sent);
                }
            }

            match reverse {
                Some(pending) if pending.state == EdgeState::Sent => {
                    conn.update_state(pending.id, EdgeState::Matched)?;
                    if let Some(stale) = forward {
                        conn.remove_edge(stale.id)?;
                    }
                    Ok(Outcome::Matched)
                }
                _ => match forward {
                    Some(skipped) => {
                        conn.update_state(skipped.id, EdgeState::Sent)?;
                        Ok(Outcome::Sent)
                    }
                    None => record(conn, source, target, EdgeState::Sent),
                },
            }
        }
    }
}

/// Deletes `source`'s skip of `target`. Any other edge, or none, is `NotFound`.
pub fn unskip<C>(conn: &mut C, source: &str, target: &str) -> SwipeResult<UnskipOutcome>
where
    C: InterestLedger + ?Sized,
{
    match conn.find_edge(source, target)? {
        Some(edge) if edge.state == EdgeState::Skipped => {
            conn.remove_edge(edge.id)?;
            Ok(UnskipOutcome::Ok)
        }
        _ => Ok(UnskipOutcome::NotFound),
    }
}

fn record<C>(conn: &mut C, source: &str, target: &str, state: EdgeState) -> SwipeResult<Outcome>
where
    C: InterestLedger + ?Sized,
{
    match conn.record_interest(source, target, state)? {
        Recorded::Inserted(edge) | Recorded::Existing(edge) => Ok(edge.state.into()),
    }
}
