use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::Text;

use pairup_shared::clients::db::{create_pool, DbPool};

use super::{pair_lock_key, IdentityStore, InterestLedger, Recorded, Store};
use crate::error::{duplicate_or_store, SwipeError, SwipeResult};
use crate::models::{EdgeState, Identity, InterestEdge, NewIdentity, NewInterestEdge};
use crate::schema::{identities, interest_edges};

/// Postgres-backed store. Pair uniqueness is the `interest_edges_pair`
/// constraint; transitions additionally take a transaction-scoped advisory
/// lock on the unordered pair.
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn connect(database_url: &str, pool_size: u32) -> SwipeResult<Self> {
        let pool = create_pool(database_url, pool_size)?;
        Ok(Self { pool })
    }
}

impl Store for PgStore {
    type Conn = PgConnection;

    fn with_conn<T, F>(&self, f: F) -> SwipeResult<T>
    where
        F: FnOnce(&mut PgConnection) -> SwipeResult<T>,
    {
        let mut pooled = self.pool.get()?;
        f(&mut *pooled)
    }

    fn transition<T, F>(&self, a: &str, b: &str, f: F) -> SwipeResult<T>
    where
        F: FnOnce(&mut PgConnection) -> SwipeResult<T>,
    {
        let mut pooled = self.pool.get()?;
        let conn: &mut PgConnection = &mut pooled;
        let key = pair_lock_key(a, b);
        conn.transaction::<T, SwipeError, _>(|conn| {
            diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1))")
                .bind::<Text, _>(&key)
                .execute(conn)?;
            f(conn)
        })
    }

    fn ping(&self) -> SwipeResult<()> {
        let mut conn = self.pool.get()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }
}

impl IdentityStore for PgConnection {
    fn create_identity(&mut self, new: &NewIdentity) -> SwipeResult<Identity> {
        diesel::insert_into(identities::table)
            .values(new)
            .get_result::<Identity>(self)
            .map_err(|e| duplicate_or_store(e, &new.handle))
    }

    fn find_by_handle(&mut self, handle: &str) -> SwipeResult<Option<Identity>> {
        Ok(identities::table
            .find(handle)
            .first::<Identity>(self)
            .optional()?)
    }

    fn find_by_handles(&mut self, handles: &[String]) -> SwipeResult<Vec<Identity>> {
        Ok(identities::table
            .filter(identities::handle.eq_any(handles))
            .load::<Identity>(self)?)
    }

    fn set_visibility(&mut self, handle: &str, visible: bool) -> SwipeResult<()> {
        diesel::update(identities::table.find(handle))
            .set(identities::visible.eq(visible))
            .execute(self)?;
        Ok(())
    }

    fn list_visible(&mut self) -> SwipeResult<Vec<Identity>> {
        Ok(identities::table
            .filter(identities::visible.eq(true))
            .order(identities::pid.asc())
            .load::<Identity>(self)?)
    }
}

impl InterestLedger for PgConnection {
    fn record_interest(&mut self, source: &str, target: &str, state: EdgeState) -> SwipeResult<Recorded> {
        if source == target {
            return Err(SwipeError::InvalidEdge);
        }

        let inserted = diesel::insert_into(interest_edges::table)
            .values(&NewInterestEdge { source, target, state })
            .on_conflict((interest_edges::source, interest_edges::target))
            .do_nothing()
            .get_result::<InterestEdge>(self)
            .optional()?;

        match inserted {
            Some(edge) => Ok(Recorded::Inserted(edge)),
            None => self
                .find_edge(source, target)?
                .map(Recorded::Existing)
                .ok_or_else(|| SwipeError::StoreUnavailable("conflicting edge vanished".into())),
        }
    }

    fn update_state(&mut self, edge_id: i64, state: EdgeState) -> SwipeResult<()> {
        let matched_at = (state == EdgeState::Matched).then(Utc::now);
        diesel::update(interest_edges::table.find(edge_id))
            .set((interest_edges::state.eq(state), interest_edges::matched_at.eq(matched_at)))
            .execute(self)?;
        Ok(())
    }

    fn find_edge(&mut self, source: &str, target: &str) -> SwipeResult<Option<InterestEdge>> {
        Ok(interest_edges::table
            .filter(interest_edges::source.eq(source))
            .filter(interest_edges::target.eq(target))
            .first::<InterestEdge>(self)
            .optional()?)
    }

    fn remove_edge(&mut self, edge_id: i64) -> SwipeResult<()> {
        diesel::delete(interest_edges::table.find(edge_id)).execute(self)?;
        Ok(())
    }

    fn list_by_source_state(&mut self, source: &str, state: EdgeState) -> SwipeResult<Vec<InterestEdge>> {
        Ok(interest_edges::table
            .filter(interest_edges::source.eq(source))
            .filter(interest_edges::state.eq(state))
            .order(interest_edges::id.asc())
            .load::<InterestEdge>(self)?)
    }

    fn list_by_target_state(&mut self, target: &str, state: EdgeState) -> SwipeResult<Vec<InterestEdge>> {
        Ok(interest_edges::table
            .filter(interest_edges::target.eq(target))
            .filter(interest_edges::state.eq(state))
            .order(interest_edges::id.asc())
            .load::<InterestEdge>(self)?)
    }
}
