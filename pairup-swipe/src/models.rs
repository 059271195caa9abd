use chrono::{DateTime, Utc};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::SmallInt;
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::schema::{identities, interest_edges};

// --- Identity ---

#[derive(Debug, Queryable, Selectable, Serialize, Clone, PartialEq)]
#[diesel(table_name = identities)]
pub struct Identity {
    pub handle: String,
    pub pid: i64,
    pub contact_code: String,
    #[serde(skip_serializing)]
    pub credential_hash: String,
    pub visible: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = identities)]
pub struct NewIdentity {
    pub handle: String,
    pub pid: i64,
    pub contact_code: String,
    pub credential_hash: String,
}

// --- InterestEdge ---

/// Lifecycle of a directed evaluation. Stored as a SMALLINT; the value 2
/// (received-only) is implied by the inverse edge and never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "lowercase")]
pub enum EdgeState {
    Skipped,
    Sent,
    Matched,
}

impl EdgeState {
    pub const ALL: [EdgeState; 3] = [EdgeState::Skipped, EdgeState::Sent, EdgeState::Matched];

    pub fn code(self) -> i16 {
        match self {
            Self::Skipped => 0,
            Self::Sent => 1,
            Self::Matched => 3,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Skipped),
            1 => Some(Self::Sent),
            3 => Some(Self::Matched),
            _ => None,
        }
    }
}

impl ToSql<SmallInt, Pg> for EdgeState {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(&self.code().to_be_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<SmallInt, Pg> for EdgeState {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let code = <i16 as FromSql<SmallInt, Pg>>::from_sql(bytes)?;
        EdgeState::from_code(code).ok_or_else(|| format!("unknown interest edge state {code}").into())
    }
}

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Clone, PartialEq)]
#[diesel(table_name = interest_edges)]
pub struct InterestEdge {
    pub id: i64,
    pub source: String,
    pub target: String,
    pub state: EdgeState,
    pub created_at: DateTime<Utc>,
    pub matched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = interest_edges)]
pub struct NewInterestEdge<'a> {
    pub source: &'a str,
    pub target: &'a str,
    pub state: EdgeState,
}
