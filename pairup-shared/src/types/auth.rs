use chrono::Utc;
use serde::{Deserialize, Serialize};

const DEV_JWT_SECRET: &str = "development-secret-change-in-production";

/// Secret used to verify bearer tokens issued by the session layer.
pub fn jwt_secret_from_env() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| DEV_JWT_SECRET.to_string())
}

/// Claims carried by the session token. `sub` is the verified handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(handle: impl Into<String>, duration_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: handle.into(),
            iat: now,
            exp: now + duration_secs,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// An authenticated participant, identified by handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub handle: String,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self { handle: claims.sub }
    }
}
