//! Redis-backed session store for multi-instance deployments.
//!
//! Sessions are JSON values with a TTL, so expiry is native. `update` goes
//! through a compare-and-swap script keyed on the session's `version`
//! counter: a stale writer gets a `Conflict` instead of silently clobbering
//! a newer write.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::info;

use crate::error::StoreError;
use crate::persona::Archetype;
use crate::session::{Session, SessionStore};

const KEY_PREFIX: &str = "honeypot:session:";

/// Compare-and-swap: write ARGV[1] only if the stored session's version
/// still equals ARGV[2] (or the key is gone).
const CAS_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if current then
  local decoded = cjson.decode(current)
  if tonumber(decoded.version) ~= tonumber(ARGV[2]) then
    return 0
  end
end
redis.call('SET', KEYS[1], ARGV[1], 'PX', ARGV[3])
return 1
"#;

/// Session store backed by a shared Redis instance.
pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
    cas: redis::Script,
    timeout: Duration,
    default_archetype: Archetype,
}

impl RedisStore {
    /// Connect to Redis at `url`.
    pub async fn connect(
        url: &str,
        timeout: Duration,
        default_archetype: Archetype,
    ) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(url).map_err(|e| StoreError::Connection(e.to_string()))?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        info!("Connected to Redis session store");
        Ok(Self {
            conn,
            cas: redis::Script::new(CAS_SCRIPT),
            timeout,
            default_archetype,
        })
    }

    fn key(id: &str) -> String {
        format!("{KEY_PREFIX}{id}")
    }

    fn ttl_millis(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    fn encode(session: &Session) -> Result<String, StoreError> {
        serde_json::to_string(session).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode(raw: &str) -> Result<Session, StoreError> {
        serde_json::from_str(raw).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(Self::key(id))
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        match raw {
            Some(raw) => {
                let session = Self::decode(&raw)?;
                // TTL normally handles expiry; this covers clock drift
                // between writers.
                if session.is_expired(self.timeout) {
                    let _ = self.delete(id).await?;
                    Ok(None)
                } else {
                    Ok(Some(session))
                }
            }
            None => Ok(None),
        }
    }

    async fn get_or_create(&self, id: &str) -> Result<(Session, bool), StoreError> {
        if let Some(session) = self.get(id).await? {
            return Ok((session, false));
        }

        let session = Session::new(id, self.default_archetype);
        let mut conn = self.conn.clone();
        // SET NX answers OK or nil.
        let created: Option<String> = redis::cmd("SET")
            .arg(Self::key(id))
            .arg(Self::encode(&session)?)
            .arg("NX")
            .arg("PX")
            .arg(self.ttl_millis())
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        if created.is_some() {
            info!(session_id = id, "created new session");
            Ok((session, true))
        } else {
            // Another writer created it between our get and set.
            match self.get(id).await? {
                Some(existing) => Ok((existing, false)),
                None => Ok((session, true)),
            }
        }
    }

    async fn update(&self, mut session: Session) -> Result<(), StoreError> {
        let expected = session.version;
        session.version += 1;
        let key = Self::key(&session.id);
        let payload = Self::encode(&session)?;

        let mut conn = self.conn.clone();
        let swapped: i64 = self
            .cas
            .key(key)
            .arg(payload)
            .arg(expected)
            .arg(self.ttl_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        if swapped == 1 {
            Ok(())
        } else {
            Err(StoreError::Conflict(session.id))
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn
            .del(Self::key(id))
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(removed > 0)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn
            .keys(format!("{KEY_PREFIX}*"))
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(keys.len())
    }
}
