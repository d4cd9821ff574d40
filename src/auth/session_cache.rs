use crate::auth::service::SessionData;
use crate::error::AppError;

use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Messages handled by the session cache actor.
#[derive(Debug)]
pub enum SessionCacheMessage {
    /// Look up a cached session by bearer token. None on miss or stale entry.
    Get(String, RpcReplyPort<Option<SessionData>>),
    /// Cache a freshly resolved session under its token.
    Put(String, SessionData),
    /// Drop a single token (sign-out, expiry observed at the DB).
    Invalidate(String),
    /// Internal: drop entries past the freshness TTL.
    Sweep,
}

/// Handle for interacting with the session cache actor.
#[derive(Clone)]
pub struct SessionCacheHandle {
    actor: ActorRef<SessionCacheMessage>,
}

impl SessionCacheHandle {
    pub async fn get(&self, token: impl AsRef<str>) -> Result<Option<SessionData>, AppError> {
        ractor::call!(
            self.actor,
            SessionCacheMessage::Get,
            token.as_ref().to_string()
        )
        .map_err(|e| AppError::SessionCache(format!("Get RPC failed: {e}")))
    }

    pub async fn put(&self, token: impl Into<String>, data: SessionData) {
        let _ = ractor::cast!(self.actor, SessionCacheMessage::Put(token.into(), data));
    }

    pub async fn invalidate(&self, token: impl Into<String>) {
        let _ = ractor::cast!(self.actor, SessionCacheMessage::Invalidate(token.into()));
    }
}

struct CachedEntry {
    data: SessionData,
    cached_at: Instant,
}

struct SessionCacheState {
    ttl: Duration,
    entries: HashMap<String, CachedEntry>,
}

impl SessionCacheState {
    fn fresh(&self, entry: &CachedEntry) -> bool {
        entry.cached_at.elapsed() < self.ttl && entry.data.session.expires_at > Utc::now()
    }
}

struct SessionCacheActor;

#[ractor::async_trait]
impl Actor for SessionCacheActor {
    type Msg = SessionCacheMessage;
    type State = SessionCacheState;
    type Arguments = Duration;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        ttl: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        // Periodic sweep so tokens that never get looked up again still age out.
        let me = myself.clone();
        let period = ttl.max(Duration::from_secs(60));
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.tick().await; // immediate first tick
            loop {
                tick.tick().await;
                if ractor::cast!(me, SessionCacheMessage::Sweep).is_err() {
                    break;
                }
            }
        });

        Ok(SessionCacheState {
            ttl,
            entries: HashMap::new(),
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SessionCacheMessage::Get(token, rp) => {
                let checked = state
                    .entries
                    .get(&token)
                    .map(|e| (state.fresh(e), e.data.clone()));
                let hit = match checked {
                    Some((true, data)) => Some(data),
                    Some((false, _)) => {
                        state.entries.remove(&token);
                        None
                    }
                    None => None,
                };
                let _ = rp.send(hit);
            }
            SessionCacheMessage::Put(token, data) => {
                state.entries.insert(
                    token,
                    CachedEntry {
                        data,
                        cached_at: Instant::now(),
                    },
                );
            }
            SessionCacheMessage::Invalidate(token) => {
                state.entries.remove(&token);
            }
            SessionCacheMessage::Sweep => {
                let before = state.entries.len();
                let ttl = state.ttl;
                let now = Utc::now();
                state
                    .entries
                    .retain(|_, e| e.cached_at.elapsed() < ttl && e.data.session.expires_at > now);
                let swept = before - state.entries.len();
                if swept > 0 {
                    debug!(swept, remaining = state.entries.len(), "session cache sweep");
                }
            }
        }
        Ok(())
    }
}

/// Async spawn of a session cache actor and return a handle. Spawned
/// anonymously so several caches can coexist in one process.
pub async fn spawn(ttl: Duration) -> Result<SessionCacheHandle, AppError> {
    let (actor, _jh) = Actor::spawn(None, SessionCacheActor, ttl)
        .await
        .map_err(|e| AppError::SessionCache(format!("failed to spawn session cache: {e}")))?;
    Ok(SessionCacheHandle { actor })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn caches_can_coexist_in_one_process() {
        let a = spawn(Duration::from_secs(60)).await.expect("first spawn failed");
        let b = spawn(Duration::from_secs(60)).await.expect("second spawn failed");
        assert!(a.get("no-such-token").await.expect("get failed").is_none());
        assert!(b.get("no-such-token").await.expect("get failed").is_none());
    }
}
