//! In-memory fast-store provider.
//!
//! Single-process implementation of `FastOrderedStore` used by the test
//! suite and for local development without a Redis instance. Ordering
//! semantics match the Redis provider: ascending join score, ties broken
//! by insertion order.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::store::errors::StoreResult;
use crate::store::fast::FastOrderedStore;

#[derive(Debug, Default)]
struct QueueState {
    // (score, seq, user) - seq disambiguates equal-score joins
    waiting: BTreeSet<(i64, u64, Uuid)>,
    waiting_index: HashMap<Uuid, (i64, u64)>,
    // user -> admission expiry epoch millis
    admitted: HashMap<Uuid, i64>,
    // user -> original join score, kept while admitted
    origin: HashMap<Uuid, i64>,
    admitted_serial: u64,
    next_seq: u64,
}

impl QueueState {
    fn purge_lapsed(&mut self, now_ms: i64) -> Vec<Uuid> {
        let lapsed: Vec<Uuid> = self
            .admitted
            .iter()
            .filter(|(_, expiry)| **expiry <= now_ms)
            .map(|(user, _)| *user)
            .collect();
        for user in &lapsed {
            self.admitted.remove(user);
            self.origin.remove(user);
        }
        lapsed
    }
}

/// In-process fast store. All state lives behind one mutex, which also
/// gives every operation the same atomicity the Redis provider gets from
/// Lua scripts.
#[derive(Debug, Default)]
pub struct InMemoryFastStore {
    queues: Mutex<HashMap<Uuid, QueueState>>,
}

impl InMemoryFastStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[async_trait]
impl FastOrderedStore for InMemoryFastStore {
    async fn add_waiting(&self, queue_id: Uuid, user_id: Uuid, score: i64) -> StoreResult<bool> {
        let mut queues = self.queues.lock();
        let state = queues.entry(queue_id).or_default();
        if state.waiting_index.contains_key(&user_id) {
            return Ok(false);
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.waiting.insert((score, seq, user_id));
        state.waiting_index.insert(user_id, (score, seq));
        Ok(true)
    }

    async fn remove_waiting(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let mut queues = self.queues.lock();
        let state = queues.entry(queue_id).or_default();
        match state.waiting_index.remove(&user_id) {
            Some((score, seq)) => {
                state.waiting.remove(&(score, seq, user_id));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn rank_in_waiting(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<Option<u64>> {
        let queues = self.queues.lock();
        let Some(state) = queues.get(&queue_id) else {
            return Ok(None);
        };
        if !state.waiting_index.contains_key(&user_id) {
            return Ok(None);
        }
        let position = state
            .waiting
            .iter()
            .position(|(_, _, user)| *user == user_id)
            .map(|p| p as u64 + 1);
        Ok(position)
    }

    async fn count_ahead_in_waiting(
        &self,
        queue_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<u64>> {
        Ok(self
            .rank_in_waiting(queue_id, user_id)
            .await?
            .map(|rank| rank - 1))
    }

    async fn total_waiting(&self, queue_id: Uuid) -> StoreResult<u64> {
        let queues = self.queues.lock();
        Ok(queues
            .get(&queue_id)
            .map(|state| state.waiting.len() as u64)
            .unwrap_or(0))
    }

    async fn top_waiting(&self, queue_id: Uuid, n: usize) -> StoreResult<Vec<Uuid>> {
        let queues = self.queues.lock();
        Ok(queues
            .get(&queue_id)
            .map(|state| {
                state
                    .waiting
                    .iter()
                    .take(n)
                    .map(|(_, _, user)| *user)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn is_waiting(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let queues = self.queues.lock();
        Ok(queues
            .get(&queue_id)
            .map(|state| state.waiting_index.contains_key(&user_id))
            .unwrap_or(false))
    }

    async fn move_to_admitted(
        &self,
        queue_id: Uuid,
        user_id: Uuid,
        ttl: Duration,
    ) -> StoreResult<Option<i64>> {
        let mut queues = self.queues.lock();
        let state = queues.entry(queue_id).or_default();
        match state.waiting_index.remove(&user_id) {
            Some((score, seq)) => {
                state.waiting.remove(&(score, seq, user_id));
                let expiry = Self::now_ms() + ttl.as_millis() as i64;
                state.admitted.insert(user_id, expiry);
                state.origin.insert(user_id, score);
                Ok(Some(score))
            }
            None => Ok(None),
        }
    }

    async fn is_admitted(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let queues = self.queues.lock();
        let now_ms = Self::now_ms();
        Ok(queues
            .get(&queue_id)
            .and_then(|state| state.admitted.get(&user_id))
            .map(|expiry| *expiry > now_ms)
            .unwrap_or(false))
    }

    async fn remove_admitted(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let mut queues = self.queues.lock();
        let state = queues.entry(queue_id).or_default();
        state.origin.remove(&user_id);
        Ok(state.admitted.remove(&user_id).is_some())
    }

    async fn total_admitted(&self, queue_id: Uuid) -> StoreResult<u64> {
        let mut queues = self.queues.lock();
        let state = queues.entry(queue_id).or_default();
        state.purge_lapsed(Self::now_ms());
        Ok(state.admitted.len() as u64)
    }

    async fn increment_admitted_serial(&self, queue_id: Uuid) -> StoreResult<u64> {
        let mut queues = self.queues.lock();
        let state = queues.entry(queue_id).or_default();
        state.admitted_serial += 1;
        Ok(state.admitted_serial)
    }

    async fn admitted_serial(&self, queue_id: Uuid) -> StoreResult<u64> {
        let queues = self.queues.lock();
        Ok(queues
            .get(&queue_id)
            .map(|state| state.admitted_serial)
            .unwrap_or(0))
    }

    async fn rollback_to_waiting(&self, queue_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let mut queues = self.queues.lock();
        let state = queues.entry(queue_id).or_default();
        let had_admission = state.admitted.remove(&user_id).is_some();
        let origin_score = state.origin.remove(&user_id);
        if !had_admission && origin_score.is_none() {
            return Ok(false);
        }
        let score = origin_score.unwrap_or_else(Self::now_ms);
        let seq = state.next_seq;
        state.next_seq += 1;
        state.waiting.insert((score, seq, user_id));
        state.waiting_index.insert(user_id, (score, seq));
        Ok(true)
    }

    async fn pop_expired_admitted(&self, queue_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let mut queues = self.queues.lock();
        let state = queues.entry(queue_id).or_default();
        Ok(state.purge_lapsed(Self::now_ms()))
    }

    async fn clear_all(&self, queue_id: Uuid) -> StoreResult<()> {
        self.queues.lock().remove(&queue_id);
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }
}
