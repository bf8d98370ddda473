//! AddressCache - キュー名 -> アドレスの解決とキャッシュ
//!
//! # 学習ポイント
//! - キュー名ごとの `tokio::sync::Mutex` スロットで single flight
//!   （同時に初回解決が走っても list は 1 回だけ）
//! - 見つからなかった結果はキャッシュしない
//! - TTL は任意（`Clock` で計測、デフォルトは無期限）

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::domain::{QueueAddress, TasqError};
use crate::ports::{Clock, QueueService};

#[derive(Debug, Clone)]
struct CachedAddress {
    address: QueueAddress,
    resolved_at: DateTime<Utc>,
}

type Slot = Arc<Mutex<Option<CachedAddress>>>;

pub struct AddressCache {
    service: Arc<dyn QueueService>,
    clock: Arc<dyn Clock>,
    ttl: Option<Duration>,
    slots: StdMutex<HashMap<String, Slot>>,
}

impl AddressCache {
    pub fn new(service: Arc<dyn QueueService>, clock: Arc<dyn Clock>, ttl: Option<Duration>) -> Self {
        Self {
            service,
            clock,
            ttl,
            slots: StdMutex::new(HashMap::new()),
        }
    }

    /// `queue_name` を解決。キャッシュミスのときだけ list する
    ///
    /// `queue_name` を prefix にして list し、
    /// 最後のパスセグメントが完全一致するものを採用
    pub async fn resolve(&self, queue_name: &str) -> Result<QueueAddress, TasqError> {
        let slot = self.slot(queue_name);
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref().filter(|c| self.is_fresh(c)) {
            return Ok(cached.address.clone());
        }

        let address = match self.lookup(queue_name).await {
            Ok(address) => address,
            Err(err) => {
                // 解決できなかった名前のスロットは残さない（map が増え続けるのを防ぐ）
                self.release_slot(queue_name, &slot);
                return Err(err);
            }
        };
        tracing::debug!(queue = %queue_name, address = %address, "queue address resolved");
        *entry = Some(CachedAddress {
            address: address.clone(),
            resolved_at: self.clock.now(),
        });
        Ok(address)
    }

    /// キャッシュを捨てる。次の `resolve` で list し直す
    pub fn invalidate(&self, queue_name: &str) {
        // スロットごと外す。解決中の呼び出しは古いスロットに書くだけなので影響しない
        if self.lock_slots().remove(queue_name).is_some() {
            tracing::debug!(queue = %queue_name, "queue address invalidated");
        }
    }

    pub fn clear(&self) {
        self.lock_slots().clear();
    }

    async fn lookup(&self, queue_name: &str) -> Result<QueueAddress, TasqError> {
        let candidates = self.service.list_queues(Some(queue_name)).await?;
        candidates
            .into_iter()
            .find(|address| address.matches_name(queue_name))
            .ok_or_else(|| TasqError::address_resolution(queue_name))
    }

    fn is_fresh(&self, cached: &CachedAddress) -> bool {
        match self.ttl {
            None => true,
            Some(ttl) => self.clock.now() - cached.resolved_at < ttl,
        }
    }

    fn slot(&self, queue_name: &str) -> Slot {
        Arc::clone(self.lock_slots().entry(queue_name.to_string()).or_default())
    }

    /// `slot` がまだ登録中のものなら外す（invalidate 後に作られた新しいスロットは残す）
    fn release_slot(&self, queue_name: &str, slot: &Slot) {
        let mut slots = self.lock_slots();
        if slots.get(queue_name).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(queue_name);
        }
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.lock_slots().len()
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}
