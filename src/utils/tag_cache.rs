use anyhow::Result;
use moka::future::Cache;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::model::{
    Paging,
    nfc_tag::{TagBinding, TagFilter, TagStatus},
};
use crate::store::{EmployeeStore, Store, StoreResult, TagStore};

/// Badge UID => tag + employee, so readers tapping all day skip two lookups.
///
/// Only hits are cached; an unknown UID always goes to the store so a freshly
/// enrolled badge works on its first tap. Writers call `invalidate` /
/// `invalidate_all` after every tag or employee change. A load that overlaps
/// an invalidation is served but not kept, so a revoked badge cannot be
/// re-cached from a read taken before the revocation.
#[derive(Clone)]
pub struct TagCache {
    inner: Cache<String, TagBinding>,
    generation: Arc<AtomicU64>,
}

impl TagCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(50_000)
                .time_to_live(ttl)
                .build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn resolve(&self, store: &dyn Store, uid: &str) -> StoreResult<Option<TagBinding>> {
        if let Some(hit) = self.inner.get(uid).await {
            return Ok(Some(hit));
        }

        let seen = self.generation.load(Ordering::SeqCst);
        let Some(tag) = store.find_tag_by_uid(uid).await? else {
            return Ok(None);
        };
        let binding = load_binding(store, tag).await?;
        self.insert_if_current(uid, binding.clone(), seen).await;
        Ok(Some(binding))
    }

    /// Inserts, then drops the entry again if an invalidation started since
    /// `seen`. Invalidators bump the generation before evicting, so either
    /// their eviction or this check removes the stale entry.
    async fn insert_if_current(&self, uid: &str, binding: TagBinding, seen: u64) {
        if self.generation.load(Ordering::SeqCst) != seen {
            return;
        }
        self.inner.insert(uid.to_string(), binding).await;
        if self.generation.load(Ordering::SeqCst) != seen {
            self.inner.invalidate(uid).await;
        }
    }

    pub async fn invalidate(&self, uid: &str) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate(uid).await;
    }

    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate_all();
    }

    /// Preload active badges, page by page.
    pub async fn warmup(&self, store: &dyn Store, batch_size: u32) -> Result<usize> {
        let filter = TagFilter {
            employee_id: None,
            status: Some(TagStatus::Active),
        };
        let mut page = 1;
        let mut total = 0usize;

        loop {
            let seen = self.generation.load(Ordering::SeqCst);
            let batch = store
                .list_tags(&filter, Paging::new(Some(page), Some(batch_size)))
                .await?;
            if batch.items.is_empty() {
                break;
            }

            let mut bindings = Vec::with_capacity(batch.items.len());
            for tag in batch.items {
                bindings.push(load_binding(store, tag).await?);
            }
            total += bindings.len();

            let inserts: Vec<_> = bindings
                .into_iter()
                .map(|b| async move {
                    let uid = b.tag.tag_uid.clone();
                    self.insert_if_current(&uid, b, seen).await
                })
                .collect();
            futures::future::join_all(inserts).await;

            if (total as i64) >= batch.total {
                break;
            }
            page += 1;
        }

        tracing::info!(total, "Tag cache warmup complete");
        Ok(total)
    }
}

async fn load_binding(store: &dyn Store, tag: crate::model::nfc_tag::NfcTag) -> StoreResult<TagBinding> {
    let employee = match tag.employee_id {
        Some(id) => store.get_employee(id).await?,
        None => None,
    };
    Ok(TagBinding { tag, employee })
}
