use std::future::Future;
use std::sync::Arc;

use tokio::sync::OnceCell;

/// Single-slot cache for the bootstrapped application of one execution context.
///
/// The slot is filled at most once. Concurrent first callers wait on the same
/// initialization instead of racing. A failed initialization leaves the slot
/// empty, so the next invocation bootstraps again.
pub struct WarmInstanceCache<H> {
    slot: OnceCell<Arc<H>>,
}

impl<H> WarmInstanceCache<H> {
    pub fn new() -> Self {
        Self {
            slot: OnceCell::new(),
        }
    }

    pub fn is_warm(&self) -> bool {
        self.slot.initialized()
    }

    pub async fn get_or_create<F, Fut, E>(&self, factory: F) -> Result<Arc<H>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<H, E>>,
    {
        self.slot
            .get_or_try_init(|| async { factory().await.map(Arc::new) })
            .await
            .cloned()
    }
}

impl<H> Default for WarmInstanceCache<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    struct Handle {
        generation: usize,
    }

    #[tokio::test]
    async fn second_call_reuses_first_handle() {
        let cache: WarmInstanceCache<Handle> = WarmInstanceCache::new();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let factory = move || async move {
            let generation = calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(Handle { generation })
        };

        assert!(!cache.is_warm());
        let first = cache.get_or_create(factory).await.expect("first call");
        let second = cache.get_or_create(factory).await.expect("second call");

        assert!(cache.is_warm());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.generation, 0);
    }

    #[tokio::test]
    async fn failed_factory_leaves_slot_empty() {
        let cache: WarmInstanceCache<Handle> = WarmInstanceCache::new();

        let error = cache
            .get_or_create(|| async { Err::<Handle, _>("boom".to_string()) })
            .await
            .err()
            .expect("factory error should propagate");
        assert_eq!(error, "boom");
        assert!(!cache.is_warm());

        let handle = cache
            .get_or_create(|| async { Ok::<_, String>(Handle { generation: 7 }) })
            .await
            .expect("retry on next invocation should succeed");
        assert_eq!(handle.generation, 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_calls_share_one_initialization() {
        let cache: Arc<WarmInstanceCache<Handle>> = Arc::new(WarmInstanceCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            tasks.push(tokio::spawn(async move {
                cache
                    .get_or_create(|| async move {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        let generation = calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, String>(Handle { generation })
                    })
                    .await
                    .expect("initialization should succeed")
            }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.expect("task should join"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(handles.iter().all(|handle| Arc::ptr_eq(handle, &handles[0])));
    }
}
