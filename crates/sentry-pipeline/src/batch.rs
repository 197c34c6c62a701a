//! Request Batcher (C7): per-model priority queues drained into
//! bounded batches by size or wait time, processed under a concurrency
//! cap.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore, oneshot};
use tokio::task::JoinHandle;

use crate::error::{PipelineError, PipelineResult};

/// Default max items per fired batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10;
/// Default max time a batch waits before firing under-size.
pub const DEFAULT_MAX_WAIT_MS: u64 = 100;
/// Default max batches in flight at once.
pub const DEFAULT_MAX_CONCURRENT_BATCHES: usize = 5;

/// Tunables for [`RequestBatcher`].
#[derive(Debug, Clone, Copy)]
pub struct BatcherConfig {
    /// Items per batch before it fires immediately.
    pub max_batch_size: usize,
    /// Milliseconds an under-size batch waits before firing anyway.
    pub max_wait_ms: u64,
    /// Simultaneous in-flight batches across all model queues.
    pub max_concurrent_batches: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_wait_ms: DEFAULT_MAX_WAIT_MS,
            max_concurrent_batches: DEFAULT_MAX_CONCURRENT_BATCHES,
        }
    }
}

/// A boxed async processor: takes the batch's payloads, returns one
/// result per payload (`None` maps to "no result returned") or a
/// single error that fails every item in the batch.
pub type Processor<T, R> = Arc<
    dyn Fn(Vec<T>) -> Pin<Box<dyn Future<Output = Result<Vec<Option<R>>, String>> + Send>>
        + Send
        + Sync,
>;

struct PendingItem<T, R> {
    payload: T,
    priority: i64,
    responder: oneshot::Sender<PipelineResult<R>>,
}

struct ModelQueue<T, R> {
    items: Vec<PendingItem<T, R>>,
    timer: Option<JoinHandle<()>>,
}

impl<T, R> Default for ModelQueue<T, R> {
    fn default() -> Self {
        Self { items: Vec::new(), timer: None }
    }
}

/// Per-model priority queues drained into bounded batches.
pub struct RequestBatcher<T, R> {
    config: BatcherConfig,
    processor: Processor<T, R>,
    queues: Mutex<HashMap<String, ModelQueue<T, R>>>,
    concurrency: Arc<Semaphore>,
    shutting_down: std::sync::atomic::AtomicBool,
}

impl<T, R> RequestBatcher<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    /// Build a batcher around `processor`, called once per fired batch.
    #[must_use]
    pub fn new(config: BatcherConfig, processor: Processor<T, R>) -> Arc<Self> {
        Arc::new(Self {
            concurrency: Arc::new(Semaphore::new(config.max_concurrent_batches)),
            config,
            processor,
            queues: Mutex::new(HashMap::new()),
            shutting_down: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Enqueue one item for `model` at `priority` (higher fires
    /// first; FIFO among equal priorities). Returns a handle that
    /// resolves once the item's batch completes.
    ///
    /// # Errors
    ///
    /// The returned receiver resolves to [`PipelineError::ShutDown`] if
    /// the batcher has begun shutting down.
    pub async fn add(
        self: &Arc<Self>,
        model: impl Into<String>,
        payload: T,
        priority: i64,
    ) -> oneshot::Receiver<PipelineResult<R>> {
        let (tx, rx) = oneshot::channel();
        if self.shutting_down.load(std::sync::atomic::Ordering::Acquire) {
            let _ = tx.send(Err(PipelineError::ShutDown));
            return rx;
        }

        let model = model.into();
        let item = PendingItem { payload, priority, responder: tx };

        let should_fire_now = {
            let mut queues = self.queues.lock().await;
            let queue = queues.entry(model.clone()).or_default();
            let insert_at = queue.items.iter().position(|i| i.priority < priority).unwrap_or(queue.items.len());
            queue.items.insert(insert_at, item);

            let became_non_empty = queue.items.len() == 1;
            let hit_cap = queue.items.len() >= self.config.max_batch_size;

            if became_non_empty && !hit_cap {
                self.arm_timer(queue, model.clone());
            }
            if hit_cap {
                if let Some(timer) = queue.timer.take() {
                    timer.abort();
                }
            }
            hit_cap
        };

        if should_fire_now {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.fire(model).await });
        }

        rx
    }

    fn arm_timer(self: &Arc<Self>, queue: &mut ModelQueue<T, R>, model: String) {
        let wait = Duration::from_millis(self.config.max_wait_ms);
        let this = Arc::clone(self);
        queue.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            this.fire(model).await;
        }));
    }

    /// Drain up to `max_batch_size` items for `model` and process them
    /// as one batch, cooperatively waiting for a concurrency permit.
    async fn fire(self: &Arc<Self>, model: String) {
        let items = {
            let mut queues = self.queues.lock().await;
            let Some(queue) = queues.get_mut(&model) else { return };
            if let Some(timer) = queue.timer.take() {
                timer.abort();
            }
            if queue.items.is_empty() {
                return;
            }
            let take = queue.items.len().min(self.config.max_batch_size);
            queue.items.drain(..take).collect::<Vec<_>>()
        };
        if items.is_empty() {
            return;
        }

        // Cooperative yield at the concurrency cap, not a spin.
        let permit = Arc::clone(&self.concurrency).acquire_owned().await;
        let processor = Arc::clone(&self.processor);

        let (payloads, responders): (Vec<T>, Vec<oneshot::Sender<PipelineResult<R>>>) =
            items.into_iter().map(|i| (i.payload, i.responder)).unzip();

        let outcome = processor(payloads).await;
        drop(permit);

        match outcome {
            Ok(mut results) => {
                results.resize_with(responders.len(), || None);
                for (responder, result) in responders.into_iter().zip(results) {
                    let _ = responder.send(result.ok_or(PipelineError::NoResult));
                }
            }
            Err(message) => {
                for responder in responders {
                    let _ = responder.send(Err(PipelineError::BatchFailed(message.clone())));
                }
            }
        }

        // Re-check: items may have arrived while this batch was
        // in flight and already hit the size cap without a live timer.
        self.maybe_refire(model).await;
    }

    async fn maybe_refire(self: &Arc<Self>, model: String) {
        let fire_now = {
            let mut queues = self.queues.lock().await;
            let Some(queue) = queues.get_mut(&model) else { return };
            if queue.items.is_empty() {
                false
            } else if queue.items.len() >= self.config.max_batch_size {
                true
            } else if queue.timer.is_none() {
                self.arm_timer(queue, model.clone());
                false
            } else {
                false
            }
        };
        if fire_now {
            Box::pin(self.fire(model)).await;
        }
    }

    /// Drain every queue immediately, firing as many batches as
    /// needed regardless of wait timers.
    pub async fn flush(self: &Arc<Self>) {
        let models: Vec<String> = self.queues.lock().await.keys().cloned().collect();
        for model in models {
            loop {
                let remaining = {
                    let queues = self.queues.lock().await;
                    queues.get(&model).map_or(0, |q| q.items.len())
                };
                if remaining == 0 {
                    break;
                }
                self.fire(model.clone()).await;
            }
        }
    }

    /// Stop accepting new items, cancel all pending timers, and
    /// process whatever remains before returning.
    pub async fn shutdown(self: &Arc<Self>) {
        self.shutting_down.store(true, std::sync::atomic::Ordering::Release);
        {
            let mut queues = self.queues.lock().await;
            for queue in queues.values_mut() {
                if let Some(timer) = queue.timer.take() {
                    timer.abort();
                }
            }
        }
        self.flush().await;
    }

    /// Current queue depth for `model`.
    pub async fn queue_depth(&self, model: &str) -> usize {
        self.queues.lock().await.get(model).map_or(0, |q| q.items.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn echo_processor() -> Processor<i32, i32> {
        Arc::new(|items: Vec<i32>| {
            Box::pin(async move { Ok(items.into_iter().map(|i| Some(i * 2)).collect()) })
        })
    }

    #[tokio::test]
    async fn batch_fires_immediately_at_max_size() {
        let config = BatcherConfig { max_batch_size: 2, max_wait_ms: 10_000, max_concurrent_batches: 1 };
        let batcher = RequestBatcher::new(config, echo_processor());
        let r1 = batcher.add("m", 1, 0).await;
        let r2 = batcher.add("m", 2, 0).await;
        let v1 = tokio::time::timeout(Duration::from_millis(200), r1).await.unwrap().unwrap().unwrap();
        let v2 = tokio::time::timeout(Duration::from_millis(200), r2).await.unwrap().unwrap().unwrap();
        assert_eq!(v1, 2);
        assert_eq!(v2, 4);
    }

    #[tokio::test]
    async fn under_size_batch_fires_after_wait() {
        let config = BatcherConfig { max_batch_size: 10, max_wait_ms: 20, max_concurrent_batches: 1 };
        let batcher = RequestBatcher::new(config, echo_processor());
        let r1 = batcher.add("m", 5, 0).await;
        let v1 = tokio::time::timeout(Duration::from_millis(500), r1).await.unwrap().unwrap().unwrap();
        assert_eq!(v1, 10);
    }

    #[tokio::test]
    async fn processor_failure_fails_every_item_in_batch() {
        let processor: Processor<i32, i32> =
            Arc::new(|_items| Box::pin(async move { Err("boom".to_string()) }));
        let config = BatcherConfig { max_batch_size: 2, max_wait_ms: 10_000, max_concurrent_batches: 1 };
        let batcher = RequestBatcher::new(config, processor);
        let r1 = batcher.add("m", 1, 0).await;
        let r2 = batcher.add("m", 2, 0).await;
        let e1 = r1.await.unwrap();
        let e2 = r2.await.unwrap();
        assert!(matches!(e1, Err(PipelineError::BatchFailed(_))));
        assert!(matches!(e2, Err(PipelineError::BatchFailed(_))));
    }

    #[tokio::test]
    async fn missing_result_entry_fails_with_no_result() {
        let processor: Processor<i32, i32> =
            Arc::new(|items| Box::pin(async move { Ok(vec![None; items.len()]) }));
        let config = BatcherConfig { max_batch_size: 1, max_wait_ms: 10_000, max_concurrent_batches: 1 };
        let batcher = RequestBatcher::new(config, processor);
        let r1 = batcher.add("m", 1, 0).await;
        let result = r1.await.unwrap();
        assert!(matches!(result, Err(PipelineError::NoResult)));
    }

    #[tokio::test]
    async fn flush_drains_without_waiting() {
        let config = BatcherConfig { max_batch_size: 10, max_wait_ms: 60_000, max_concurrent_batches: 1 };
        let batcher = RequestBatcher::new(config, echo_processor());
        let r1 = batcher.add("m", 7, 0).await;
        batcher.flush().await;
        let v1 = tokio::time::timeout(Duration::from_millis(100), r1).await.unwrap().unwrap().unwrap();
        assert_eq!(v1, 14);
    }

    #[tokio::test]
    async fn higher_priority_is_served_before_lower_within_a_batch() {
        let seen_order = Arc::new(Mutex::new(Vec::new()));
        let seen_order_clone = Arc::clone(&seen_order);
        let processor: Processor<i32, i32> = Arc::new(move |items: Vec<i32>| {
            let seen_order = Arc::clone(&seen_order_clone);
            Box::pin(async move {
                seen_order.lock().await.extend(items.iter().copied());
                Ok(items.into_iter().map(Some).collect())
            })
        });
        let config = BatcherConfig { max_batch_size: 3, max_wait_ms: 10_000, max_concurrent_batches: 1 };
        let batcher = RequestBatcher::new(config, processor);
        let _low = batcher.add("m", 1, 0).await;
        let _high = batcher.add("m", 2, 5).await;
        let _done = batcher.add("m", 3, 0).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*seen_order.lock().await, vec![2, 1, 3]);
    }

    #[tokio::test]
    async fn concurrency_cap_is_respected() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_observed = Arc::new(AtomicUsize::new(0));
        let in_flight_clone = Arc::clone(&in_flight);
        let max_observed_clone = Arc::clone(&max_observed);
        let processor: Processor<i32, i32> = Arc::new(move |items: Vec<i32>| {
            let in_flight = Arc::clone(&in_flight_clone);
            let max_observed = Arc::clone(&max_observed_clone);
            Box::pin(async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_observed.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(items.into_iter().map(Some).collect())
            })
        });
        let config = BatcherConfig { max_batch_size: 1, max_wait_ms: 10_000, max_concurrent_batches: 2 };
        let batcher = RequestBatcher::new(config, processor);
        let mut handles = Vec::new();
        for i in 0..6 {
            handles.push(batcher.add("m", i, 0).await);
        }
        for h in handles {
            let _ = h.await;
        }
        assert!(max_observed.load(Ordering::SeqCst) <= 2);
    }
}
