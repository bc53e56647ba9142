use crate::error::SearchError;
use once_cell::sync::Lazy;
use rayon::ThreadPool;
use std::cmp::max;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

static POOL_SIZE: Lazy<usize> = Lazy::new(|| {
    let fallback = 4usize;
    let available = std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(fallback);
    available.clamp(2, 8)
});

/// `None` if the OS refused to start worker threads; jobs then run inline on
/// tokio's blocking pool.
static CPU_POOL: Lazy<Option<ThreadPool>> = Lazy::new(|| {
    match rayon::ThreadPoolBuilder::new()
        .num_threads(*POOL_SIZE)
        .thread_name(|idx| format!("propmatch-cpu-{idx}"))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(err) => {
            warn!(target: "propmatch.cpu_pool", error = %err, "failed to build CPU pool");
            None
        }
    }
});

static IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);

/// Run `job` on the rayon pool, so resolution and scoring never hold a
/// runtime worker. Nested `rayon` iterators inside the job use the same pool.
pub async fn spawn_cpu<F, R>(job: F) -> Result<R, SearchError>
where
    F: FnOnce() -> Result<R, SearchError> + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let queued = IN_FLIGHT.fetch_add(1, Ordering::Relaxed) + 1;
    let threshold = max(*POOL_SIZE, 1) * 2;
    if queued > threshold {
        info!(
            target: "propmatch.cpu_pool",
            queued,
            threads = *POOL_SIZE,
            "CPU pool backlog growing"
        );
    } else {
        debug!(target: "propmatch.cpu_pool", queued, threads = *POOL_SIZE, "CPU task queued");
    }

    let start = Instant::now();
    let task = move || {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job))
            .map_err(|payload| {
                let reason = if let Some(msg) = payload.downcast_ref::<&str>() {
                    (*msg).to_string()
                } else if let Some(msg) = payload.downcast_ref::<String>() {
                    msg.clone()
                } else {
                    "unknown panic".to_string()
                };
                SearchError::Internal(format!("CPU task panicked: {}", reason))
            })
            .and_then(|inner| inner);
        let _ = tx.send(result);
        let finished = IN_FLIGHT.fetch_sub(1, Ordering::Relaxed) - 1;
        let latency_ms = start.elapsed().as_millis();
        if latency_ms > 500 {
            info!(
                target: "propmatch.cpu_pool",
                queue_after = finished,
                latency_ms,
                "CPU task finished (slow)"
            );
        } else {
            debug!(target: "propmatch.cpu_pool", queue_after = finished, latency_ms, "CPU task finished");
        }
    };

    match CPU_POOL.as_ref() {
        Some(pool) => pool.spawn(task),
        None => {
            tokio::task::spawn_blocking(task);
        }
    }

    rx.await
        .map_err(|err| SearchError::Internal(format!("CPU pool join error: {}", err)))?
}

pub fn queue_depth() -> usize {
    IN_FLIGHT.load(Ordering::Relaxed)
}

pub fn worker_count() -> usize {
    *POOL_SIZE
}
