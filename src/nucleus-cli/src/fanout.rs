//! Concurrent per-item dispatch with first-error-wins reporting.
//!
//! Every item gets its own task, at most `max_concurrency` of them running at once.
//! The first error is returned as soon as it arrives; tasks already started keep
//! running and their outcomes are not reported. Later errors are dropped, so a
//! partial failure can leave some items applied and others not.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};

/// Run `op` for every item; `Ok(())` once all succeed, otherwise the first error.
pub async fn dispatch_first_error<T, E, F, Fut>(
    items: Vec<T>,
    max_concurrency: usize,
    op: F,
) -> Result<(), E>
where
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let op = Arc::new(op);
    // Single slot: the first error is kept, later ones find it full and are dropped.
    let (tx, mut rx) = mpsc::channel::<E>(1);

    let total = items.len();
    for item in items {
        let semaphore = Arc::clone(&semaphore);
        let op = Arc::clone(&op);
        let tx = tx.clone();
        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            if let Err(err) = op(item).await {
                if tx.try_send(err).is_err() {
                    tracing::debug!("Dropping error after the first");
                }
            }
        });
    }
    drop(tx);

    // The channel closes once every task has dropped its sender.
    match rx.recv().await {
        Some(err) => Err(err),
        None => {
            tracing::debug!(total, "All dispatched operations succeeded");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_all_succeed() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        let result: Result<(), String> = dispatch_first_error(vec![1, 2, 3], 2, move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert_eq!(result, Ok(()));
        assert_eq!(ran.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_items() {
        let result: Result<(), String> =
            dispatch_first_error(Vec::<u8>::new(), 4, |_| async { Ok(()) }).await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn test_first_error_is_returned() {
        let result = dispatch_first_error(vec!["dev", "stage", "prod"], 3, |env| async move {
            if env == "stage" {
                Err(format!("{env} failed"))
            } else {
                Ok(())
            }
        })
        .await;
        assert_eq!(result, Err("stage failed".to_string()));
    }

    #[tokio::test]
    async fn test_siblings_are_not_cancelled() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let result = dispatch_first_error(vec![0u64, 50], 2, move |delay_ms| {
            let flag = Arc::clone(&flag);
            async move {
                if delay_ms == 0 {
                    return Err("fast failure");
                }
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert_eq!(result, Err("fast failure"));
        assert!(!finished.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
        let result: Result<(), ()> = dispatch_first_error((0..8).collect(), 2, move |_| {
            let (active, peak) = (Arc::clone(&a), Arc::clone(&p));
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert_eq!(result, Ok(()));
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
