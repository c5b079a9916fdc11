//! Fixed-size pool of blocking connections.
//!
//! libssh2 sessions are not safe to drive from several threads at once, so
//! parallel uploads each check out their own connection. Connections are
//! opened lazily up to `size`; a semaphore keeps the number in use at or
//! below that bound.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use log::debug;
use tokio::sync::Semaphore;

type Opener<C> = dyn Fn() -> Result<C> + Send + Sync;

pub(crate) struct ConnectionPool<C> {
    idle: Arc<Mutex<Vec<C>>>,
    permits: Arc<Semaphore>,
    opener: Arc<Opener<C>>,
    size: usize,
}

impl<C: Send + 'static> ConnectionPool<C> {
    /// Pool seeded with an already open connection.
    ///
    /// `size` is clamped to at least 1.
    pub(crate) fn new<F>(first: C, size: usize, opener: F) -> Self
    where
        F: Fn() -> Result<C> + Send + Sync + 'static,
    {
        let size = size.max(1);
        Self {
            idle: Arc::new(Mutex::new(vec![first])),
            permits: Arc::new(Semaphore::new(size)),
            opener: Arc::new(opener),
            size,
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Run `op` on a checked-out connection on the blocking pool.
    ///
    /// A connection whose operation failed is dropped; the next checkout
    /// opens a fresh one.
    pub(crate) async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&C) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| anyhow!("SSH session is closed"))?;

        let idle = Arc::clone(&self.idle);
        let opener = Arc::clone(&self.opener);

        tokio::task::spawn_blocking(move || {
            let pooled = idle
                .lock()
                .map_err(|_| anyhow!("SSH connection pool lock poisoned"))?
                .pop();
            let connection = match pooled {
                Some(connection) => connection,
                None => {
                    debug!("Opening additional SSH connection");
                    opener()?
                }
            };

            let result = op(&connection);
            if result.is_ok() {
                idle.lock()
                    .map_err(|_| anyhow!("SSH connection pool lock poisoned"))?
                    .push(connection);
            } else {
                debug!("Discarding SSH connection after a failed operation");
            }
            result
        })
        .await
        .context("SSH worker task failed")?
    }

    /// Refuse further checkouts and hand back the idle connections.
    pub(crate) fn close(&self) -> Result<Vec<C>> {
        self.permits.close();
        let mut idle = self
            .idle
            .lock()
            .map_err(|_| anyhow!("SSH connection pool lock poisoned"))?;
        Ok(idle.drain(..).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_pool(size: usize) -> (ConnectionPool<usize>, Arc<AtomicUsize>) {
        let opened = Arc::new(AtomicUsize::new(1));
        let counter = Arc::clone(&opened);
        let pool = ConnectionPool::new(0, size, move || Ok(counter.fetch_add(1, Ordering::SeqCst)));
        (pool, opened)
    }

    #[tokio::test]
    async fn test_operations_overlap_up_to_pool_size() {
        let (pool, opened) = counting_pool(3);
        let in_use = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let operations = (0..8).map(|_| {
            let in_use = Arc::clone(&in_use);
            let peak = Arc::clone(&peak);
            pool.run(move |_conn| {
                let now = in_use.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(50));
                in_use.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
        });

        for result in futures::future::join_all(operations).await {
            assert!(result.is_ok());
        }

        let peak = peak.load(Ordering::SeqCst);
        assert!(peak > 1, "uploads never overlapped");
        assert!(peak <= 3);
        assert!(opened.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_single_connection_pool_serializes() {
        let (pool, opened) = counting_pool(1);
        let ids: Vec<usize> = futures::future::join_all((0..4).map(|_| pool.run(|conn| Ok(*conn))))
            .await
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(ids, vec![0, 0, 0, 0]);
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(pool.size(), 1);
    }

    #[tokio::test]
    async fn test_failed_connection_is_replaced() {
        let (pool, opened) = counting_pool(1);

        let failed: Result<()> = pool.run(|_| Err(anyhow!("channel closed"))).await;
        assert!(failed.is_err());

        let id = pool.run(|conn| Ok(*conn)).await.unwrap();
        assert_eq!(id, 1);
        assert_eq!(opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_checkouts() {
        let (pool, _) = counting_pool(2);
        let idle = pool.close().unwrap();
        assert_eq!(idle, vec![0]);

        let err = pool.run(|conn| Ok(*conn)).await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }
}
