//! Healthy-backend snapshot.
//!
//! # Responsibilities
//! - Hold the ordered sequence of currently-routable backends for one class
//! - Serve indexed lookups to routers under the shared read side
//! - Accept wholesale replacements from the health checker under the
//!   exclusive write side

use std::sync::Arc;

use crate::load_balancer::backend::Endpoint;
use crate::sync::RwLock;

/// The immutable-per-cycle view of healthy backends for one traffic class.
///
/// Readers hold the read-lock only for the index-and-clone; all I/O happens
/// after release. The health checker installs each rebuilt snapshot under
/// the write-lock, so a reader never observes a partially updated pool.
#[derive(Debug)]
pub struct HealthyPool<E> {
    snapshot: RwLock<Vec<Arc<E>>>,
}

impl<E: Endpoint> HealthyPool<E> {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Vec::new()),
        }
    }

    /// Replace the snapshot wholesale.
    pub async fn install(&self, backends: Vec<Arc<E>>) {
        let mut guard = self.snapshot.write().await;
        *guard = backends;
    }

    /// Pick the backend for a request id, or `None` if nothing is healthy.
    ///
    /// Selection is `request_id mod len` over the snapshot's current order.
    pub async fn select(&self, request_id: u64) -> Option<Arc<E>> {
        let guard = self.snapshot.read().await;
        if guard.is_empty() {
            return None;
        }
        let index = (request_id % guard.len() as u64) as usize;
        Some(guard[index].clone())
    }

    /// Number of backends in the current snapshot.
    pub async fn len(&self) -> usize {
        self.snapshot.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<E: Endpoint> Default for HealthyPool<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WsBackendConfig;
    use crate::load_balancer::backend::WsBackend;

    fn snapshot(ids: &[usize]) -> Vec<Arc<WsBackend>> {
        ids.iter()
            .map(|&id| {
                WsBackend::new(&WsBackendConfig {
                    id,
                    addr: format!("127.0.0.1:{}", 9000 + id),
                })
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_pool_selects_nothing() {
        let pool = HealthyPool::<WsBackend>::new();
        assert!(pool.select(1).await.is_none());
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn selection_follows_modulo_over_snapshot_order() {
        let pool = HealthyPool::new();
        pool.install(snapshot(&[1, 2, 3])).await;

        // Consecutive ids walk the snapshot cyclically.
        let picked: Vec<usize> = {
            let mut out = Vec::new();
            for request_id in 1..=6 {
                out.push(pool.select(request_id).await.unwrap().id);
            }
            out
        };
        assert_eq!(picked, vec![2, 3, 1, 2, 3, 1]);
    }

    #[tokio::test]
    async fn install_replaces_wholesale() {
        let pool = HealthyPool::new();
        pool.install(snapshot(&[1, 2, 3])).await;
        assert_eq!(pool.len().await, 3);

        pool.install(snapshot(&[2])).await;
        assert_eq!(pool.len().await, 1);
        assert_eq!(pool.select(100).await.unwrap().id, 2);
    }
}
