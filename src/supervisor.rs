//! Owns the set of live sessions: admission against the connection cap,
//! periodic reaping of dead or idle sessions, and coordinated shutdown.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::constants::{POOL_MAINTENANCE_INTERVAL_SECS, REAPER_INTERVAL_SECS};

#[derive(Debug, Default)]
pub struct SessionStats {
    pub bytes_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    pub files_sent: AtomicU64,
    pub files_received: AtomicU64,
}

/// The supervisor's view of a session. The session task owns everything
/// else; cancellation flows through `active` plus the notify, never through
/// pointers back into the session.
pub struct SessionHandle {
    pub id: u64,
    pub peer: SocketAddr,
    pub stats: SessionStats,
    active: AtomicBool,
    last_activity: AtomicU64,
    stop_notify: Notify,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    fn new(id: u64, peer: SocketAddr) -> SessionHandle {
        SessionHandle {
            id,
            peer,
            stats: SessionStats::default(),
            active: AtomicBool::new(true),
            last_activity: AtomicU64::new(epoch_seconds()),
            stop_notify: Notify::new(),
            task: Mutex::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn mark_inactive(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Signals the session task to exit at its next suspension point.
    pub fn stop(&self) {
        self.mark_inactive();
        self.stop_notify.notify_waiters();
    }

    pub async fn stopped(&self) {
        self.stop_notify.notified().await
    }

    pub fn touch(&self) {
        self.last_activity.store(epoch_seconds(), Ordering::Relaxed);
    }

    pub fn idle_seconds(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_activity.load(Ordering::Relaxed))
    }
}

fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug)]
pub struct AtCapacity;

/// Reuse pool for data connections. Dormant: with capacity zero every
/// released connection is dropped immediately, but the maintenance hook and
/// the acquire/release surface stay in place for back-ends that want reuse.
pub struct ConnectionPool {
    capacity: usize,
    idle: Mutex<Vec<TcpStream>>,
}

impl ConnectionPool {
    pub fn new(capacity: usize) -> ConnectionPool {
        ConnectionPool {
            capacity,
            idle: Mutex::new(Vec::new()),
        }
    }

    pub fn acquire(&self) -> Option<TcpStream> {
        self.idle.lock().unwrap().pop()
    }

    pub fn release(&self, stream: TcpStream) {
        let mut idle = self.idle.lock().unwrap();
        if idle.len() < self.capacity {
            idle.push(stream);
        }
    }

    /// Drops pooled connections beyond capacity.
    pub fn maintain(&self) {
        let mut idle = self.idle.lock().unwrap();
        while idle.len() > self.capacity {
            idle.pop();
        }
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap().len()
    }
}

pub struct Supervisor {
    registry: Mutex<HashMap<u64, Arc<SessionHandle>>>,
    next_id: AtomicU64,
    max_connections: usize,
    idle_timeout: Duration,
    pool: ConnectionPool,
}

impl Supervisor {
    pub fn new(max_connections: u32, idle_timeout: Duration, pool_size: u32) -> Supervisor {
        Supervisor {
            registry: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            max_connections: max_connections as usize,
            idle_timeout,
            pool: ConnectionPool::new(pool_size as usize),
        }
    }

    /// Registers a new session, refusing once the connection cap is hit.
    pub fn admit(&self, peer: SocketAddr) -> Result<Arc<SessionHandle>, AtCapacity> {
        let mut registry = self.registry.lock().unwrap();
        if registry.len() >= self.max_connections {
            return Err(AtCapacity);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = Arc::new(SessionHandle::new(id, peer));
        registry.insert(id, Arc::clone(&handle));
        Ok(handle)
    }

    pub fn attach_task(&self, id: u64, task: JoinHandle<()>) {
        if let Some(handle) = self.registry.lock().unwrap().get(&id) {
            *handle.task.lock().unwrap() = Some(task);
        }
    }

    pub fn remove(&self, id: u64) {
        self.registry.lock().unwrap().remove(&id);
    }

    pub fn session_count(&self) -> usize {
        self.registry.lock().unwrap().len()
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// One reaper pass: evict sessions that finished or have been idle
    /// longer than the configured timeout.
    pub fn reap(&self, now: u64) {
        let stale: Vec<Arc<SessionHandle>> = {
            let registry = self.registry.lock().unwrap();
            registry
                .values()
                .filter(|h| !h.is_active() || h.idle_seconds(now) > self.idle_timeout.as_secs())
                .cloned()
                .collect()
        };
        for handle in stale {
            debug!(
                "Reaping session {} from {} (idle {}s)",
                handle.id,
                handle.peer,
                handle.idle_seconds(now)
            );
            handle.stop();
            self.remove(handle.id);
        }
    }

    pub fn start_reaper(self: Arc<Self>) -> JoinHandle<()> {
        let supervisor = self;
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(REAPER_INTERVAL_SECS));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                supervisor.reap(epoch_seconds());
            }
        })
    }

    pub fn start_pool_maintenance(self: Arc<Self>) -> JoinHandle<()> {
        let supervisor = self;
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(POOL_MAINTENANCE_INTERVAL_SECS));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                supervisor.pool.maintain();
            }
        })
    }

    /// Stops every session and waits for their tasks to finish.
    pub async fn shutdown(&self) {
        let handles: Vec<Arc<SessionHandle>> = {
            let mut registry = self.registry.lock().unwrap();
            registry.drain().map(|(_, h)| h).collect()
        };
        if !handles.is_empty() {
            info!("Stopping {} active session(s)", handles.len());
        }
        for handle in &handles {
            handle.stop();
        }
        for handle in handles {
            let task = handle.task.lock().unwrap().take();
            if let Some(task) = task {
                if let Err(e) = task.await {
                    if !e.is_cancelled() {
                        warn!("Session {} task panicked: {}", handle.id, e);
                    }
                }
            }
            let sent = handle.stats.bytes_sent.load(Ordering::Relaxed);
            let received = handle.stats.bytes_received.load(Ordering::Relaxed);
            debug!(
                "Session {} totals: {} bytes sent, {} bytes received",
                handle.id, sent, received
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn admit_enforces_the_connection_cap() {
        let supervisor = Supervisor::new(2, Duration::from_secs(300), 0);
        let first = supervisor.admit(peer()).unwrap();
        let _second = supervisor.admit(peer()).unwrap();
        assert!(supervisor.admit(peer()).is_err());

        supervisor.remove(first.id);
        assert!(supervisor.admit(peer()).is_ok());
    }

    #[test]
    fn reap_evicts_inactive_sessions() {
        let supervisor = Supervisor::new(4, Duration::from_secs(300), 0);
        let handle = supervisor.admit(peer()).unwrap();
        handle.mark_inactive();
        supervisor.reap(epoch_seconds());
        assert_eq!(supervisor.session_count(), 0);
    }

    #[test]
    fn reap_evicts_idle_sessions() {
        let supervisor = Supervisor::new(4, Duration::from_secs(60), 0);
        let handle = supervisor.admit(peer()).unwrap();
        assert!(handle.is_active());

        // Pretend the last command was half an hour ago.
        let now = epoch_seconds() + 1800;
        supervisor.reap(now);
        assert_eq!(supervisor.session_count(), 0);
        assert!(!handle.is_active());
    }

    #[test]
    fn fresh_sessions_survive_a_reap() {
        let supervisor = Supervisor::new(4, Duration::from_secs(300), 0);
        let handle = supervisor.admit(peer()).unwrap();
        handle.touch();
        supervisor.reap(epoch_seconds());
        assert_eq!(supervisor.session_count(), 1);
        assert!(handle.is_active());
    }

    #[tokio::test]
    async fn zero_capacity_pool_drops_released_connections() {
        let pool = ConnectionPool::new(0);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();

        pool.release(client);
        assert_eq!(pool.idle_count(), 0);
        assert!(pool.acquire().is_none());
    }
}
