use crate::base::neterror::NetError;
use crate::http::h2::H2Connection;
use crate::socket::client::ClientSocket;
use crate::socket::proxy::ProxySettings;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use url::Url;

pub const DEFAULT_MAX_PER_HOST: usize = 6;
pub const DEFAULT_MAX_TOTAL: usize = 256;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Identifies a connection group. Sessions are only shared within a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    scheme: String,
    host: String,
    port: u16,
    profile: String,
    proxy: Option<String>,
}

impl PoolKey {
    pub fn new(url: &Url, profile: &str, proxy: Option<&ProxySettings>) -> Result<Self, NetError> {
        Ok(PoolKey {
            scheme: url.scheme().to_string(),
            host: url.host_str().ok_or(NetError::InvalidUrl)?.to_ascii_lowercase(),
            port: url.port_or_known_default().ok_or(NetError::InvalidUrl)?,
            profile: profile.to_string(),
            proxy: proxy.map(ProxySettings::pool_key),
        })
    }
}

#[derive(Debug)]
struct H2Entry {
    conn: H2Connection,
    /// Set once the connection has no open streams.
    idle_since: Option<Instant>,
}

/// Per-group state. `open` counts every session the group owns: idle and
/// checked-out HTTP/1.1 sockets, HTTP/2 connections and connects in flight.
#[derive(Debug, Default)]
struct Group {
    idle: VecDeque<ClientSocket>,
    h2: Vec<H2Entry>,
    open: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

impl Group {
    fn is_empty(&self) -> bool {
        self.open == 0 && self.waiters.is_empty()
    }
}

#[derive(Debug, Default)]
struct Totals {
    open: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// Wake the first waiter still listening.
fn wake_one(waiters: &mut VecDeque<oneshot::Sender<()>>) {
    while let Some(tx) = waiters.pop_front() {
        if tx.send(()).is_ok() {
            return;
        }
    }
}

fn wake_all(waiters: &mut VecDeque<oneshot::Sender<()>>) {
    for tx in waiters.drain(..) {
        let _ = tx.send(());
    }
}

#[derive(Debug)]
struct PoolInner {
    max_per_host: usize,
    max_total: usize,
    idle_timeout: Duration,
    groups: DashMap<PoolKey, Group>,
    // Lock order: group entry first, then totals.
    totals: Mutex<Totals>,
}

impl PoolInner {
    fn totals(&self) -> std::sync::MutexGuard<'_, Totals> {
        self.totals.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Give back `n` slots of a group the caller already holds.
    fn free_locked(&self, group: &mut Group, n: usize) {
        if n == 0 {
            return;
        }
        group.open = group.open.saturating_sub(n);
        for _ in 0..n {
            wake_one(&mut group.waiters);
        }
        let mut totals = self.totals();
        totals.open = totals.open.saturating_sub(n);
        for _ in 0..n {
            wake_one(&mut totals.waiters);
        }
    }

    fn free_slot(&self, key: &PoolKey) {
        if let Some(mut group) = self.groups.get_mut(key) {
            self.free_locked(&mut group, 1);
        }
    }

    fn put_idle(&self, key: &PoolKey, socket: ClientSocket) {
        let mut group = self.groups.entry(key.clone()).or_default();
        tracing::trace!(session_id = socket.id(), "session returned to pool");
        group.idle.push_back(socket);
        wake_one(&mut group.waiters);
    }

    fn add_h2(&self, key: &PoolKey, conn: H2Connection) {
        let mut group = self.groups.entry(key.clone()).or_default();
        group.h2.push(H2Entry {
            conn,
            idle_since: None,
        });
        // Every waiter can multiplex onto the new connection.
        wake_all(&mut group.waiters);
    }

    fn reap(&self) {
        let now = Instant::now();
        for mut entry in self.groups.iter_mut() {
            let group = entry.value_mut();
            let idle_timeout = self.idle_timeout;

            let before = group.idle.len();
            group
                .idle
                .retain_mut(|s| s.session().idle_for() < idle_timeout && s.is_usable().is_ok());
            let mut freed = before - group.idle.len();

            let before = group.h2.len();
            group.h2.retain_mut(|e| {
                if !e.conn.is_usable() {
                    return false;
                }
                if e.conn.active_streams() > 0 {
                    e.idle_since = None;
                    return true;
                }
                let since = *e.idle_since.get_or_insert(now);
                if now.duration_since(since) >= idle_timeout {
                    e.conn.close();
                    return false;
                }
                true
            });
            freed += before - group.h2.len();

            if freed > 0 {
                tracing::debug!(host = %entry.key().host, freed, "reaped idle sessions");
                self.free_locked(entry.value_mut(), freed);
            }
        }
        self.groups.retain(|_, g| !g.is_empty());
    }
}

/// Manages sessions per group, enforcing Chromium-like limits (6 per host,
/// 256 total). Callers beyond a limit wait until a slot frees up.
#[derive(Debug, Clone)]
pub struct SessionPool {
    inner: Arc<PoolInner>,
}

impl Default for SessionPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PER_HOST, DEFAULT_MAX_TOTAL, DEFAULT_IDLE_TIMEOUT)
    }
}

/// Outcome of a checkout.
#[derive(Debug)]
pub enum Checkout {
    /// Exclusive use of an idle HTTP/1.1 session.
    Http1(PooledSocket),
    /// Shared handle to a live HTTP/2 session.
    Http2(H2Connection),
    /// A reserved slot; the caller must connect and hand the result back.
    Connect(ConnectSlot),
}

impl SessionPool {
    /// Build a pool. Spawns the idle reaper when called inside a runtime.
    pub fn new(max_per_host: usize, max_total: usize, idle_timeout: Duration) -> Self {
        let inner = Arc::new(PoolInner {
            max_per_host: max_per_host.max(1),
            max_total: max_total.max(1),
            idle_timeout,
            groups: DashMap::new(),
            totals: Mutex::new(Totals::default()),
        });
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(reaper(Arc::downgrade(&inner)));
        }
        Self { inner }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.inner.idle_timeout
    }

    /// Get a session for `key`, waiting until `deadline` when the pool is full.
    pub async fn checkout(&self, key: &PoolKey, deadline: Option<Instant>) -> Result<Checkout, NetError> {
        self.checkout_inner(key, deadline, true).await
    }

    /// Like [`checkout`](Self::checkout) but never hands out an existing
    /// session. Idle HTTP/1.1 sessions are evicted to make room.
    pub async fn checkout_new(&self, key: &PoolKey, deadline: Option<Instant>) -> Result<Checkout, NetError> {
        self.checkout_inner(key, deadline, false).await
    }

    async fn checkout_inner(
        &self,
        key: &PoolKey,
        deadline: Option<Instant>,
        reuse: bool,
    ) -> Result<Checkout, NetError> {
        loop {
            let rx = match self.try_checkout(key, reuse) {
                Ok(checkout) => return Ok(checkout),
                Err(rx) => rx,
            };
            tracing::trace!(host = %key.host, "pool full, waiting for a slot");
            match deadline {
                Some(deadline) => {
                    let deadline = tokio::time::Instant::from_std(deadline);
                    if tokio::time::timeout_at(deadline, rx).await.is_err() {
                        return Err(NetError::TimedOut);
                    }
                }
                None => {
                    let _ = rx.await;
                }
            }
        }
    }

    fn try_checkout(&self, key: &PoolKey, reuse: bool) -> Result<Checkout, oneshot::Receiver<()>> {
        let inner = &self.inner;
        let mut group = inner.groups.entry(key.clone()).or_default();

        let before = group.h2.len();
        group.h2.retain(|e| e.conn.is_usable());
        let dead = before - group.h2.len();
        inner.free_locked(&mut group, dead);

        if !reuse {
            if group.open >= inner.max_per_host {
                if let Some(socket) = group.idle.pop_front() {
                    tracing::debug!(session_id = socket.id(), "evicting idle session");
                    inner.free_locked(&mut group, 1);
                }
            }
            return self.reserve(key, group);
        }

        // Streams past the peer's concurrency limit queue inside the connection.
        if let Some(entry) = group.h2.first_mut() {
            entry.idle_since = None;
            tracing::trace!(session_id = entry.conn.id(), "reusing HTTP/2 session");
            return Ok(Checkout::Http2(entry.conn.clone()));
        }

        // LIFO: the most recently used socket is the least likely to be stale.
        while let Some(mut socket) = group.idle.pop_back() {
            let fresh = socket.session().idle_for() < inner.idle_timeout;
            if fresh && socket.is_usable().is_ok() && socket.set_active().is_ok() {
                tracing::trace!(session_id = socket.id(), "reusing idle session");
                return Ok(Checkout::Http1(PooledSocket {
                    socket,
                    slot: SlotGuard::new(inner, key),
                    reused: true,
                }));
            }
            tracing::debug!(session_id = socket.id(), "discarding stale idle session");
            inner.free_locked(&mut group, 1);
        }
        self.reserve(key, group)
    }

    /// Reserve a connect slot, or queue a waiter when a limit is reached.
    fn reserve(
        &self,
        key: &PoolKey,
        mut group: dashmap::mapref::one::RefMut<'_, PoolKey, Group>,
    ) -> Result<Checkout, oneshot::Receiver<()>> {
        let inner = &self.inner;
        let (tx, rx) = oneshot::channel();
        if group.open >= inner.max_per_host {
            group.waiters.push_back(tx);
            return Err(rx);
        }
        let mut totals = inner.totals();
        if totals.open >= inner.max_total {
            totals.waiters.push_back(tx);
            return Err(rx);
        }
        totals.open += 1;
        group.open += 1;
        Ok(Checkout::Connect(ConnectSlot {
            slot: SlotGuard::new(inner, key),
        }))
    }

    /// Sessions currently owned by the pool, in use or idle.
    pub fn open_count(&self) -> usize {
        self.inner.totals().open
    }

    pub fn idle_count(&self) -> usize {
        self.inner.groups.iter().map(|g| g.idle.len()).sum()
    }

    /// Drop expired idle sessions now instead of waiting for the reaper.
    pub fn reap_idle(&self) {
        self.inner.reap();
    }
}

async fn reaper(pool: Weak<PoolInner>) {
    let period = match pool.upgrade() {
        Some(inner) => (inner.idle_timeout / 2).clamp(Duration::from_secs(1), Duration::from_secs(30)),
        None => return,
    };
    let mut interval = tokio::time::interval(period);
    interval.tick().await;
    loop {
        interval.tick().await;
        let Some(inner) = pool.upgrade() else {
            return;
        };
        inner.reap();
    }
}

/// Holds one slot of a group; frees it on drop.
#[derive(Debug)]
struct SlotGuard {
    pool: Arc<PoolInner>,
    key: PoolKey,
    armed: bool,
}

impl SlotGuard {
    fn new(pool: &Arc<PoolInner>, key: &PoolKey) -> Self {
        Self {
            pool: Arc::clone(pool),
            key: key.clone(),
            armed: true,
        }
    }

    /// The slot now belongs to a pooled session.
    fn disarm(mut self) -> Arc<PoolInner> {
        self.armed = false;
        Arc::clone(&self.pool)
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if self.armed {
            self.pool.free_slot(&self.key);
        }
    }
}

/// Exclusive checkout of an HTTP/1.1 session.
///
/// `release` returns it to the pool; dropping it closes the session.
#[derive(Debug)]
pub struct PooledSocket {
    socket: ClientSocket,
    slot: SlotGuard,
    reused: bool,
}

impl PooledSocket {
    /// Whether the session carried an earlier request.
    pub fn is_reused(&self) -> bool {
        self.reused
    }

    /// Return the session for reuse after a complete exchange.
    pub fn release(self) {
        let PooledSocket {
            mut socket, slot, ..
        } = self;
        socket.set_idle();
        if socket.session().is_closed() {
            return;
        }
        let key = slot.key.clone();
        slot.disarm().put_idle(&key, socket);
    }
}

impl Deref for PooledSocket {
    type Target = ClientSocket;

    fn deref(&self) -> &ClientSocket {
        &self.socket
    }
}

impl DerefMut for PooledSocket {
    fn deref_mut(&mut self) -> &mut ClientSocket {
        &mut self.socket
    }
}

/// A reserved slot for a session being established.
#[derive(Debug)]
pub struct ConnectSlot {
    slot: SlotGuard,
}

impl ConnectSlot {
    pub fn into_http1(self, socket: ClientSocket) -> PooledSocket {
        PooledSocket {
            socket,
            slot: self.slot,
            reused: false,
        }
    }

    /// Publish a new HTTP/2 session so other callers can share it.
    pub fn into_http2(self, conn: H2Connection) -> H2Connection {
        let key = self.slot.key.clone();
        self.slot.disarm().add_h2(&key, conn.clone());
        conn
    }
}
