//! Context pool: a bounded, thread-safe pool of reusable
//! inference contexts, or DB connections; the pool is generic over `T`,
//! reused for the embedding pool, the chat pool, and the DB connection
//! pool. FIFO-fair acquire via a condvar-guarded queue, lazy growth up to
//! `max_size`, shrink-on-release down to `min_size`.

use crate::error::RagError;
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// A slot's lifecycle: *uninitialized → idle → acquired → (idle | disposed)*.
struct PoolState<T> {
    idle: VecDeque<T>,
    live_count: usize,
    shutting_down: bool,
    /// Monotonically increasing ticket counter for FIFO fairness.
    next_ticket: u64,
    /// Smallest ticket currently allowed to proceed.
    serving_ticket: u64,
}

/// Bounded pool of prepared contexts of type `T`. One pool per model (or
/// per connection kind); `name` is used only in error messages and logs.
pub struct Pool<T> {
    name: &'static str,
    min_size: usize,
    max_size: usize,
    create: Box<dyn Fn() -> Result<T> + Send + Sync>,
    /// Optional health probe run before a released context is returned to
    /// idle; a failing context is disposed instead.
    healthy: Box<dyn Fn(&T) -> bool + Send + Sync>,
    state: Mutex<PoolState<T>>,
    condvar: Condvar,
}

impl<T> Pool<T> {
    /// Create a pool and eagerly fill it to `min_size`. A creation failure
    /// before reaching `min_size` is fatal at pool start.
    pub fn new(
        name: &'static str,
        min_size: usize,
        max_size: usize,
        create: impl Fn() -> Result<T> + Send + Sync + 'static,
    ) -> Result<Arc<Self>> {
        Self::new_with_health(name, min_size, max_size, create, |_| true)
    }

    pub fn new_with_health(
        name: &'static str,
        min_size: usize,
        max_size: usize,
        create: impl Fn() -> Result<T> + Send + Sync + 'static,
        healthy: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Result<Arc<Self>> {
        assert!(min_size <= max_size, "pool '{name}': min_size must be <= max_size");

        let mut idle = VecDeque::with_capacity(min_size);
        for _ in 0..min_size {
            let ctx = create().map_err(|source| RagError::PoolStartup { pool: name, source })?;
            idle.push_back(ctx);
        }

        let pool = Self {
            name,
            min_size,
            max_size,
            create: Box::new(create),
            healthy: Box::new(healthy),
            state: Mutex::new(PoolState {
                live_count: min_size,
                idle,
                shutting_down: false,
                next_ticket: 0,
                serving_ticket: 0,
            }),
            condvar: Condvar::new(),
        };
        Ok(Arc::new(pool))
    }

    /// Block until a context is available, creating a new one if the pool
    /// hasn't reached `max_size` and no idle context is free. FIFO-fair:
    /// waiters are served in arrival order.
    pub fn acquire(&self) -> Result<T> {
        let mut state = self.state.lock().unwrap();
        if state.shutting_down {
            return Err(RagError::PoolShutDown { pool: self.name }.into());
        }

        let my_ticket = state.next_ticket;
        state.next_ticket += 1;

        loop {
            if state.shutting_down {
                return Err(RagError::PoolShutDown { pool: self.name }.into());
            }
            let my_turn = my_ticket == state.serving_ticket;
            if my_turn {
                if let Some(ctx) = state.idle.pop_front() {
                    state.serving_ticket += 1;
                    self.condvar.notify_all();
                    return Ok(ctx);
                }
                if state.live_count < self.max_size {
                    state.live_count += 1;
                    state.serving_ticket += 1;
                    self.condvar.notify_all();
                    drop(state);
                    return (self.create)().map_err(|e| {
                        let mut state = self.state.lock().unwrap();
                        state.live_count = state.live_count.saturating_sub(1);
                        self.condvar.notify_all();
                        e
                    });
                }
            }
            state = self.condvar.wait(state).unwrap();
        }
    }

    /// Return a context to the idle pool. A context failing its health
    /// probe is disposed and not returned to idle (and a replacement is
    /// created if that drops the pool below `min_size`).
    pub fn release(&self, ctx: T) {
        let mut state = self.state.lock().unwrap();
        if state.shutting_down {
            state.live_count = state.live_count.saturating_sub(1);
            self.condvar.notify_all();
            return;
        }

        if (self.healthy)(&ctx) {
            state.idle.push_back(ctx);
        } else {
            state.live_count = state.live_count.saturating_sub(1);
            if state.live_count < self.min_size {
                drop(state);
                if let Ok(replacement) = (self.create)() {
                    let mut state = self.state.lock().unwrap();
                    state.idle.push_back(replacement);
                    state.live_count += 1;
                }
                self.condvar.notify_all();
                return;
            }
        }
        self.condvar.notify_all();
    }

    /// Refuse further acquires, wait briefly for outstanding releases, and
    /// dispose all contexts.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        state.shutting_down = true;
        self.condvar.notify_all();

        // Best-effort drain: wait for in-flight acquires to release.
        let deadline = Duration::from_secs(5);
        let (mut state2, _) = self
            .condvar
            .wait_timeout_while(state, deadline, |s| s.idle.len() < s.live_count)
            .unwrap();
        state2.idle.clear();
        state2.live_count = 0;
    }

    pub fn live_count(&self) -> usize {
        self.state.lock().unwrap().live_count
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

/// RAII guard returning a context to its pool on drop, convenient for
/// worker code that must release even on an early `?` return.
pub struct Lease<T> {
    ctx: Option<T>,
    pool: Arc<Pool<T>>,
}

impl<T> Lease<T> {
    pub fn acquire(pool: Arc<Pool<T>>) -> Result<Self> {
        let ctx = pool.acquire()?;
        Ok(Self { ctx: Some(ctx), pool })
    }

    pub fn get(&self) -> &T {
        self.ctx.as_ref().expect("context taken before drop")
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.ctx.as_mut().expect("context taken before drop")
    }
}

impl<T> Drop for Lease<T> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.pool.release(ctx);
        }
    }
}
