use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::connection::cooperative::CooperativeConnection;
use crate::connection::Credentials;
use crate::endpoint::Endpoint;
use crate::error::Error;

struct Shared {
    idle: Mutex<VecDeque<CooperativeConnection>>,
    size: Mutex<usize>,
    notify: Notify,
}

/// The `tokio` mirror of [`crate::pool::blocking::BlockingPool`]. The idle
/// FIFO and size counter are guarded by plain `std::sync::Mutex`es — they
/// are only ever held across a pop/push, never across an `.await` — while
/// waiting for a slot to free up suspends on a [`Notify`] instead of
/// blocking an OS thread.
pub struct CooperativePool {
    endpoint: Endpoint,
    credentials: Option<Credentials>,
    max_size: usize,
    timeout: Duration,
    shared: Shared,
}

impl CooperativePool {
    pub fn new(
        endpoint: Endpoint,
        credentials: Option<Credentials>,
        max_size: usize,
        timeout: Duration,
    ) -> Self {
        CooperativePool {
            endpoint,
            credentials,
            max_size,
            timeout,
            shared: Shared {
                idle: Mutex::new(VecDeque::new()),
                size: Mutex::new(0),
                notify: Notify::new(),
            },
        }
    }

    /// Acquire a connection, suspending at each step rather than blocking
    /// an OS thread. Cancelling the returned future before it resolves
    /// never leaves a connection checked out: nothing is removed from the
    /// idle queue until a slot is actually handed back to the caller.
    pub async fn acquire(&self) -> Result<PooledConnection<'_>, Error> {
        if let Some(connection) = self.shared.idle.lock().unwrap().pop_front() {
            return Ok(PooledConnection::new(self, connection));
        }

        {
            let mut size = self.shared.size.lock().unwrap();
            if *size < self.max_size {
                *size += 1;
                drop(size);
                debug!(endpoint = %self.endpoint, "growing pool");
                let connection =
                    CooperativeConnection::new(self.endpoint.clone(), self.credentials.clone());
                return Ok(PooledConnection::new(self, connection));
            }
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let notified = self.shared.notify.notified();
            if let Some(connection) = self.shared.idle.lock().unwrap().pop_front() {
                return Ok(PooledConnection::new(self, connection));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(endpoint = %self.endpoint, "pool exhausted, timing out");
                return Err(Error::PoolTimeout);
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                warn!(endpoint = %self.endpoint, "pool exhausted, timing out");
                return Err(Error::PoolTimeout);
            }
        }
    }

    fn release(&self, connection: CooperativeConnection) {
        if connection.is_broken() {
            *self.shared.size.lock().unwrap() -= 1;
            return;
        }
        self.shared.idle.lock().unwrap().push_back(connection);
        self.shared.notify.notify_one();
    }
}

/// An acquired connection. Releases itself back to the pool (or discards
/// itself, if `Broken`) unconditionally on drop, matching
/// [`crate::pool::blocking::PooledConnection`]'s guarantee — release does
/// not need to suspend, so an ordinary (non-async) `Drop` impl suffices.
pub struct PooledConnection<'p> {
    pool: &'p CooperativePool,
    connection: Option<CooperativeConnection>,
}

impl<'p> PooledConnection<'p> {
    fn new(pool: &'p CooperativePool, connection: CooperativeConnection) -> Self {
        PooledConnection {
            pool,
            connection: Some(connection),
        }
    }
}

impl Deref for PooledConnection<'_> {
    type Target = CooperativeConnection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.release(connection);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pool_cap_times_out_when_exhausted() {
        let pool = CooperativePool::new(
            Endpoint::new("203.0.113.1", 11211),
            None,
            1,
            Duration::from_millis(50),
        );
        let _held = pool.acquire().await.unwrap();
        let started = Instant::now();
        let err = pool.acquire().await;
        assert!(err.is_err());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
