use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::connection::blocking::BlockingConnection;
use crate::connection::Credentials;
use crate::endpoint::Endpoint;
use crate::error::Error;

struct Shared {
    idle: Mutex<VecDeque<BlockingConnection>>,
    not_empty: Condvar,
    size: Mutex<usize>,
}

/// A bounded pool of [`BlockingConnection`]s to a single endpoint.
pub struct BlockingPool {
    endpoint: Endpoint,
    credentials: Option<Credentials>,
    max_size: usize,
    timeout: Duration,
    shared: Shared,
}

impl BlockingPool {
    pub fn new(
        endpoint: Endpoint,
        credentials: Option<Credentials>,
        max_size: usize,
        timeout: Duration,
    ) -> Self {
        BlockingPool {
            endpoint,
            credentials,
            max_size,
            timeout,
            shared: Shared {
                idle: Mutex::new(VecDeque::new()),
                not_empty: Condvar::new(),
                size: Mutex::new(0),
            },
        }
    }

    /// Acquire a connection, guaranteed to be released back to the pool (or
    /// discarded, if broken) when the returned guard is dropped.
    ///
    /// Algorithm: non-blocking dequeue, then grow-under-lock while under
    /// `max_size`, then a timed blocking wait — in that order, matching the
    /// three-step acquire this crate documents as an interop-relevant
    /// invariant.
    pub fn acquire(&self) -> Result<PooledConnection<'_>, Error> {
        if let Some(connection) = self.shared.idle.lock().unwrap().pop_front() {
            return Ok(PooledConnection::new(self, connection));
        }

        {
            let mut size = self.shared.size.lock().unwrap();
            if *size < self.max_size {
                *size += 1;
                drop(size);
                debug!(endpoint = %self.endpoint, "growing pool");
                let connection = BlockingConnection::new(self.endpoint.clone(), self.credentials.clone());
                return Ok(PooledConnection::new(self, connection));
            }
        }

        let deadline = Instant::now() + self.timeout;
        let mut idle = self.shared.idle.lock().unwrap();
        loop {
            if let Some(connection) = idle.pop_front() {
                return Ok(PooledConnection::new(self, connection));
            }
            let now = Instant::now();
            if now >= deadline {
                warn!(endpoint = %self.endpoint, "pool exhausted, timing out");
                return Err(Error::PoolTimeout);
            }
            let (guard, timeout_result) = self
                .shared
                .not_empty
                .wait_timeout(idle, deadline - now)
                .unwrap();
            idle = guard;
            if timeout_result.timed_out() && idle.is_empty() {
                return Err(Error::PoolTimeout);
            }
        }
    }

    fn release(&self, connection: BlockingConnection) {
        if connection.is_broken() {
            *self.shared.size.lock().unwrap() -= 1;
            return;
        }
        self.shared.idle.lock().unwrap().push_back(connection);
        self.shared.not_empty.notify_one();
    }
}

/// An acquired connection. Releases itself back to the pool (or discards
/// itself, if `Broken`) unconditionally on drop — this holds even if the
/// borrowing code panics while holding the guard.
pub struct PooledConnection<'p> {
    pool: &'p BlockingPool,
    connection: Option<BlockingConnection>,
}

impl<'p> PooledConnection<'p> {
    fn new(pool: &'p BlockingPool, connection: BlockingConnection) -> Self {
        PooledConnection {
            pool,
            connection: Some(connection),
        }
    }
}

impl Deref for PooledConnection<'_> {
    type Target = BlockingConnection;

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

    #[test]
    fn pool_cap_times_out_when_exhausted() {
        let pool = BlockingPool::new(
            Endpoint::new("203.0.113.1", 11211), // TEST-NET-3, guaranteed unroutable
            None,
            1,
            Duration::from_millis(50),
        );
        // First acquire grows the pool to its cap and is held open.
        let _held = pool.acquire().unwrap();
        // Second acquire must wait the full timeout and then fail.
        let started = Instant::now();
        let err = pool.acquire();
        assert!(err.is_err());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
