//! Bounded multiplexor of idle connections for a single endpoint.
//!
//! Grounded in `examples/original_source/memcache/connection.py`'s `Pool`
//! (blocking, `queue.Queue` + `threading.Lock`) and `async_connection.py`'s
//! `AsyncPool` (`asyncio.Queue` + `asyncio.Lock`): non-blocking dequeue,
//! then grow-under-lock while under `max_size`, then a blocking/suspending
//! dequeue with a timeout. Hand-rolled rather than built on a generic pool
//! crate (`deadpool`, as `crestonbunch-rsmc` uses) because this three-step
//! acquire algorithm is exactly what spec pins down, not a generic recycle
//! policy — a generic pool's "create or recycle" abstraction doesn't
//! distinguish the non-blocking-dequeue / grow-under-lock / blocking-wait
//! phases spec requires to be observable in that order.
//!
//! Release is unconditional in both variants: a `BROKEN` connection is
//! discarded and `size` decremented; anything else goes back on the FIFO.
//! The Python original does not actually guarantee this (an exception
//! between `yield` and `put` in its context manager skips the release
//! entirely, leaking `size`) — the Rust port closes that gap with an RAII
//! guard, since "release is unconditional" is a named invariant here, not
//! an implementation detail left to chance.

pub mod blocking;
pub mod cooperative;
