//! Telemetry Ring - Bounded Multi-Producer Single-Consumer Hand-off Buffer
//!
//! A fixed-capacity circular FIFO of owned items. Application threads hand
//! finished records in without ever waiting on the consumer; one background
//! consumer removes the oldest items as a contiguous range.
//!
//! # Key Features
//!
//! - Fixed memory: capacity chosen at construction, never grows
//! - Reject-on-full overflow policy: the incoming item is handed back,
//!   queued items are never overwritten
//! - Ownership hand-off through an atomic slot exchange (`Box<T>` in a
//!   lock-free `AtomicCell`)
//! - Cursor bookkeeping under a tiny spin lock with adaptive backoff
//! - Range consumption: one callback per drained range, FIFO order
//!
//! # Example
//!
//! ```
//! use telemetry_ring::BoundedRingBuffer;
//!
//! let buffer = BoundedRingBuffer::<u64>::new(4);
//!
//! // Handle-style hand-off: the Option is emptied on success
//! let mut item = Some(Box::new(42));
//! assert!(buffer.add(&mut item));
//! assert!(item.is_none());
//!
//! // By-value hand-off
//! buffer.try_push(Box::new(43)).unwrap();
//!
//! // Drain the oldest items
//! let mut drained = Vec::new();
//! buffer.consume(10, |range| {
//!     drained.extend(range.drain().map(|item| *item));
//! });
//! assert_eq!(drained, vec![42, 43]);
//! ```

mod invariants;
mod range;
mod ring;
mod slot;
mod spin;

pub use range::{ConsumeRange, PeekRange};
pub use ring::BoundedRingBuffer;
pub use slot::Slot;
