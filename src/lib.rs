//! glimpse_mpmc - bounded lock-free multi-producer multi-consumer queue
//!
//! A fixed-capacity ring of cache-line sized slots. Every slot carries its own
//! sequence number, and producers and consumers each race on a single cursor
//! with compare-and-swap. No locks are taken anywhere: a full queue makes
//! [`Queue::write`] spin and yield, an empty one does the same to
//! [`Queue::read`].
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use glimpse_mpmc::Queue;
//!
//! let queue = Arc::new(Queue::new(8));
//! let producer = {
//!     let queue = queue.clone();
//!     thread::spawn(move || {
//!         for i in 0..100 {
//!             queue.write(i);
//!         }
//!     })
//! };
//!
//! for i in 0..100 {
//!     assert_eq!(queue.read(), i);
//! }
//! producer.join().unwrap();
//! ```
//!
//! Items are delivered in the order producers claimed their positions, not
//! the order their writes finished. There is no fairness bound: a thread that
//! keeps losing the claim race keeps retrying.
#![warn(missing_docs)]

mod error;
mod queue;
mod slot;
mod sync;
mod trace;

pub use error::{AllocError, TryReadError, TryWriteError};
pub use queue::Queue;
pub use trace::init_tracing;
