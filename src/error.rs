use core::fmt;

/// The slot array for a queue could not be allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("out of memory allocating {capacity} queue slots")]
pub struct AllocError {
    /// Capacity that was requested.
    pub capacity: usize,
}

/// Returned by [`Queue::try_write`](crate::Queue::try_write) when the target
/// slot still holds an item from the previous lap.
#[derive(Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TryWriteError<T> {
    /// The queue is full; the rejected item is handed back.
    #[error("queue is full")]
    Full(T),
}

impl<T> TryWriteError<T> {
    /// Recover the item that could not be enqueued.
    pub fn into_inner(self) -> T {
        match self {
            TryWriteError::Full(item) => item,
        }
    }
}

// Items are not required to be `Debug`.
impl<T> fmt::Debug for TryWriteError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryWriteError::Full(_) => f.write_str("Full(..)"),
        }
    }
}

/// Returned by [`Queue::try_read`](crate::Queue::try_read) when nothing has
/// been published at the read position yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TryReadError {
    /// The queue is empty.
    #[error("queue is empty")]
    Empty,
}
