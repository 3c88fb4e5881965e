use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{sampling::Decimation, Error};

/// Cooperative cancellation, polled by every streaming loop.
pub trait Cancel {
    /// Returns true once the caller wants the current read to stop
    fn is_cancelled(&self) -> bool;
}

/// A [`Cancel`] that never fires
#[derive(Debug, Default, Clone, Copy)]
pub struct Never;

impl Cancel for Never {
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl Cancel for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl<F> Cancel for F
where
    F: Fn() -> bool,
{
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// Shareable cancellation flag. Clones observe the same state.
#[derive(Debug, Default, Clone)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a flag that is not yet raised
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag for every clone
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl Cancel for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Per-read context threaded through every payload reader.
#[derive(Clone, Copy)]
pub struct ReadContext<'a> {
    cancel: &'a dyn Cancel,
    decimation: Decimation,
}

impl<'a> ReadContext<'a> {
    /// Creates a context from a cancellation source and a decimation policy
    #[must_use]
    pub const fn new(cancel: &'a dyn Cancel, decimation: Decimation) -> Self {
        Self { cancel, decimation }
    }

    /// The decimation policy used for this read
    #[must_use]
    pub const fn decimation(&self) -> Decimation {
        self.decimation
    }

    /// Polls the cancellation source
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Polls the cancellation source every `stride` iterations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when polled and the caller asked to abort.
    pub fn checkpoint(&self, index: usize, stride: usize) -> Result<(), Error> {
        if index % stride.max(1) == 0 && self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ReadContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadContext")
            .field("cancelled", &self.is_cancelled())
            .field("decimation", &self.decimation)
            .finish()
    }
}
