use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cooperative cancellation token.
///
/// In-flight work observes the flag at suspension points and well-defined
/// checkpoints; setting it never interrupts anything mid-step.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    flag: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Rearms the flag for the next batch of work.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
