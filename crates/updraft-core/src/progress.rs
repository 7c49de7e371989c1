use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Receives progress and log lines from a [`Task`] tree.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, fraction: f64);
    fn on_log(&self, line: &str);
}

struct TaskShared {
    cancelled: AtomicBool,
    fraction_bits: AtomicU64,
    lines: Mutex<Vec<String>>,
    sink: Option<Arc<dyn ProgressSink>>,
}

/// Progress handle for one user-visible operation.
///
/// A sub-task maps its own `[0, 1]` range onto a `[lo, hi]` slice of its
/// parent, so nested steps report additive progress without knowing about
/// each other. All handles of a tree share one cancellation flag.
#[derive(Clone)]
pub struct Task {
    shared: Arc<TaskShared>,
    lo: f64,
    hi: f64,
    silent: bool,
}

impl Task {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_sink(sink: Arc<dyn ProgressSink>) -> Self {
        Self::build(Some(sink))
    }

    fn build(sink: Option<Arc<dyn ProgressSink>>) -> Self {
        Self {
            shared: Arc::new(TaskShared {
                cancelled: AtomicBool::new(false),
                fraction_bits: AtomicU64::new(0.0_f64.to_bits()),
                lines: Mutex::new(Vec::new()),
                sink,
            }),
            lo: 0.0,
            hi: 1.0,
            silent: false,
        }
    }

    pub fn sub_task(&self, lo: f64, hi: f64) -> Task {
        let lo = lo.clamp(0.0, 1.0);
        let hi = hi.clamp(lo, 1.0);
        let span = self.hi - self.lo;
        Task {
            shared: Arc::clone(&self.shared),
            lo: self.lo + span * lo,
            hi: self.lo + span * hi,
            silent: self.silent,
        }
    }

    /// Shares cancellation but swallows progress and log output.
    pub fn silent(&self) -> Task {
        Task {
            silent: true,
            ..self.clone()
        }
    }

    pub fn set_progress(&self, fraction: f64) {
        if self.silent {
            return;
        }
        let mapped = self.lo + (self.hi - self.lo) * fraction.clamp(0.0, 1.0);
        self.shared
            .fraction_bits
            .store(mapped.to_bits(), Ordering::SeqCst);
        if let Some(sink) = &self.shared.sink {
            sink.on_progress(mapped);
        }
    }

    /// Fraction of the whole tree, not of this slice.
    pub fn progress(&self) -> f64 {
        f64::from_bits(self.shared.fraction_bits.load(Ordering::SeqCst))
    }

    pub fn log(&self, line: impl Into<String>) {
        if self.silent {
            return;
        }
        let line = line.into();
        if let Some(sink) = &self.shared.sink {
            sink.on_log(&line);
        }
        self.shared
            .lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.shared
            .lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_active(&self) -> bool {
        !self.shared.cancelled.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("lo", &self.lo)
            .field("hi", &self.hi)
            .field("silent", &self.silent)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Cancels a [`Task`] tree from another thread.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<TaskShared>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }
}
