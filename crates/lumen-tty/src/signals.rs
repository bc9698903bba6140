#![forbid(unsafe_code)]

//! Signal plumbing: window-size notifications and cooperative shutdown.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGWINCH};
use signal_hook::iterator::Signals;

// ── Shutdown ─────────────────────────────────────────────────────────────

/// Cooperative cancellation flag shared between a read loop and whoever
/// wants it to stop.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    flag: Arc<AtomicBool>,
}

impl ShutdownToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Cancel this token on SIGINT, SIGTERM or SIGHUP.
    ///
    /// The signals no longer terminate the process once registered; the
    /// read loop is expected to notice the token and unwind, restoring the
    /// terminal on the way out.
    ///
    /// # Errors
    ///
    /// Returns the registration error from the signal library.
    pub fn install_signal_handlers(&self) -> io::Result<()> {
        for sig in [SIGINT, SIGTERM, SIGHUP] {
            signal_hook::flag::register(sig, Arc::clone(&self.flag))?;
        }
        lumen_core::debug!("shutdown signal handlers installed");
        Ok(())
    }
}

// ── Resize ───────────────────────────────────────────────────────────────

/// Records SIGWINCH arrivals on a background thread.
///
/// Bursts coalesce into a single pending notification; the size itself is
/// re-queried from the device when the notification is consumed.
pub struct ResizeWatcher {
    pending: Arc<AtomicBool>,
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl ResizeWatcher {
    /// Start watching for SIGWINCH.
    ///
    /// # Errors
    ///
    /// Returns the registration error from the signal library.
    pub fn new() -> io::Result<Self> {
        let mut signals = Signals::new([SIGWINCH]).map_err(io::Error::other)?;
        let handle = signals.handle();
        let pending = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&pending);
        let thread = std::thread::spawn(move || {
            for _ in signals.forever() {
                flag.store(true, Ordering::SeqCst);
            }
        });

        Ok(Self {
            pending,
            handle,
            thread: Some(thread),
        })
    }

    /// Consume the pending notification, if any.
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }
}

impl Drop for ResizeWatcher {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl std::fmt::Debug for ResizeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResizeWatcher")
            .field("pending", &self.is_pending())
            .finish_non_exhaustive()
    }
}
