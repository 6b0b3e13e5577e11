// src/signals.rs
//! Process signals turned into flags the main loop polls between iterations.
//!
//! SIGUSR1 requests a reload of the log file; SIGINT/SIGTERM request a clean
//! shutdown. Handlers never touch the cursor themselves.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use once_cell::sync::OnceCell;

use crate::error::ConfigurationError;

static RELOAD_TARGET: OnceCell<Arc<AtomicU64>> = OnceCell::new();

extern "C" fn on_reload_signal(_: nix::libc::c_int) {
    // Only an atomic add here; anything else is not async-signal-safe
    if let Some(epoch) = RELOAD_TARGET.get() {
        epoch.fetch_add(1, Ordering::SeqCst);
    }
}

/// Pending reload requests, counted as an epoch.
#[derive(Debug, Clone, Default)]
pub struct ReloadHandle {
    epoch: Arc<AtomicU64>,
    seen: Arc<AtomicU64>,
}

impl ReloadHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify_reload(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(epoch, "reload requested");
    }

    /// Consume any requests made since the last call.
    ///
    /// Several signals before the next poll collapse into one reload.
    pub fn take_pending(&self) -> bool {
        let current = self.epoch.load(Ordering::SeqCst);
        self.seen.swap(current, Ordering::SeqCst) != current
    }

    /// Route SIGUSR1 to this handle. Only one handle per process can be bound.
    pub fn install_signal_handler(&self) -> Result<(), ConfigurationError> {
        RELOAD_TARGET
            .set(Arc::clone(&self.epoch))
            .map_err(|_| ConfigurationError::Signal("reload handler already installed".into()))?;

        let action = SigAction::new(
            SigHandler::Handler(on_reload_signal),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        // SAFETY: the handler only performs an atomic add on a value that is
        // set before installation and never replaced.
        unsafe { sigaction(Signal::SIGUSR1, &action) }
            .map_err(|e| ConfigurationError::Signal(format!("SIGUSR1: {}", e)))?;

        tracing::debug!("SIGUSR1 bound to log file reload");
        Ok(())
    }
}

/// Set once a termination signal arrives
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Route SIGINT and SIGTERM to this handle
    pub fn install_signal_handler(&self) -> Result<(), ConfigurationError> {
        let requested = Arc::clone(&self.requested);
        ctrlc::set_handler(move || {
            requested.store(true, Ordering::SeqCst);
        })
        .map_err(|e| ConfigurationError::Signal(e.to_string()))?;
        Ok(())
    }
}

/// Both control channels the supervisor hands to the follower
#[derive(Debug, Clone, Default)]
pub struct Signals {
    pub reload: ReloadHandle,
    pub shutdown: ShutdownHandle,
}

impl Signals {
    /// Handles that no OS signal reaches; tests drive them directly
    pub fn detached() -> Self {
        Self::default()
    }

    /// Bind the process signals. Call at most once per process.
    pub fn install() -> Result<Self, ConfigurationError> {
        let signals = Self::default();
        signals.reload.install_signal_handler()?;
        signals.shutdown.install_signal_handler()?;
        Ok(signals)
    }
}
