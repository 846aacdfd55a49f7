//! Background reload monitor
//!
//! The monitor is a small state machine: `Idle -> Running -> Stopped`.
//! While running, a tokio task wakes up every `interval`, asks the registry
//! to re-fingerprint its sources and swap in fresh documents for the ones
//! that changed. Stopping is terminal.

use std::sync::{Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::registry::ConfigRegistry;

/// Default time between two reload scans
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Reload monitor options
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Time between two reload scans
    pub interval: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl MonitorOptions {
    /// Options with a custom scan interval
    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }
}

#[derive(Debug)]
enum MonitorState {
    Idle,
    Running(CancellationToken),
    Stopped,
}

/// Periodically reloads changed configuration sources
#[derive(Debug)]
pub struct ReloadMonitor {
    options: MonitorOptions,
    state: Mutex<MonitorState>,
}

impl ReloadMonitor {
    /// Create an idle monitor
    pub fn new(options: MonitorOptions) -> Self {
        Self {
            options,
            state: Mutex::new(MonitorState::Idle),
        }
    }

    /// Time between two reload scans
    pub fn interval(&self) -> Duration {
        self.options.interval
    }

    /// Check if the background task is running
    pub fn is_running(&self) -> bool {
        matches!(*self.lock_state(), MonitorState::Running(_))
    }

    /// Check if the monitor has been stopped
    pub fn is_stopped(&self) -> bool {
        matches!(*self.lock_state(), MonitorState::Stopped)
    }

    /// Spawn the reload task on the current tokio runtime
    ///
    /// Starting a running monitor does nothing. A stopped monitor cannot be
    /// restarted.
    pub fn start(&self, registry: Weak<ConfigRegistry>) -> Result<()> {
        let mut state = self.lock_state();
        match *state {
            MonitorState::Running(_) => {
                log::debug!("Reload monitor already running");
                return Ok(());
            }
            MonitorState::Stopped => {
                return Err(Error::monitor("Reload monitor has been stopped")
                    .with_help("Create a new registry to monitor again"));
            }
            MonitorState::Idle => {}
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::monitor(format!("No tokio runtime available: {}", e)))?;

        let token = CancellationToken::new();
        runtime.spawn(run(registry, self.options.interval, token.clone()));
        *state = MonitorState::Running(token);

        log::debug!(
            "Reload monitor started (interval {:?})",
            self.options.interval
        );
        Ok(())
    }

    /// Signal the reload task to exit
    ///
    /// The registry keeps whatever documents it last installed.
    pub fn stop(&self) {
        let mut state = self.lock_state();
        let previous = std::mem::replace(&mut *state, MonitorState::Stopped);
        if let MonitorState::Running(token) = previous {
            token.cancel();
            log::debug!("Reload monitor stopped");
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ReloadMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(registry: Weak<ConfigRegistry>, interval: Duration, token: CancellationToken) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let Some(registry) = registry.upgrade() else {
            break;
        };

        // Fingerprinting and loading are blocking file I/O
        match tokio::task::spawn_blocking(move || registry.reload_changed()).await {
            Ok(reloaded) if !reloaded.is_empty() => {
                log::debug!("Reload scan swapped {} configuration(s)", reloaded.len());
            }
            Ok(_) => {}
            Err(e) => log::error!("Reload scan aborted: {}", e),
        }
    }
}
