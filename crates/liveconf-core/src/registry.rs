//! Named configuration registry
//!
//! The registry maps a configuration name to its current `Document`. Each
//! entry holds its document behind an `ArcSwap`, so a reload replaces the
//! whole snapshot with one atomic store and readers never see a partially
//! updated configuration.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use arc_swap::ArcSwap;
use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::fileutil;
use crate::monitor::{MonitorOptions, ReloadMonitor};

/// Callback invoked with the configuration name after a reload
pub type ChangeCallback = Arc<dyn Fn(&str) + Send + Sync>;

struct RegistryEntry {
    document: ArcSwap<Document>,
    on_change: Option<ChangeCallback>,
}

/// Registry of named, hot-reloadable configurations
pub struct ConfigRegistry {
    /// Entries in registration order; never removed
    entries: RwLock<IndexMap<String, Arc<RegistryEntry>>>,
    /// Returned for unknown names
    empty: Arc<Document>,
    monitor: ReloadMonitor,
}

impl Default for ConfigRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigRegistry {
    /// Create an empty registry with the default monitor interval
    pub fn new() -> Self {
        Self::with_monitor_options(MonitorOptions::default())
    }

    /// Create an empty registry with custom monitor options
    pub fn with_monitor_options(options: MonitorOptions) -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            empty: Arc::new(Document::empty()),
            monitor: ReloadMonitor::new(options),
        }
    }

    /// Register a configuration file under `name`
    ///
    /// The first registration of a name wins: registering it again does
    /// nothing, even with a different path or callback.
    pub fn register(
        &self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
        on_change: Option<ChangeCallback>,
    ) -> Result<()> {
        let name = name.into();
        let path = path.as_ref();

        if !fileutil::is_file(path)? {
            return Err(Error::file_not_found(path));
        }
        if self.contains(&name) {
            log::debug!("Configuration '{}' already registered, ignoring", name);
            return Ok(());
        }

        let document = Document::load(path)?;

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.entry(name) {
            Entry::Occupied(slot) => {
                log::debug!("Configuration '{}' already registered, ignoring", slot.key());
            }
            Entry::Vacant(slot) => {
                log::info!(
                    "Registered configuration '{}' from '{}'",
                    slot.key(),
                    path.display()
                );
                slot.insert(Arc::new(RegistryEntry {
                    document: ArcSwap::from_pointee(document),
                    on_change,
                }));
            }
        }
        Ok(())
    }

    /// Current document for `name`, or an empty document if unknown
    pub fn get(&self, name: &str) -> Arc<Document> {
        self.read_entries()
            .get(name)
            .map(|entry| entry.document.load_full())
            .unwrap_or_else(|| Arc::clone(&self.empty))
    }

    /// Current document of the first registered configuration
    ///
    /// Meant for processes with a single configuration; returns an empty
    /// document when nothing is registered.
    pub fn get_default(&self) -> Arc<Document> {
        self.read_entries()
            .first()
            .map(|(_, entry)| entry.document.load_full())
            .unwrap_or_else(|| Arc::clone(&self.empty))
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<String> {
        self.read_entries().keys().cloned().collect()
    }

    /// Check if a configuration is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.read_entries().contains_key(name)
    }

    /// Number of registered configurations
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    /// Check if no configuration is registered
    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// Reload every configuration whose source content changed
    ///
    /// Sources that cannot be fingerprinted or loaded are logged and left
    /// untouched until the next scan. Changed entries get a fresh document
    /// and their callback is invoked. Returns the reloaded names.
    ///
    /// Safe to call while other scans run: an entry is swapped, and its
    /// callback invoked, by at most one of the scans that saw the same
    /// stale document.
    pub fn reload_changed(&self) -> Vec<String> {
        let snapshot: Vec<(String, Arc<RegistryEntry>)> = self
            .read_entries()
            .iter()
            .map(|(name, entry)| (name.clone(), Arc::clone(entry)))
            .collect();

        let mut updates = Vec::new();
        for (name, entry) in snapshot {
            let current = entry.document.load_full();
            let Some(source) = current.source_path() else {
                continue;
            };

            let fingerprint = match fileutil::fingerprint(source) {
                Ok(fingerprint) => fingerprint,
                Err(e) => {
                    log::warn!("Cannot fingerprint configuration '{}': {}", name, e);
                    continue;
                }
            };
            if fingerprint == current.fingerprint() {
                continue;
            }

            match Document::load(source) {
                Ok(document) => updates.push((name, entry, current, document)),
                Err(e) => log::warn!("Cannot reload configuration '{}': {}", name, e),
            }
        }

        let mut reloaded = Vec::with_capacity(updates.len());
        for (name, entry, current, document) in updates {
            // Only the scan that still sees the snapshot it compared against may swap
            let previous = entry.document.compare_and_swap(&current, Arc::new(document));
            if !Arc::ptr_eq(&*previous, &current) {
                log::debug!("Configuration '{}' already reloaded by another scan", name);
                continue;
            }
            log::info!("Reloaded configuration '{}'", name);
            if let Some(on_change) = &entry.on_change {
                on_change(&name);
            }
            reloaded.push(name);
        }
        reloaded
    }

    /// Start the background reload monitor
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_monitor(self: &Arc<Self>) -> Result<()> {
        self.monitor.start(Arc::downgrade(self))
    }

    /// Stop the background reload monitor; it cannot be started again
    pub fn stop_monitor(&self) {
        self.monitor.stop();
    }

    /// Check if the background reload monitor is running
    pub fn monitor_running(&self) -> bool {
        self.monitor.is_running()
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, IndexMap<String, Arc<RegistryEntry>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }
}
