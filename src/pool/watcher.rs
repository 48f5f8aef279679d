//! Hot-reload watcher for the device pool file.
//!
//! Watches the pool file's directory with `notify` and reloads the cached
//! [`DevicePool`] on change. A failed reload keeps the previous pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::RwLock;
use tracing::{info, info_span, warn};

use crate::models::device::DevicePool;
use crate::pool::loader::DevicePoolLoader;
use crate::{AppError, Result};

/// Shared, hot-reloaded device pool.
pub type DeviceCache = Arc<RwLock<DevicePool>>;

/// Keeps the device cache in sync with the pool file.
pub struct DevicePoolWatcher {
    path: PathBuf,
    cache: DeviceCache,
    // Held to keep the OS watch alive.
    _watcher: RecommendedWatcher,
}

impl DevicePoolWatcher {
    /// Load the pool and start watching it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Device` if the initial load fails or the watcher
    /// cannot be created.
    pub fn start(path: &Path) -> Result<Self> {
        let _span = info_span!("device_pool_watcher", path = %path.display()).entered();

        let cache: DeviceCache = Arc::new(RwLock::new(DevicePoolLoader::load(path)?));

        let file_name = path.file_name().map(ToOwned::to_owned);
        let reload_path = path.to_path_buf();
        let reload_cache = Arc::clone(&cache);

        let mut watcher = notify::recommended_watcher(
            move |result: std::result::Result<Event, notify::Error>| match result {
                Ok(event) => {
                    let relevant = matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) && event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == file_name.as_deref());
                    if !relevant {
                        return;
                    }
                    match DevicePoolLoader::load(&reload_path) {
                        Ok(pool) => {
                            let count = pool.devices.len();
                            // notify callbacks run on a plain thread, outside the runtime.
                            *reload_cache.blocking_write() = pool;
                            info!(devices = count, "device pool reloaded");
                        }
                        Err(err) => warn!(%err, "failed to reload device pool, keeping previous"),
                    }
                }
                Err(err) => warn!(%err, "device pool watcher error"),
            },
        )
        .map_err(|err| AppError::Device(format!("failed to create watcher: {err}")))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|err| AppError::Device(format!("failed to watch {}: {err}", dir.display())))?;

        info!("watching device pool");
        Ok(Self {
            path: path.to_path_buf(),
            cache,
            _watcher: watcher,
        })
    }

    /// The shared cache updated by this watcher.
    #[must_use]
    pub fn cache(&self) -> DeviceCache {
        Arc::clone(&self.cache)
    }

    /// Force a reload from disk.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Device` if the file cannot be parsed; the cache is
    /// left unchanged.
    pub async fn reload(&self) -> Result<()> {
        let pool = DevicePoolLoader::load(&self.path)?;
        *self.cache.write().await = pool;
        Ok(())
    }
}
