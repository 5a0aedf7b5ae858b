use crate::schema::Config;
use arc_swap::ArcSwap;
use std::{path::PathBuf, sync::Arc};

/// Watches a configuration file for changes and hot-reloads on modification.
pub struct ConfigWatcher {
    /// Current configuration, atomically swappable.
    current: Arc<ArcSwap<Config>>,
    /// Path to the configuration file.
    path: PathBuf,
}

impl ConfigWatcher {
    /// Creates a new watcher from a file path, loading the initial configuration immediately.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the configuration file cannot be read or parsed.
    #[allow(clippy::result_large_err)]
    pub fn new(path: PathBuf) -> Result<Self, figment::Error> {
        let config = Config::load(Some(&path))?;
        Ok(Self {
            current: Arc::new(ArcSwap::from_pointee(config)),
            path,
        })
    }

    /// Returns a snapshot of the current configuration.
    #[must_use]
    pub fn load(&self) -> arc_swap::Guard<Arc<Config>> {
        self.current.load()
    }

    /// Returns a shareable `ArcSwap` handle (for use in axum `AppState`).
    #[must_use]
    pub fn arc(&self) -> Arc<ArcSwap<Config>> {
        Arc::clone(&self.current)
    }

    /// Reloads the configuration from disk.
    ///
    /// On error the previous configuration stays in place.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the configuration file cannot be read or parsed.
    #[allow(clippy::result_large_err)]
    pub fn reload(&self) -> Result<(), figment::Error> {
        let new_config = Config::load(Some(&self.path))?;
        self.current.store(Arc::new(new_config));
        Ok(())
    }

    /// Starts a background tokio task that reloads the configuration whenever
    /// the file is written.
    ///
    /// # Errors
    ///
    /// Returns a [`notify::Error`] if the OS watcher cannot be created or the
    /// file cannot be registered.
    pub fn watch(self: Arc<Self>) -> notify::Result<()> {
        use notify::{EventKind, RecursiveMode, Watcher as _};

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res
                && matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
            {
                let _ = tx.send(());
            }
        })?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tokio::spawn(async move {
            // The watcher lives as long as the task.
            let _watcher = watcher;
            while rx.recv().await.is_some() {
                match self.reload() {
                    Ok(()) => tracing::info!(path = %self.path.display(), "configuration reloaded"),
                    Err(e) => tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "configuration reload failed, keeping previous"
                    ),
                }
            }
        });
        Ok(())
    }
}
