//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GuardConfig;

/// Watches the config file and sends each successfully reloaded config.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GuardConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GuardConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    tracing::info!(path = ?path, "Config file change detected, reloading");
                    match load_config(&path) {
                        Ok(new_config) => {
                            let _ = tx.send(new_config);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Names of the sections that differ and only take effect after a restart.
pub fn restart_required(current: &GuardConfig, next: &GuardConfig) -> Vec<&'static str> {
    let sections: [(&'static str, String, String); 9] = [
        ("listener", fmt(&current.listener), fmt(&next.listener)),
        ("timeouts", fmt(&current.timeouts), fmt(&next.timeouts)),
        ("token", fmt(&current.token), fmt(&next.token)),
        ("signature", fmt(&current.signature), fmt(&next.signature)),
        ("encryption", fmt(&current.encryption), fmt(&next.encryption)),
        ("rate_limit", fmt(&current.rate_limit), fmt(&next.rate_limit)),
        ("security", fmt(&current.security), fmt(&next.security)),
        ("cors", fmt(&current.cors), fmt(&next.cors)),
        ("observability", fmt(&current.observability), fmt(&next.observability)),
    ];
    sections
        .into_iter()
        .filter(|(_, a, b)| a != b)
        .map(|(name, _, _)| name)
        .collect()
}

fn fmt<T: std::fmt::Debug>(value: &T) -> String {
    format!("{value:?}")
}
