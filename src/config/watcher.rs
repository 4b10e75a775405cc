//! Hot reload of the failover configuration file.
//!
//! A reload rebuilds the registry and resets every circuit, so only a file whose
//! parsed, validated content differs from the last published config is sent on.
//! Metadata-only events (chmod, touch) never trigger a reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::FailoverConfig;

/// What a single file event led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Not a content change.
    Ignored,
    /// Content parsed to the config already in use.
    Unchanged,
    /// Failed to load or validate; the current config stays.
    Rejected,
    Published,
    /// Nobody is listening for updates anymore.
    Closed,
}

/// Watches one configuration file and publishes changed configs.
pub struct ConfigWatcher {
    path: PathBuf,
    current: FailoverConfig,
    update_tx: mpsc::UnboundedSender<FailoverConfig>,
}

impl ConfigWatcher {
    /// `current` is the config already in use; reloads equal to it are dropped.
    pub fn new(path: &Path, current: FailoverConfig) -> (Self, mpsc::UnboundedReceiver<FailoverConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                current,
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(mut self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    self.handle(&event.kind);
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }

    fn handle(&mut self, kind: &EventKind) -> ReloadOutcome {
        if !is_content_change(kind) {
            tracing::trace!(kind = ?kind, "Config event ignored");
            return ReloadOutcome::Ignored;
        }

        let loaded = match load_config(&self.path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(path = ?self.path, error = %e, "Config reload rejected, keeping current configuration");
                return ReloadOutcome::Rejected;
            }
        };

        if loaded == self.current {
            tracing::debug!(path = ?self.path, "Config file touched but unchanged");
            return ReloadOutcome::Unchanged;
        }

        if self.update_tx.send(loaded.clone()).is_err() {
            tracing::warn!(path = ?self.path, "Config update receiver dropped");
            return ReloadOutcome::Closed;
        }

        tracing::info!(
            path = ?self.path,
            addresses = loaded.cluster.addresses.len(),
            "Config change published"
        );
        self.current = loaded;
        ReloadOutcome::Published
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};
    use tokio::time::timeout;

    const PRIMARY_FIRST: &str = r#"
[cluster]
addresses = ["http://primary:8080", "http://backup:8080"]
"#;

    const BACKUP_FIRST: &str = r#"
[cluster]
addresses = ["http://backup:8080", "http://primary:8080"]
"#;

    const NO_ADDRESSES: &str = r#"
[cluster]
addresses = []
"#;

    fn temp_config(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("failover-watch-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn watcher_for(contents: &str) -> (PathBuf, ConfigWatcher, mpsc::UnboundedReceiver<FailoverConfig>) {
        let path = temp_config(contents);
        let current = parse_config(contents).unwrap();
        let (watcher, rx) = ConfigWatcher::new(&path, current);
        (path, watcher, rx)
    }

    const DATA: EventKind = EventKind::Modify(ModifyKind::Data(DataChange::Content));

    #[test]
    fn test_event_filter() {
        assert!(is_content_change(&DATA));
        assert!(is_content_change(&EventKind::Create(CreateKind::File)));
        assert!(!is_content_change(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions))));
        assert!(!is_content_change(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime))));
        assert!(!is_content_change(&EventKind::Remove(RemoveKind::File)));
    }

    #[test]
    fn test_handle_publishes_only_real_changes() {
        let (path, mut watcher, mut rx) = watcher_for(PRIMARY_FIRST);

        assert_eq!(watcher.handle(&DATA), ReloadOutcome::Unchanged);
        assert_eq!(
            watcher.handle(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions))),
            ReloadOutcome::Ignored
        );
        assert!(rx.try_recv().is_err());

        std::fs::write(&path, BACKUP_FIRST).unwrap();
        assert_eq!(watcher.handle(&DATA), ReloadOutcome::Published);
        assert_eq!(rx.try_recv().unwrap().cluster.addresses[0], "http://backup:8080");

        // second event for the same write
        assert_eq!(watcher.handle(&DATA), ReloadOutcome::Unchanged);
        assert!(rx.try_recv().is_err());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_handle_rejects_invalid_file() {
        let (path, mut watcher, mut rx) = watcher_for(PRIMARY_FIRST);

        std::fs::write(&path, NO_ADDRESSES).unwrap();
        assert_eq!(watcher.handle(&DATA), ReloadOutcome::Rejected);
        std::fs::write(&path, "[cluster\n").unwrap();
        assert_eq!(watcher.handle(&DATA), ReloadOutcome::Rejected);
        assert!(rx.try_recv().is_err());

        // restoring the original content is not a change either
        std::fs::write(&path, PRIMARY_FIRST).unwrap();
        assert_eq!(watcher.handle(&DATA), ReloadOutcome::Unchanged);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_handle_reports_closed_receiver() {
        let (path, mut watcher, rx) = watcher_for(PRIMARY_FIRST);
        drop(rx);

        std::fs::write(&path, BACKUP_FIRST).unwrap();
        assert_eq!(watcher.handle(&DATA), ReloadOutcome::Closed);

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_watch_publishes_changed_file() {
        let (path, watcher, mut rx) = watcher_for(PRIMARY_FIRST);
        let _handle = watcher.run().unwrap();

        std::fs::write(&path, BACKUP_FIRST).unwrap();
        let update = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(update.cluster.addresses[0], "http://backup:8080");

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_watch_keeps_config_on_invalid_file() {
        let (path, watcher, mut rx) = watcher_for(PRIMARY_FIRST);
        let _handle = watcher.run().unwrap();

        std::fs::write(&path, NO_ADDRESSES).unwrap();
        assert!(timeout(Duration::from_millis(500), rx.recv()).await.is_err());

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_watch_ignores_unchanged_file() {
        let (path, watcher, mut rx) = watcher_for(PRIMARY_FIRST);
        let _handle = watcher.run().unwrap();

        std::fs::write(&path, PRIMARY_FIRST).unwrap();
        let mut permissions = std::fs::metadata(&path).unwrap().permissions();
        permissions.set_readonly(true);
        std::fs::set_permissions(&path, permissions).unwrap();

        assert!(timeout(Duration::from_millis(500), rx.recv()).await.is_err());

        let mut permissions = std::fs::metadata(&path).unwrap().permissions();
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        std::fs::set_permissions(&path, permissions).unwrap();
        std::fs::remove_file(&path).unwrap();
    }
}
