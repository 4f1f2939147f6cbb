// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Filesystem Watcher: a recursive `notify` watch over a user
//! workspace, debounced and filtered before anything reaches the Event
//! Bus.
//!
//! Native notify events are coalesced on a short timer so a burst of
//! writes to the same path (an editor's save-then-fsync dance, a `git
//! checkout`) produces one `SystemEvent::FileChanged`, not a dozen.
//! Two basename classes get special handling on top of the generic
//! `file:changed` event: a small set of trigger files that mean
//! "re-derive the system index", and any `conversations/<id>/reply.txt`,
//! which the Reply Auto-Injector consumes separately.

use crate::error::WatcherError;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use orch_core::{EventBus, FileChangeKind, SystemEvent};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Hidden directories that are still worth watching.
const HIDDEN_DIR_ALLOWLIST: &[&str] = &[".claude", ".engine"];

/// Basenames whose change means "the system index may be stale".
const TRIGGER_BASENAMES: &[&str] = &[
    "LIFE-SPEC.md",
    "APP-SPEC.md",
    "SYSTEM-SPEC.md",
    "manifest.yaml",
    "role.md",
];

/// Directories never worth descending into even though they're not
/// dot-prefixed.
const BUILD_CACHE_DIRS: &[&str] = &["target", "node_modules", ".git"];

#[derive(Debug, Clone, Copy)]
pub struct WatcherConfig {
    pub debounce: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
        }
    }
}

/// A filtered, debounced change ready for a consumer loop to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileWatchEvent {
    /// Plain change under the watched root; already published to the bus.
    Generic { kind: FileChangeKind, path: PathBuf },
    /// One of [`TRIGGER_BASENAMES`] changed — the caller should refresh
    /// the system index.
    IndexTrigger { path: PathBuf },
    /// `conversations/<id>/reply.txt` changed — hand off to the Reply
    /// Auto-Injector.
    Reply {
        conversation_id: String,
        path: PathBuf,
    },
}

/// Returns `false` for paths that should never reach a subscriber:
/// build caches, atomic-write temp files, lock files, and hidden
/// directories other than the allowlisted two.
pub fn is_excluded(path: &Path) -> bool {
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if BUILD_CACHE_DIRS.contains(&name.as_ref()) {
            return true;
        }
        if name.starts_with('.') && !HIDDEN_DIR_ALLOWLIST.contains(&name.as_ref()) {
            return true;
        }
    }

    let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
        return false;
    };

    if file_name.ends_with('~') || file_name.ends_with(".tmp") || file_name.ends_with(".swp") {
        return true;
    }
    if file_name.ends_with(".lock") {
        return true;
    }

    false
}

/// Classifies an already-included path into the event the caller should
/// publish.
fn classify(kind: FileChangeKind, path: &Path) -> FileWatchEvent {
    if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
        if TRIGGER_BASENAMES.contains(&file_name) {
            return FileWatchEvent::IndexTrigger {
                path: path.to_path_buf(),
            };
        }
        if file_name == "reply.txt" {
            if let Some(conversation_id) = conversation_id_from_reply_path(path) {
                return FileWatchEvent::Reply {
                    conversation_id,
                    path: path.to_path_buf(),
                };
            }
        }
    }
    FileWatchEvent::Generic {
        kind,
        path: path.to_path_buf(),
    }
}

/// `conversations/<id>/reply.txt` -> `<id>`.
fn conversation_id_from_reply_path(path: &Path) -> Option<String> {
    let parent = path.parent()?;
    let conversation_id = parent.file_name()?.to_str()?.to_string();
    let grandparent = parent.parent()?;
    if grandparent.file_name()?.to_str()? == "conversations" {
        Some(conversation_id)
    } else {
        None
    }
}

fn notify_kind_to_change_kind(kind: &EventKind) -> Option<FileChangeKind> {
    match kind {
        EventKind::Create(_) => Some(FileChangeKind::Created),
        EventKind::Modify(_) => Some(FileChangeKind::Modified),
        EventKind::Remove(_) => Some(FileChangeKind::Deleted),
        _ => None,
    }
}

/// Recursive watch over one root. Holds the underlying `notify` watcher
/// alive for as long as the struct lives; dropping it stops watching.
pub struct FilesystemWatcher {
    _watcher: RecommendedWatcher,
    pub events: mpsc::Receiver<FileWatchEvent>,
}

impl FilesystemWatcher {
    /// Starts watching `root` recursively, publishing filtered,
    /// debounced [`FileWatchEvent`]s to both the returned channel and
    /// `bus` (as `SystemEvent::FileChanged` for the `Generic` variant
    /// only — trigger and reply events are domain-specific and are left
    /// to the caller to act on via the channel).
    pub fn start(
        root: &Path,
        config: WatcherConfig,
        bus: EventBus,
    ) -> Result<Self, WatcherError> {
        if !root.exists() {
            return Err(WatcherError::RootMissing(root.to_path_buf()));
        }

        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<(FileChangeKind, PathBuf)>();
        let (out_tx, out_rx) = mpsc::channel(256);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let Ok(event) = res else { return };
                let Some(kind) = notify_kind_to_change_kind(&event.kind) else {
                    return;
                };
                for path in event.paths {
                    let _ = raw_tx.send((kind, path));
                }
            },
            notify::Config::default(),
        )?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        tokio::spawn(async move {
            let mut pending: HashMap<PathBuf, FileChangeKind> = HashMap::new();
            loop {
                let first = match raw_rx.recv().await {
                    Some(item) => item,
                    None => return,
                };
                pending.insert(first.1, first.0);

                loop {
                    match tokio::time::timeout(config.debounce, raw_rx.recv()).await {
                        Ok(Some((kind, path))) => {
                            pending.insert(path, kind);
                        }
                        Ok(None) => {
                            flush(&mut pending, &out_tx, &bus).await;
                            return;
                        }
                        Err(_elapsed) => break,
                    }
                }

                flush(&mut pending, &out_tx, &bus).await;
            }
        });

        Ok(Self {
            _watcher: watcher,
            events: out_rx,
        })
    }
}

async fn flush(
    pending: &mut HashMap<PathBuf, FileChangeKind>,
    out_tx: &mpsc::Sender<FileWatchEvent>,
    bus: &EventBus,
) {
    for (path, kind) in pending.drain() {
        if is_excluded(&path) {
            continue;
        }
        let event = classify(kind, &path);
        if let FileWatchEvent::Generic { kind, path } = &event {
            bus.publish(SystemEvent::FileChanged {
                kind: *kind,
                path: path.clone(),
            });
        }
        let _ = out_tx.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_build_cache_dirs() {
        assert!(is_excluded(Path::new("/repo/target/debug/foo")));
        assert!(is_excluded(Path::new("/repo/node_modules/pkg/index.js")));
        assert!(is_excluded(Path::new("/repo/.git/HEAD")));
    }

    #[test]
    fn excludes_hidden_dirs_except_allowlist() {
        assert!(is_excluded(Path::new("/repo/.cache/x")));
        assert!(!is_excluded(Path::new("/repo/.claude/agents/foo.md")));
        assert!(!is_excluded(Path::new("/repo/.engine/config/orchestrator.toml")));
    }

    #[test]
    fn excludes_atomic_write_and_lock_suffixes() {
        assert!(is_excluded(Path::new("/repo/notes.md~")));
        assert!(is_excluded(Path::new("/repo/notes.md.tmp")));
        assert!(is_excluded(Path::new("/repo/.notes.md.swp")));
        assert!(is_excluded(Path::new("/repo/db.lock")));
    }

    #[test]
    fn includes_ordinary_source_file() {
        assert!(!is_excluded(Path::new("/repo/src/main.rs")));
    }

    #[test]
    fn classifies_trigger_basename() {
        let event = classify(FileChangeKind::Modified, Path::new("/repo/LIFE-SPEC.md"));
        assert!(matches!(event, FileWatchEvent::IndexTrigger { .. }));
    }

    #[test]
    fn classifies_reply_file() {
        let path = Path::new("/repo/.engine/conversations/conv-123/reply.txt");
        let event = classify(FileChangeKind::Modified, path);
        match event {
            FileWatchEvent::Reply { conversation_id, .. } => {
                assert_eq!(conversation_id, "conv-123");
            }
            other => panic!("expected Reply, got {other:?}"),
        }
    }

    #[test]
    fn reply_txt_outside_conversations_dir_is_generic() {
        let path = Path::new("/repo/somewhere/reply.txt");
        let event = classify(FileChangeKind::Modified, path);
        assert!(matches!(event, FileWatchEvent::Generic { .. }));
    }

    #[test]
    fn ordinary_file_is_generic() {
        let event = classify(FileChangeKind::Created, Path::new("/repo/src/lib.rs"));
        assert!(matches!(event, FileWatchEvent::Generic { .. }));
    }
}
