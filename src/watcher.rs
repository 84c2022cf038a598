//! A recursive directory watcher built on top of the OS's non-recursive
//! primitive, via the `notify` crate. Subscribes every directory under the
//! root up front and re-subscribes newly created directories on the fly.
//! Emits a raw, undebounced event stream — callers decide what to do with
//! each event.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// The four operations the spec asks the watcher to distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Create,
    Write,
    Remove,
    Rename,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Path relative to the sync root.
    pub path: PathBuf,
    pub op: Op,
}

fn classify(kind: &EventKind) -> Option<Op> {
    match kind {
        EventKind::Create(_) => Some(Op::Create),
        EventKind::Modify(notify::event::ModifyKind::Name(_)) => Some(Op::Rename),
        EventKind::Modify(_) => Some(Op::Write),
        EventKind::Remove(_) => Some(Op::Remove),
        _ => None,
    }
}

fn subscribe_recursive(watcher: &mut RecommendedWatcher, root: &Path) -> Result<()> {
    if !root.is_dir() {
        return Ok(());
    }
    watcher
        .watch(root, RecursiveMode::NonRecursive)
        .with_context(|| format!("could not add directory to watcher: {}", root.display()))?;

    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = std::fs::read_dir(&dir)
            .with_context(|| format!("could not read directory {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                watcher
                    .watch(&path, RecursiveMode::NonRecursive)
                    .with_context(|| {
                        format!("could not add directory to watcher: {}", path.display())
                    })?;
                stack.push(path);
            }
        }
    }
    Ok(())
}

/// A recursive watcher over a sync root, emitting a typed event stream.
pub struct LocalWatcher {
    inner: Arc<Mutex<Option<RecommendedWatcher>>>,
    events: UnboundedReceiver<WatchEvent>,
    root: PathBuf,
}

impl LocalWatcher {
    pub fn new(root: PathBuf) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel::<WatchEvent>();
        let inner: Arc<Mutex<Option<RecommendedWatcher>>> = Arc::new(Mutex::new(None));

        let inner_cb = inner.clone();
        let root_cb = root.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::info!(target: "watcher", error = %e, "fsnotify error");
                    return;
                }
            };
            let Some(op) = classify(&event.kind) else {
                return;
            };

            for path in &event.paths {
                let Ok(relative) = path.strip_prefix(&root_cb) else {
                    continue;
                };
                if relative.as_os_str().is_empty() {
                    // The root itself; spec discards events whose path
                    // relative form is empty or begins with `..`.
                    continue;
                }

                if op == Op::Create && path.is_dir() {
                    if let Some(w) = inner_cb.lock().unwrap().as_mut() {
                        let _ = w.watch(path, RecursiveMode::NonRecursive);
                    }
                }

                let _ = tx.send(WatchEvent {
                    path: relative.to_path_buf(),
                    op,
                });
            }
        })
        .context("failed to start filesystem watcher")?;

        subscribe_recursive(&mut watcher, &root)?;
        *inner.lock().unwrap() = Some(watcher);

        Ok(Self {
            inner,
            events: rx,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Receive the next event. Returns `None` once the watcher has been
    /// closed and the channel has drained.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.events.recv().await
    }

    /// Close the underlying OS primitive, then the event channel, in that
    /// order. Dropping the watcher also drops its callback closure, and with
    /// it the `UnboundedSender` the channel holds, which is what actually
    /// closes the channel's sending half. Already-buffered events remain
    /// drainable; consumers must keep calling `recv()` until it returns
    /// `None`.
    pub fn close(&mut self) {
        drop(self.inner.lock().unwrap().take());
    }
}
