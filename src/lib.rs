// src/lib.rs

pub mod cli;
pub mod config;
pub mod emit;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod types;
pub mod watch;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, watch as signal};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_from_path;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::config::validate::{validate_exclusions, validate_options, validate_roots};
use crate::emit::LineEmitter;
use crate::engine::{Diagnostics, DiagnosticsSnapshot, Runtime, WatchCore, WatchOptions};
use crate::errors::{Result, WatcherError};
use crate::fs::RealFileSystem;
use crate::watch::{ExclusionFilter, inotify_backend};

pub use crate::types::{EventKind, NormalizedEvent, OutputFormat};

/// Read buffer handed to the kernel notification stream.
const EVENT_BUFFER_BYTES: usize = 4096;

/// Start watching `roots` with default options.
///
/// See [`start_with_options`].
pub fn start<R, E>(roots: R, exclusions: E) -> Result<Watcher>
where
    R: IntoIterator,
    R::Item: Into<PathBuf>,
    E: IntoIterator,
    E::Item: Into<String>,
{
    start_with_options(roots, exclusions, WatchOptions::default())
}

/// Start watching `roots`, skipping directories matched by `exclusions`.
///
/// Must be called from within a Tokio runtime. Every root is validated and
/// its whole subtree watched before this returns, so a change made after
/// `start` returns is always reported. Fails without leaving anything
/// running when a root is missing or not a directory, or when a root cannot
/// be watched (including the kernel watch limit).
pub fn start_with_options<R, E>(roots: R, exclusions: E, options: WatchOptions) -> Result<Watcher>
where
    R: IntoIterator,
    R::Item: Into<PathBuf>,
    E: IntoIterator,
    E::Item: Into<String>,
{
    let fs = RealFileSystem;
    let roots: Vec<PathBuf> = roots.into_iter().map(Into::into).collect();
    let exclusions: Vec<String> = exclusions.into_iter().map(Into::into).collect();

    let roots = validate_roots(&roots, &fs)?;
    validate_exclusions(&exclusions)?;
    validate_options(&options)?;

    let handle = tokio::runtime::Handle::try_current().map_err(|_| {
        WatcherError::ConfigError("treewatch must be started within a Tokio runtime".to_string())
    })?;

    let (inotify, backend) = inotify_backend::open()?;
    let mut core = WatchCore::new(backend, fs, ExclusionFilter::new(&exclusions), &options);
    for root in &roots {
        let report = core.install_root(root)?;
        debug!(?root, installed = report.installed, skipped = report.skipped, "root installed");
    }
    let stream = inotify.into_event_stream([0u8; EVENT_BUFFER_BYTES])?;

    let (events_tx, events_rx) = mpsc::channel(options.event_buffer);
    let (shutdown_tx, shutdown_rx) = signal::channel(false);
    let diagnostics = core.diagnostics();

    let runtime = Runtime::new(core, Box::pin(stream), events_tx, shutdown_rx);
    let task = handle.spawn(runtime.run());

    Ok(Watcher {
        events: events_rx,
        shutdown: ShutdownHandle {
            tx: Arc::new(shutdown_tx),
        },
        task: Some(task),
        diagnostics,
    })
}

/// A running watcher session.
///
/// Dropping it stops the session.
#[derive(Debug)]
pub struct Watcher {
    events: mpsc::Receiver<NormalizedEvent>,
    shutdown: ShutdownHandle,
    task: Option<JoinHandle<Result<()>>>,
    diagnostics: Arc<Diagnostics>,
}

impl Watcher {
    /// Events in the order they happened. Ends after shutdown.
    pub fn events(&mut self) -> impl Stream<Item = NormalizedEvent> + '_ {
        futures::stream::poll_fn(move |cx| self.events.poll_recv(cx))
    }

    pub async fn next_event(&mut self) -> Option<NormalizedEvent> {
        self.events.recv().await
    }

    /// Stop the session. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// A handle that can stop the session from elsewhere.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Wait for the session to end and return how it ended
    /// (e.g. [`WatcherError::QueueOverflow`]).
    pub async fn join(mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(result) => result,
            Err(err) => Err(WatcherError::Other(anyhow::anyhow!(
                "event loop task failed: {err}"
            ))),
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.shutdown.shutdown();
    }
}

/// Cloneable, thread-safe way to stop a [`Watcher`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<signal::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (file + CLI flags)
/// - the watcher session
/// - the line emitter on stdout
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    let mut raw = match &args.config {
        Some(path) => load_from_path(path)?,
        None => RawConfigFile::default(),
    };
    args.apply_to(&mut raw);
    let cfg = ConfigFile::try_from(raw)?;

    let mut watcher = start_with_options(
        cfg.roots().to_vec(),
        cfg.exclude().to_vec(),
        cfg.options(),
    )?;
    info!(
        watches = watcher.diagnostics().watch_count,
        roots = ?cfg.roots(),
        "watches established"
    );

    // Ctrl-C → graceful shutdown.
    {
        let shutdown = watcher.shutdown_handle();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl+C received; shutting down");
            shutdown.shutdown();
        });
    }

    let mut emitter = LineEmitter::new(io::stdout(), cfg.format());
    while let Some(event) = watcher.next_event().await {
        if let Err(err) = emitter.emit(&event) {
            if err.kind() == io::ErrorKind::BrokenPipe {
                warn!("stdout closed; shutting down");
                watcher.shutdown();
                break;
            }
            return Err(err.into());
        }
    }

    let diagnostics = watcher.diagnostics();
    debug!(?diagnostics, "session diagnostics");
    watcher.join().await?;
    Ok(())
}
