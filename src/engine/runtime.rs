// src/engine/runtime.rs

use std::fmt;
use std::io;
use std::time::Instant;

use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::NormalizedEvent;
use crate::watch::backend::WatchBackend;

use super::core::WatchCore;

/// Drains the kernel notification stream into the core and forwards the
/// resulting events to the consumer channel.
///
/// This is a pure IO shell around `WatchCore`, which contains all the
/// watching semantics. This struct handles async IO: reading the stream,
/// firing the pairing timer and reacting to shutdown.
pub struct Runtime<S, B, F> {
    core: WatchCore<B, F>,
    stream: S,
    events_tx: mpsc::Sender<NormalizedEvent>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<S, B, F> fmt::Debug for Runtime<S, B, F>
where
    B: fmt::Debug,
    F: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<S, B, F> Runtime<S, B, F>
where
    S: Stream<Item = io::Result<B::Raw>> + Unpin,
    B: WatchBackend,
    F: FileSystem,
{
    pub fn new(
        core: WatchCore<B, F>,
        stream: S,
        events_tx: mpsc::Sender<NormalizedEvent>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            core,
            stream,
            events_tx,
            shutdown_rx,
        }
    }

    /// Main event loop.
    ///
    /// - Feeds every kernel notification into the core.
    /// - Expires unpaired moves when the oldest pairing window closes.
    /// - Stops on shutdown, on end of stream, when the consumer goes away,
    ///   or on a fatal core error (queue overflow).
    pub async fn run(mut self) -> Result<()> {
        info!("treewatch runtime started");

        let result = loop {
            let deadline = self.core.next_deadline();
            let pairing_timer = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at.into()).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("shutdown requested");
                        break Ok(());
                    }
                }

                next = self.stream.next() => {
                    let raw = match next {
                        Some(Ok(raw)) => raw,
                        Some(Err(err)) => break Err(err.into()),
                        None => {
                            info!("kernel notification stream closed");
                            break Ok(());
                        }
                    };
                    let events = match self.core.handle(raw, Instant::now()) {
                        Ok(events) => events,
                        Err(err) => break Err(err),
                    };
                    if !self.deliver(events).await {
                        break Ok(());
                    }
                }

                _ = pairing_timer => {
                    let expired = self.core.expire_pending(Instant::now());
                    debug!(expired, "pairing window elapsed");
                }
            }
        };

        let flushed = self.core.flush_pending();
        if flushed > 0 {
            debug!(flushed, "unpaired moves treated as moved out");
        }
        info!("runtime exiting");
        result
    }

    /// Forward events in order. Returns `false` when the loop should stop.
    async fn deliver(&mut self, events: Vec<NormalizedEvent>) -> bool {
        for event in events {
            tokio::select! {
                sent = self.events_tx.send(event) => {
                    if sent.is_err() {
                        info!("event receiver dropped");
                        return false;
                    }
                }
                _ = self.shutdown_rx.wait_for(|stop| *stop) => {
                    return false;
                }
            }
        }
        true
    }
}
