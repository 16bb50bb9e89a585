//! Deferred reclamation worker
//!
//! Shards retire storage (fully expired slices, superseded slice lists)
//! by handing it to the recycler. Each item is parked behind a token
//! snapshot and destroyed only after that snapshot drains, so readers
//! iterating the published slice list never observe freed storage.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Sender};
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::index::{RetiredSliceList, Slice};
use crate::tokens::{TokenManager, TokenTracker};

/// A retired `{slice, superseded list}` bundle awaiting destruction.
///
/// Either part may be absent: publishing a new active slice retires only
/// the old list; recycling a fully expired slice retires both.
pub struct DeferredSliceDelete {
    slice: Option<Arc<Slice>>,
    list: Option<RetiredSliceList>,
}

impl DeferredSliceDelete {
    pub fn new(slice: Option<Arc<Slice>>, list: Option<RetiredSliceList>) -> Self {
        Self { slice, list }
    }
}

enum Command {
    Recycle {
        tracker: TokenTracker,
        bundle: DeferredSliceDelete,
    },
    Flush(Sender<()>),
}

/// Worker that destroys retired storage once its token snapshot drains.
pub struct Recycler {
    tokens: Arc<TokenManager>,
    tx: Mutex<Option<Sender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Recycler {
    pub fn new(tokens: Arc<TokenManager>) -> Self {
        let (tx, rx) = unbounded::<Command>();
        let worker = thread::Builder::new()
            .name("sigdex-recycler".to_string())
            .spawn(move || {
                while let Ok(command) = rx.recv() {
                    match command {
                        Command::Recycle { tracker, bundle } => {
                            tracker.wait_drained();
                            debug!(
                                slice = bundle.slice.is_some(),
                                list = bundle.list.is_some(),
                                "recycling retired slice storage"
                            );
                            drop(bundle);
                        }
                        Command::Flush(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
                debug!("recycler worker exiting");
            })
            .expect("spawn recycler worker");

        Self {
            tokens,
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Park `bundle` behind a fresh token snapshot; the worker destroys it
    /// after the snapshot drains.
    pub fn schedule(&self, bundle: DeferredSliceDelete) {
        let tracker = self.tokens.start_tracker();
        let tx = self.tx.lock();
        match tx.as_ref() {
            Some(tx) => {
                // Unbounded channel; send only fails if the worker died.
                if tx
                    .send(Command::Recycle { tracker, bundle })
                    .is_err()
                {
                    error!("recycler worker gone; dropping bundle inline");
                }
            }
            None => {
                // After shutdown all tokens have drained; immediate drop is
                // equivalent to a drained snapshot.
                drop(bundle);
            }
        }
    }

    /// Block until every previously scheduled item has been destroyed.
    pub fn flush(&self) {
        let ack = {
            let tx = self.tx.lock();
            let Some(tx) = tx.as_ref() else { return };
            let (ack_tx, ack_rx) = unbounded();
            if tx.send(Command::Flush(ack_tx)).is_err() {
                return;
            }
            ack_rx
        };
        let _ = ack.recv();
    }

    /// Drain the queue and stop the worker. Idempotent.
    pub fn shutdown(&self) {
        let tx = self.tx.lock().take();
        drop(tx);
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                error!("recycler worker panicked");
            }
        }
    }
}

impl Drop for Recycler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_waits_for_scheduled_items() {
        let tokens = Arc::new(TokenManager::new());
        let recycler = Recycler::new(Arc::clone(&tokens));

        recycler.schedule(DeferredSliceDelete::new(None, None));
        recycler.flush();
        recycler.shutdown();
    }

    #[test]
    fn test_item_waits_for_token_drain() {
        let tokens = Arc::new(TokenManager::new());
        let recycler = Arc::new(Recycler::new(Arc::clone(&tokens)));

        let token = tokens.request_token().unwrap();
        recycler.schedule(DeferredSliceDelete::new(None, None));

        let flusher = {
            let recycler = Arc::clone(&recycler);
            std::thread::spawn(move || recycler.flush())
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!flusher.is_finished());

        drop(token);
        flusher.join().unwrap();
        recycler.shutdown();
    }

    #[test]
    fn test_schedule_after_shutdown_drops_inline() {
        let tokens = Arc::new(TokenManager::new());
        let recycler = Recycler::new(tokens);
        recycler.shutdown();
        recycler.schedule(DeferredSliceDelete::new(None, None));
    }
}
