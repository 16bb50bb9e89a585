//! Read-side leases for epoch reclamation
//!
//! Readers take a token before touching published slice state and drop it
//! when done. A tracker snapshots the serials outstanding at a moment; it
//! drains once every one of them has been dropped. Storage retired before
//! the snapshot can be freed as soon as the snapshot drains, because no
//! reader that could have seen it is still running.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, SigdexError};

#[derive(Default)]
struct TokenBook {
    next_serial: u64,
    outstanding: BTreeSet<u64>,
    shut_down: bool,
}

struct TokenState {
    book: Mutex<TokenBook>,
    drained: Condvar,
}

/// Issues tokens and snapshots for the recycler.
pub struct TokenManager {
    state: Arc<TokenState>,
}

/// An opaque read-side lease. Dropping it retires the lease.
pub struct Token {
    serial: u64,
    state: Arc<TokenState>,
}

/// Snapshot of the tokens outstanding at creation time.
pub struct TokenTracker {
    cutoff: u64,
    state: Arc<TokenState>,
}

impl TokenManager {
    pub fn new() -> Self {
        Self {
            state: Arc::new(TokenState {
                book: Mutex::new(TokenBook::default()),
                drained: Condvar::new(),
            }),
        }
    }

    /// Issue a token. Fails once the manager has shut down.
    pub fn request_token(&self) -> Result<Token> {
        let mut book = self.state.book.lock();
        if book.shut_down {
            return Err(SigdexError::TokensShutDown);
        }
        let serial = book.next_serial;
        book.next_serial += 1;
        book.outstanding.insert(serial);
        Ok(Token {
            serial,
            state: Arc::clone(&self.state),
        })
    }

    /// Snapshot the currently outstanding tokens.
    pub fn start_tracker(&self) -> TokenTracker {
        let book = self.state.book.lock();
        TokenTracker {
            cutoff: book.next_serial,
            state: Arc::clone(&self.state),
        }
    }

    /// Number of tokens currently outstanding.
    pub fn outstanding_count(&self) -> usize {
        self.state.book.lock().outstanding.len()
    }

    /// Refuse new tokens and block until the outstanding ones drain.
    pub fn shutdown(&self) {
        let mut book = self.state.book.lock();
        book.shut_down = true;
        while !book.outstanding.is_empty() {
            self.state.drained.wait(&mut book);
        }
    }
}

impl Default for TokenManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Token {
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        let mut book = self.state.book.lock();
        book.outstanding.remove(&self.serial);
        drop(book);
        self.state.drained.notify_all();
    }
}

impl TokenTracker {
    /// True once every token that predates this tracker has been dropped.
    pub fn is_drained(&self) -> bool {
        let book = self.state.book.lock();
        Self::drained(&book.outstanding, self.cutoff)
    }

    /// Block until the snapshot drains.
    pub fn wait_drained(&self) {
        let mut book = self.state.book.lock();
        while !Self::drained(&book.outstanding, self.cutoff) {
            self.state.drained.wait(&mut book);
        }
    }

    fn drained(outstanding: &BTreeSet<u64>, cutoff: u64) -> bool {
        outstanding.iter().next().map_or(true, |&first| first >= cutoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_tracker_drains_when_tokens_drop() {
        let manager = TokenManager::new();

        let token = manager.request_token().unwrap();
        let tracker = manager.start_tracker();
        assert!(!tracker.is_drained());

        // Tokens issued after the snapshot do not block it.
        let late = manager.request_token().unwrap();
        drop(token);
        assert!(tracker.is_drained());
        drop(late);
    }

    #[test]
    fn test_empty_snapshot_is_drained() {
        let manager = TokenManager::new();
        assert!(manager.start_tracker().is_drained());
    }

    #[test]
    fn test_wait_drained_blocks_until_drop() {
        let manager = TokenManager::new();
        let token = manager.request_token().unwrap();
        let tracker = manager.start_tracker();

        let waiter = thread::spawn(move || {
            tracker.wait_drained();
        });
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());

        drop(token);
        waiter.join().unwrap();
    }

    #[test]
    fn test_shutdown_refuses_new_tokens() {
        let manager = TokenManager::new();
        manager.shutdown();
        assert!(matches!(
            manager.request_token(),
            Err(SigdexError::TokensShutDown)
        ));
    }

    #[test]
    fn test_shutdown_waits_for_outstanding() {
        let manager = Arc::new(TokenManager::new());
        let token = manager.request_token().unwrap();

        let manager2 = Arc::clone(&manager);
        let waiter = thread::spawn(move || {
            manager2.shutdown();
        });
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());

        drop(token);
        waiter.join().unwrap();
        assert_eq!(manager.outstanding_count(), 0);
    }
}
