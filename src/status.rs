//! Status line shown to clients between and during sessions.

use std::{
   sync::{
      Arc, Weak,
      atomic::{AtomicU64, Ordering},
   },
   time::Duration,
};

use parking_lot::Mutex;
use smol_str::SmolStr;
use tokio::{task::JoinHandle, time};

/// Latest progress message, cleared some time after a session ends.
///
/// Every update cancels a pending reset, so a new session is never blanked
/// by the previous one's timer.
#[derive(Debug, Default)]
pub struct StatusBoard {
   line: Mutex<SmolStr>,
   generation: AtomicU64,
   pending_reset: Mutex<Option<JoinHandle<()>>>,
}

impl StatusBoard {
   pub fn new() -> Arc<Self> {
      Arc::default()
   }

   pub fn current(&self) -> SmolStr {
      self.line.lock().clone()
   }

   pub fn update(&self, line: &str) {
      self.generation.fetch_add(1, Ordering::AcqRel);
      if let Some(handle) = self.pending_reset.lock().take() {
         handle.abort();
      }
      *self.line.lock() = SmolStr::new(line);
   }

   /// Clears the line after `delay` unless it is updated first.
   pub fn finish(self: &Arc<Self>, delay: Duration) {
      let generation = self.generation.load(Ordering::Acquire);
      let board: Weak<Self> = Arc::downgrade(self);
      let handle = tokio::spawn(async move {
         time::sleep(delay).await;
         if let Some(board) = board.upgrade() {
            board.reset_if_unchanged(generation);
         }
      });

      if let Some(previous) = self.pending_reset.lock().replace(handle) {
         previous.abort();
      }
   }

   fn reset_if_unchanged(&self, generation: u64) {
      let mut line = self.line.lock();
      if self.generation.load(Ordering::Acquire) == generation {
         *line = SmolStr::default();
      }
   }
}
