//! Single-assignment completion cell.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Write side of a one-shot result.
///
/// Clones share the same slot: the first `complete` wins and every later
/// call is a no-op, as is completing after the receiver was dropped.
pub struct Completion<T> {
   slot: Arc<Mutex<Option<oneshot::Sender<T>>>>,
}

impl<T> Clone for Completion<T> {
   fn clone(&self) -> Self {
      Self {
         slot: Arc::clone(&self.slot),
      }
   }
}

impl<T> Completion<T> {
   pub fn new() -> (Self, oneshot::Receiver<T>) {
      let (tx, rx) = oneshot::channel();
      let completion = Self {
         slot: Arc::new(Mutex::new(Some(tx))),
      };
      (completion, rx)
   }

   /// Stores `value` if nothing was stored yet.
   ///
   /// Returns whether the value reached a waiting receiver.
   pub fn complete(&self, value: T) -> bool {
      let Some(tx) = self.slot.lock().take() else {
         return false;
      };
      tx.send(value).is_ok()
   }
}
