//! Connection-state change notifications.
//!
//! Backends publish raw profile state transitions; the notifier keeps only
//! settled transitions (connected or disconnected) that name a device and
//! fans them out to the current subscribers.

use log::{debug, warn};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::platform::PlatformDevice;

/// Buffered changes per subscriber before it starts lagging
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileState {
   Disconnected,
   Connecting,
   Connected,
   Disconnecting,
}

/// Raw state transition as delivered by the platform.
#[derive(Debug, Clone)]
pub struct ConnectionStateEvent {
   pub state: ProfileState,
   pub device: Option<PlatformDevice>,
}

/// Settled connection state of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
   pub connected: bool,
   pub address: String,
}

/// Fan-out point for connection-state changes.
///
/// This type is cheaply cloneable; clones share the same subscribers.
#[derive(Debug, Clone)]
pub struct StateNotifier {
   tx: broadcast::Sender<StateChange>,
}

impl Default for StateNotifier {
   fn default() -> Self {
      Self::new()
   }
}

impl StateNotifier {
   pub fn new() -> Self {
      let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
      Self { tx }
   }

   pub fn publish(&self, event: ConnectionStateEvent) {
      let connected = match event.state {
         ProfileState::Connected => true,
         ProfileState::Disconnected => false,
         other => {
            debug!("Ignoring transitional state {other:?}");
            return;
         },
      };
      let Some(device) = event.device else {
         debug!("Ignoring state change without device");
         return;
      };

      let change = StateChange {
         connected,
         address: device.address,
      };
      if self.tx.send(change).is_err() {
         debug!("No subscribers for state change");
      }
   }

   /// Registers a new subscriber. Dropping the returned value unsubscribes.
   pub fn subscribe(&self) -> Subscription {
      Subscription {
         rx: self.tx.subscribe(),
      }
   }

   pub fn subscriber_count(&self) -> usize {
      self.tx.receiver_count()
   }
}

/// A live registration on a [`StateNotifier`].
#[derive(Debug)]
pub struct Subscription {
   rx: broadcast::Receiver<StateChange>,
}

impl Subscription {
   /// Waits for `address` to reach the `connected` state.
   ///
   /// Returns `false` if the notifier goes away first.
   pub async fn wait_for(&mut self, connected: bool, address: &str) -> bool {
      loop {
         match self.rx.recv().await {
            Ok(change) if change.connected == connected && change.address == address => {
               return true;
            },
            Ok(change) => {
               debug!(
                  "Skipping state change for {} (connected={})",
                  change.address, change.connected
               );
            },
            Err(RecvError::Lagged(missed)) => {
               warn!("Missed {missed} state changes while waiting for {address}");
            },
            Err(RecvError::Closed) => return false,
         }
      }
   }
}
