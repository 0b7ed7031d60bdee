//! Event handling for toggle session updates.
//!
//! Sessions run detached from the D-Bus call that started them; their
//! progress reaches clients through these events.

use std::sync::Arc;

use crossbeam::queue::SegQueue;
use tokio::sync::Notify;

use crate::device::DeviceRef;

/// Events that can be emitted by the speaker service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakerEvent {
   Progress(String),
   Finished { success: bool },
}

/// Trait for implementing event emission.
pub trait EventBus: Send + Sync {
   /// Emits an event to all registered listeners.
   fn emit(&self, device: &DeviceRef, event: SpeakerEvent);
}

/// Type alias for a thread-safe event sender.
pub type EventSender = Arc<dyn EventBus>;

/// Lock-free queue between session tasks and the single signal dispatcher.
///
/// Emitting never blocks a session; events come out in emission order.
#[derive(Default)]
pub struct SignalQueue {
   queue: SegQueue<(DeviceRef, SpeakerEvent)>,
   ready: Notify,
}

impl SignalQueue {
   pub fn new() -> Arc<Self> {
      Arc::default()
   }

   /// Waits for the next event. Only one task may consume the queue.
   pub async fn next(&self) -> (DeviceRef, SpeakerEvent) {
      loop {
         if let Some(event) = self.queue.pop() {
            return event;
         }
         // `notify_one` leaves a permit when nobody waits, so a push between
         // the pop above and this await is not lost.
         self.ready.notified().await;
      }
   }
}

impl EventBus for SignalQueue {
   fn emit(&self, device: &DeviceRef, event: SpeakerEvent) {
      self.queue.push((device.clone(), event));
      self.ready.notify_one();
   }
}
