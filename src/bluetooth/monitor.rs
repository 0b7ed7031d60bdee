//! Adapter monitoring for connection-state changes.
//!
//! BlueZ reports connection changes as `Connected` property updates on each
//! device object. One watcher task runs per known device; the adapter
//! monitor adds and removes watchers as devices come and go.

use std::collections::HashMap;

use bluer::{Adapter, AdapterEvent, Address, Device, DeviceEvent, DeviceProperty};
use futures::{Stream, pin_mut, stream::StreamExt};
use log::{debug, warn};
use tokio::task::{AbortHandle, JoinHandle, JoinSet};

use crate::{
   notifier::{ConnectionStateEvent, ProfileState, StateNotifier},
   platform::PlatformDevice,
};

/// Starts watching `adapter` and its known devices.
///
/// Returns once every known device has a live property subscription, so a
/// connection change requested after this call is always observed.
pub async fn start_adapter_monitor(
   adapter: Adapter,
   notifier: StateNotifier,
) -> Option<JoinHandle<()>> {
   let events = match adapter.events().await {
      Ok(events) => events,
      Err(e) => {
         warn!("Failed to get events of adapter {}: {e}", adapter.name());
         return None;
      },
   };

   let mut watchers = Watchers::new(notifier);
   match adapter.device_addresses().await {
      Ok(addresses) => {
         for addr in addresses {
            watchers.add(&adapter, addr).await;
         }
      },
      Err(e) => warn!("Failed to list devices on {}: {e}", adapter.name()),
   }

   Some(tokio::spawn(async move {
      pin_mut!(events);
      while let Some(event) = events.next().await {
         watchers.reap();
         match event {
            AdapterEvent::DeviceAdded(addr) => {
               debug!("Device added on {}: {addr}", adapter.name());
               watchers.add(&adapter, addr).await;
            },
            AdapterEvent::DeviceRemoved(addr) => {
               debug!("Device removed on {}: {addr}", adapter.name());
               watchers.remove(addr);
            },
            _ => {},
         }
      }

      // Adapter went away; dropping the set aborts every watcher.
      debug!("Event stream of {} ended", adapter.name());
   }))
}

/// Settled state carried by a device property change, if any.
///
/// The device link (`Connected`) is what counts: disconnecting tears the
/// whole link down, and connecting the A2DP profile brings it up.
pub fn state_for(property: &DeviceProperty) -> Option<ProfileState> {
   match property {
      DeviceProperty::Connected(true) => Some(ProfileState::Connected),
      DeviceProperty::Connected(false) => Some(ProfileState::Disconnected),
      _ => None,
   }
}

/// Device watcher tasks, aborted together when dropped.
struct Watchers {
   notifier: StateNotifier,
   tasks: JoinSet<()>,
   handles: HashMap<Address, AbortHandle>,
}

impl Watchers {
   fn new(notifier: StateNotifier) -> Self {
      Self {
         notifier,
         tasks: JoinSet::new(),
         handles: HashMap::new(),
      }
   }

   /// Subscribes to `addr` before returning; the forwarding runs in a task.
   async fn add(&mut self, adapter: &Adapter, addr: Address) {
      if self.handles.get(&addr).is_some_and(|h| !h.is_finished()) {
         return;
      }
      let device = match adapter.device(addr) {
         Ok(device) => device,
         Err(e) => {
            warn!("Failed to open device {addr}: {e}");
            return;
         },
      };
      let events = match device.events().await {
         Ok(events) => events,
         Err(e) => {
            warn!("Failed to watch {addr}: {e}");
            return;
         },
      };

      let handle = self
         .tasks
         .spawn(forward_changes(device, events, self.notifier.clone()));
      self.handles.insert(addr, handle);
   }

   fn remove(&mut self, addr: Address) {
      if let Some(handle) = self.handles.remove(&addr) {
         handle.abort();
      }
   }

   /// Collects finished watchers so the set does not grow unbounded.
   fn reap(&mut self) {
      while self.tasks.try_join_next().is_some() {}
      self.handles.retain(|_, handle| !handle.is_finished());
   }
}

async fn forward_changes(
   device: Device,
   events: impl Stream<Item = DeviceEvent>,
   notifier: StateNotifier,
) {
   let addr = device.address();
   pin_mut!(events);

   while let Some(event) = events.next().await {
      let DeviceEvent::PropertyChanged(property) = event else {
         continue;
      };
      let Some(state) = state_for(&property) else {
         continue;
      };

      let name = device.alias().await.unwrap_or_else(|_| addr.to_string());
      debug!("{name} ({addr}) is now {state:?}");

      notifier.publish(ConnectionStateEvent {
         state,
         device: Some(PlatformDevice {
            address: addr.to_string(),
            name,
         }),
      });
   }
}
