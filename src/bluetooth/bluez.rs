//! Platform traits implemented over a BlueZ session.
//!
//! A speaker counts as connected while its device link is up
//! (`Device1.Connected`). `connect` brings up the A2DP sink profile, which
//! establishes the link; `disconnect` tears the whole link down so every
//! profile, and with it the `Connected` property, goes away.

use std::{
   collections::{HashMap, HashSet},
   str::FromStr,
};

use bluer::{Adapter, Address, Session};
use log::{debug, info, warn};
use smol_str::SmolStr;
use tokio::{sync::Mutex, task::JoinHandle};
use uuid::Uuid;

use crate::{
   bluetooth::{local_uuid, monitor, remote_uuid},
   error::{Result, SpeakerError},
   notifier::StateNotifier,
   platform::{AudioProfile, BluetoothAdapter, BluetoothPlatform, PlatformDevice, ProfileKind},
   toggle::ProfileListener,
};

/// Host Bluetooth stack reached through `bluetoothd`.
pub struct BluezPlatform {
   session: Session,
   notifier: StateNotifier,
   monitors: Mutex<HashMap<SmolStr, JoinHandle<()>>>,
}

impl BluezPlatform {
   /// Creates the platform and starts monitoring the default adapter, if any.
   pub async fn new(session: Session) -> Self {
      let platform = Self {
         session,
         notifier: StateNotifier::new(),
         monitors: Mutex::default(),
      };
      match platform.session.default_adapter().await {
         Ok(adapter) => platform.ensure_monitor(&adapter).await,
         Err(e) => debug!("No adapter to monitor yet: {e}"),
      }
      platform
   }

   /// Starts watching `adapter` unless a live monitor already does.
   async fn ensure_monitor(&self, adapter: &Adapter) {
      let name = SmolStr::new(adapter.name());
      let mut monitors = self.monitors.lock().await;
      if monitors.get(&name).is_some_and(|handle| !handle.is_finished()) {
         return;
      }

      info!("Monitoring connection changes on {name}");
      if let Some(handle) =
         monitor::start_adapter_monitor(adapter.clone(), self.notifier.clone()).await
      {
         monitors.insert(name, handle);
      }
   }
}

impl Drop for BluezPlatform {
   fn drop(&mut self) {
      for (_, handle) in self.monitors.get_mut().drain() {
         handle.abort();
      }
   }
}

impl BluetoothPlatform for BluezPlatform {
   type Adapter = BluezAdapter;

   async fn adapter(&self) -> Option<BluezAdapter> {
      match self.session.default_adapter().await {
         Ok(adapter) => {
            self.ensure_monitor(&adapter).await;
            Some(BluezAdapter { adapter })
         },
         Err(e) => {
            warn!("No Bluetooth adapter available: {e}");
            None
         },
      }
   }

   fn state_notifier(&self) -> &StateNotifier {
      &self.notifier
   }
}

#[derive(Clone)]
pub struct BluezAdapter {
   adapter: Adapter,
}

impl BluetoothAdapter for BluezAdapter {
   type Profile = BluezProfile;

   async fn is_enabled(&self) -> bool {
      match self.adapter.is_powered().await {
         Ok(powered) => powered,
         Err(e) => {
            warn!("Failed to read power state of {}: {e}", self.adapter.name());
            false
         },
      }
   }

   async fn bonded_devices(&self) -> Result<Vec<PlatformDevice>> {
      paired_devices(&self.adapter, remote_uuid(ProfileKind::A2dp), false).await
   }

   fn request_profile(&self, kind: ProfileKind, listener: ProfileListener<BluezProfile>) {
      let adapter = self.adapter.clone();
      tokio::spawn(async move {
         match adapter.uuids().await {
            Ok(Some(uuids)) if uuids.contains(&local_uuid(kind)) => {
               listener.on_connected(kind, Some(BluezProfile { adapter, kind }));
            },
            Ok(_) => {
               warn!("Adapter {} does not offer {kind}", adapter.name());
            },
            Err(e) => {
               warn!("Failed to read services of {}: {e}", adapter.name());
            },
         }
      });
   }
}

/// What a profile method name does on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkAction {
   ConnectProfile,
   DisconnectDevice,
}

impl LinkAction {
   fn for_method(method: &str) -> Result<Self> {
      match method {
         "connect" => Ok(Self::ConnectProfile),
         "disconnect" => Ok(Self::DisconnectDevice),
         other => Err(SpeakerError::MethodNotFound(other.to_string())),
      }
   }
}

/// One audio profile on one adapter.
pub struct BluezProfile {
   adapter: Adapter,
   kind: ProfileKind,
}

impl AudioProfile for BluezProfile {
   async fn connected_devices(&self) -> Result<Vec<PlatformDevice>> {
      paired_devices(&self.adapter, remote_uuid(self.kind), true).await
   }

   async fn invoke(&self, method: &str, device: &PlatformDevice) -> Result<bool> {
      let action = LinkAction::for_method(method)?;
      let addr = Address::from_str(&device.address)
         .map_err(|_| SpeakerError::InvalidAddress(device.address.clone()))?;
      let target = self.adapter.device(addr)?;

      debug!("Calling {method} ({action:?}) on {addr}");
      match action {
         LinkAction::ConnectProfile => target.connect_profile(&remote_uuid(self.kind)).await?,
         LinkAction::DisconnectDevice => target.disconnect().await?,
      }
      Ok(true)
   }
}

/// Properties of a device that decide whether it is listed.
#[derive(Debug, Clone)]
struct DeviceFacts {
   paired: bool,
   /// `None` while BlueZ has not resolved the services yet.
   uuids: Option<HashSet<Uuid>>,
   connected: bool,
}

impl DeviceFacts {
   /// Paired, offering `profile` (or not resolved yet), and connected if asked.
   fn is_listed(&self, profile: &Uuid, connected_only: bool) -> bool {
      if !self.paired {
         return false;
      }
      if let Some(uuids) = &self.uuids
         && !uuids.contains(profile)
      {
         return false;
      }
      !connected_only || self.connected
   }
}

/// Paired devices on `adapter` that expose `profile`.
async fn paired_devices(
   adapter: &Adapter,
   profile: Uuid,
   connected_only: bool,
) -> Result<Vec<PlatformDevice>> {
   let mut devices = Vec::new();
   for addr in adapter.device_addresses().await? {
      let device = adapter.device(addr)?;
      let facts = DeviceFacts {
         paired: device.is_paired().await?,
         uuids: device.uuids().await?,
         connected: device.is_connected().await?,
      };
      if !facts.is_listed(&profile, connected_only) {
         continue;
      }

      let name = device.alias().await.unwrap_or_else(|_| addr.to_string());
      devices.push(PlatformDevice {
         address: addr.to_string(),
         name,
      });
   }
   Ok(devices)
}
