//! In-memory Bluetooth platform for tests.

use std::{
   collections::HashSet,
   sync::{
      Arc,
      atomic::{AtomicBool, AtomicUsize, Ordering},
   },
   time::Duration,
};

use parking_lot::Mutex;
use tokio::time::{self, Instant};

use crate::{
   error::{Result, SpeakerError},
   notifier::{ConnectionStateEvent, ProfileState, StateNotifier},
   platform::{AudioProfile, BluetoothAdapter, BluetoothPlatform, PlatformDevice, ProfileKind},
   toggle::ProfileListener,
};

pub const SPEAKER_A: (&str, &str) = ("Speaker A", "AA:BB:CC:00:11:22");
pub const SPEAKER_B: (&str, &str) = ("Speaker B", "AA:BB:CC:33:44:55");

/// Allowed scheduler slack on top of an expected duration.
const ELAPSED_SLACK: Duration = Duration::from_millis(10);

#[track_caller]
pub fn assert_elapsed(start: Instant, expected: Duration) {
   let elapsed = start.elapsed();
   assert!(
      elapsed >= expected && elapsed <= expected + ELAPSED_SLACK,
      "expected {expected:?}, got {elapsed:?}"
   );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterMode {
   Missing,
   Disabled,
   Enabled,
}

/// How the fake answers profile proxy requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileMode {
   Immediate,
   Never,
   DisconnectedOnly,
   Delayed(Duration),
}

/// How the fake answers connect/disconnect invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveMode {
   /// Initiated; the state change is published after the delay.
   Confirm(Duration),
   /// Initiated; no state change ever follows.
   Silent,
   /// Not initiated.
   Reject,
   /// The invocation itself fails.
   Error,
}

struct FakeState {
   adapter: Mutex<AdapterMode>,
   profile: Mutex<ProfileMode>,
   primitive: Mutex<PrimitiveMode>,
   bonded: Mutex<Vec<PlatformDevice>>,
   connected: Mutex<HashSet<String>>,
   calls: Mutex<Vec<(String, String)>>,
   pending: Mutex<Vec<ProfileListener<FakeProfile>>>,
   fail_bonded: AtomicBool,
   proxy_deliveries: AtomicUsize,
   notifier: StateNotifier,
}

impl FakeState {
   fn apply(&self, connected: bool, device: PlatformDevice) {
      {
         let mut set = self.connected.lock();
         if connected {
            set.insert(device.address.clone());
         } else {
            set.remove(&device.address);
         }
      }
      let state = if connected {
         ProfileState::Connected
      } else {
         ProfileState::Disconnected
      };
      self.notifier.publish(ConnectionStateEvent {
         state,
         device: Some(device),
      });
   }
}

#[derive(Clone)]
pub struct FakePlatform(Arc<FakeState>);

impl FakePlatform {
   pub fn new() -> Self {
      Self(Arc::new(FakeState {
         adapter: Mutex::new(AdapterMode::Enabled),
         profile: Mutex::new(ProfileMode::Immediate),
         primitive: Mutex::new(PrimitiveMode::Confirm(Duration::ZERO)),
         bonded: Mutex::default(),
         connected: Mutex::default(),
         calls: Mutex::default(),
         pending: Mutex::default(),
         fail_bonded: AtomicBool::new(false),
         proxy_deliveries: AtomicUsize::new(0),
         notifier: StateNotifier::new(),
      }))
   }

   pub fn pair(&self, name: &str, address: &str) {
      self.0.bonded.lock().push(PlatformDevice {
         address: address.to_string(),
         name: name.to_string(),
      });
   }

   pub fn set_adapter_mode(&self, mode: AdapterMode) {
      *self.0.adapter.lock() = mode;
   }

   pub fn set_profile_mode(&self, mode: ProfileMode) {
      *self.0.profile.lock() = mode;
   }

   pub fn set_primitive_mode(&self, mode: PrimitiveMode) {
      *self.0.primitive.lock() = mode;
   }

   pub fn fail_bonded_reads(&self, fail: bool) {
      self.0.fail_bonded.store(fail, Ordering::Relaxed);
   }

   pub fn set_connected(&self, address: &str, connected: bool) {
      let mut set = self.0.connected.lock();
      if connected {
         set.insert(address.to_string());
      } else {
         set.remove(address);
      }
   }

   pub fn is_connected(&self, address: &str) -> bool {
      self.0.connected.lock().contains(address)
   }

   /// Primitive invocations as `(method, address)`.
   pub fn calls(&self) -> Vec<(String, String)> {
      self.0.calls.lock().clone()
   }

   pub fn notifier(&self) -> &StateNotifier {
      &self.0.notifier
   }

   pub fn profile(&self) -> FakeProfile {
      FakeProfile(self.0.clone())
   }

   /// Delayed proxies handed to a listener so far.
   pub fn proxy_deliveries(&self) -> usize {
      self.0.proxy_deliveries.load(Ordering::Relaxed)
   }
}

impl BluetoothPlatform for FakePlatform {
   type Adapter = FakeAdapter;

   async fn adapter(&self) -> Option<FakeAdapter> {
      let mode = *self.0.adapter.lock();
      (mode != AdapterMode::Missing).then(|| FakeAdapter(self.0.clone()))
   }

   fn state_notifier(&self) -> &StateNotifier {
      &self.0.notifier
   }
}

pub struct FakeAdapter(Arc<FakeState>);

impl BluetoothAdapter for FakeAdapter {
   type Profile = FakeProfile;

   async fn is_enabled(&self) -> bool {
      *self.0.adapter.lock() == AdapterMode::Enabled
   }

   async fn bonded_devices(&self) -> Result<Vec<PlatformDevice>> {
      if self.0.fail_bonded.load(Ordering::Relaxed) {
         return Err(SpeakerError::BluetoothUnavailable);
      }
      Ok(self.0.bonded.lock().clone())
   }

   fn request_profile(&self, kind: ProfileKind, listener: ProfileListener<FakeProfile>) {
      let profile = FakeProfile(self.0.clone());
      let mode = *self.0.profile.lock();
      match mode {
         ProfileMode::Immediate => listener.on_connected(kind, Some(profile)),
         ProfileMode::Never => self.0.pending.lock().push(listener),
         ProfileMode::DisconnectedOnly => {
            listener.on_disconnected(kind);
            self.0.pending.lock().push(listener);
         },
         ProfileMode::Delayed(delay) => {
            let state = self.0.clone();
            tokio::spawn(async move {
               time::sleep(delay).await;
               listener.on_connected(kind, Some(profile));
               state.proxy_deliveries.fetch_add(1, Ordering::Relaxed);
            });
         },
      }
   }
}

pub struct FakeProfile(Arc<FakeState>);

impl AudioProfile for FakeProfile {
   async fn connected_devices(&self) -> Result<Vec<PlatformDevice>> {
      let connected = self.0.connected.lock().clone();
      let bonded = self.0.bonded.lock().clone();
      Ok(bonded
         .into_iter()
         .filter(|device| connected.contains(&device.address))
         .collect())
   }

   async fn invoke(&self, method: &str, device: &PlatformDevice) -> Result<bool> {
      let connect = match method {
         "connect" => true,
         "disconnect" => false,
         other => return Err(SpeakerError::MethodNotFound(other.to_string())),
      };
      self
         .0
         .calls
         .lock()
         .push((method.to_string(), device.address.clone()));

      let mode = *self.0.primitive.lock();
      match mode {
         PrimitiveMode::Confirm(delay) if delay.is_zero() => {
            self.0.apply(connect, device.clone());
            Ok(true)
         },
         PrimitiveMode::Confirm(delay) => {
            let state = self.0.clone();
            let device = device.clone();
            tokio::spawn(async move {
               time::sleep(delay).await;
               state.apply(connect, device);
            });
            Ok(true)
         },
         PrimitiveMode::Silent => Ok(true),
         PrimitiveMode::Reject => Ok(false),
         PrimitiveMode::Error => Err(SpeakerError::MethodNotFound(format!("{method}(device)"))),
      }
   }
}
