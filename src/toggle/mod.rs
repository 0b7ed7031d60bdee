//! Speaker connection toggling.
//!
//! [`ToggleCoordinator`] runs one session at a time for the whole process:
//! it resolves the adapter and the paired device, acquires the A2DP profile,
//! picks a connect or disconnect strategy from the live connection state and
//! reports every step as a message naming the speaker. Each stage is bounded
//! by its own timeout and the whole session by an outer one.

mod completion;
mod progress;
mod session;
mod strategy;

use std::{
   sync::atomic::{AtomicBool, Ordering},
   time::Duration,
};

use log::{debug, error, info, warn};
use tokio::time;

pub use progress::{Progress, ToggleError};
pub use session::{ProfileListener, acquire_profile_session};
use strategy::{A2dpConnector, ConnectStrategy, ConnectionStrategy, DisconnectStrategy};

use crate::{
   device::{ConnectionIntent, DeviceRef, ToggleOutcome},
   error::SpeakerError,
   platform::{AudioProfile, BluetoothPlatform, PlatformDevice},
   registry,
};

/// Upper bound for a whole session
const TIMEOUT_ALL: Duration = Duration::from_secs(15);
/// Upper bound for acquiring the A2DP profile
const TIMEOUT_GET_SERVICE: Duration = Duration::from_secs(5);
/// Upper bound for a connect or disconnect to be confirmed
const TIMEOUT_CONNECT: Duration = Duration::from_secs(10);

/// Per-stage time limits of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
   pub overall: Duration,
   pub profile: Duration,
   pub connect: Duration,
}

impl Default for Timeouts {
   fn default() -> Self {
      Self {
         overall: TIMEOUT_ALL,
         profile: TIMEOUT_GET_SERVICE,
         connect: TIMEOUT_CONNECT,
      }
   }
}

/// Clears the in-progress flag when the session ends, however it ends.
struct InProgressGuard<'a>(&'a AtomicBool);

impl Drop for InProgressGuard<'_> {
   fn drop(&mut self) {
      self.0.store(false, Ordering::Release);
   }
}

/// Renders progress for one device and hands it to the caller.
struct ProgressSink<'a, F> {
   device: &'a DeviceRef,
   report: F,
}

impl<F: FnMut(String)> ProgressSink<'_, F> {
   fn report(&mut self, progress: Progress) {
      let message = progress.message(self.device.name());
      debug!("Progress for {}: {message}", self.device.address());
      (self.report)(message);
   }
}

/// Serializes connection changes across the process.
///
/// Share one instance (behind an `Arc`) between every caller; a session
/// started while another one runs is rejected, not queued.
pub struct ToggleCoordinator<P> {
   platform: P,
   timeouts: Timeouts,
   in_progress: AtomicBool,
}

impl<P: BluetoothPlatform> ToggleCoordinator<P> {
   pub const fn new(platform: P, timeouts: Timeouts) -> Self {
      Self {
         platform,
         timeouts,
         in_progress: AtomicBool::new(false),
      }
   }

   pub fn is_in_progress(&self) -> bool {
      self.in_progress.load(Ordering::Acquire)
   }

   /// Paired speakers sorted by name, or `None` if Bluetooth is unavailable.
   pub async fn paired_devices(&self) -> Option<Vec<DeviceRef>> {
      registry::paired_devices(&self.platform).await
   }

   /// The paired speaker with this address.
   pub async fn paired_device(&self, address: &str) -> crate::error::Result<DeviceRef> {
      self
         .paired_devices()
         .await
         .ok_or(SpeakerError::BluetoothUnavailable)?
         .into_iter()
         .find(|device| device.address() == address)
         .ok_or_else(|| SpeakerError::DeviceNotPaired(address.to_string()))
   }

   /// Connects `device` if it is disconnected and disconnects it otherwise.
   pub async fn toggle<F>(
      &self,
      device: &DeviceRef,
      on_progress: F,
   ) -> Result<ToggleOutcome, ToggleError>
   where
      F: FnMut(String) + Send,
   {
      self.run(device, ConnectionIntent::Toggle, on_progress).await
   }

   /// Runs one session for `intent`.
   ///
   /// `on_progress` receives every step in order and exactly one terminal
   /// message; it is never called after this returns. The result mirrors the
   /// terminal message.
   pub async fn run<F>(
      &self,
      device: &DeviceRef,
      intent: ConnectionIntent,
      on_progress: F,
   ) -> Result<ToggleOutcome, ToggleError>
   where
      F: FnMut(String) + Send,
   {
      let mut sink = ProgressSink {
         device,
         report: on_progress,
      };

      let Some(_guard) = self.try_begin() else {
         warn!("Toggling already in progress, rejecting {device}");
         sink.report(Progress::Failed(ToggleError::AlreadyInProgress));
         return Err(ToggleError::AlreadyInProgress);
      };

      info!("Running {intent} for {device} ({})", device.address());
      let stages = self.run_stages(device, intent, &mut sink);
      let result = match time::timeout(self.timeouts.overall, stages).await {
         Ok(result) => result,
         Err(_) => {
            warn!("Toggling {device} exceeded {:?}", self.timeouts.overall);
            Err(ToggleError::TimedOut)
         },
      };

      match result {
         Ok(outcome) => info!("Finished {intent} for {device}: {outcome:?}"),
         Err(e) => {
            warn!("Failed {intent} for {device}: {e}");
            sink.report(Progress::Failed(e));
         },
      }
      result
   }

   fn try_begin(&self) -> Option<InProgressGuard<'_>> {
      self
         .in_progress
         .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
         .ok()
         .map(|_| InProgressGuard(&self.in_progress))
   }

   async fn run_stages<F>(
      &self,
      device: &DeviceRef,
      intent: ConnectionIntent,
      sink: &mut ProgressSink<'_, F>,
   ) -> Result<ToggleOutcome, ToggleError>
   where
      F: FnMut(String) + Send,
   {
      sink.report(Progress::Starting);

      let adapter = registry::enabled_adapter(&self.platform)
         .await
         .ok_or(ToggleError::BluetoothDisabled)?;

      let target = registry::find_bonded(&adapter, device.address())
         .await
         .map_err(|e| {
            error!("Failed to read bonded devices: {e}");
            ToggleError::Unknown
         })?
         .ok_or(ToggleError::SpeakerUnpaired)?;

      let profile = acquire_profile_session(&adapter, self.timeouts.profile)
         .await
         .ok_or(ToggleError::ProfileUnavailable)?;

      let connected = profile
         .connected_devices()
         .await
         .map_err(|e| {
            error!("Failed to read connected devices: {e}");
            ToggleError::Unknown
         })?
         .iter()
         .any(|d| d.address == target.address);
      debug!("{device} is currently connected={connected}");

      let connector = A2dpConnector::new(&profile, self.platform.state_notifier());
      match (connected, intent.wants_connected(connected)) {
         (false, true) => {
            let strategy = ConnectStrategy::new(&connector);
            self.apply_strategy(&strategy, &target, sink).await
         },
         (true, false) => {
            let strategy = DisconnectStrategy::new(&connector);
            self.apply_strategy(&strategy, &target, sink).await
         },
         (true, true) => {
            sink.report(Progress::Finished(ToggleOutcome::AlreadyConnected));
            Ok(ToggleOutcome::AlreadyConnected)
         },
         (false, false) => {
            sink.report(Progress::Finished(ToggleOutcome::AlreadyDisconnected));
            Ok(ToggleOutcome::AlreadyDisconnected)
         },
      }
   }

   async fn apply_strategy<S, F>(
      &self,
      strategy: &S,
      device: &PlatformDevice,
      sink: &mut ProgressSink<'_, F>,
   ) -> Result<ToggleOutcome, ToggleError>
   where
      S: ConnectionStrategy,
      F: FnMut(String) + Send,
   {
      sink.report(strategy.starting());

      if !strategy.connection_method(device, self.timeouts.connect).await {
         return Err(strategy.failure());
      }

      let outcome = strategy.success();
      sink.report(Progress::Finished(outcome));
      Ok(outcome)
   }
}
