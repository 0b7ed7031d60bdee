//! Connect and disconnect strategies.
//!
//! Both strategies drive the same protocol: subscribe to state changes,
//! invoke the profile primitive, then wait for the matching change. The
//! subscription is scoped to one attempt and released on every exit path.

use std::{future::Future, time::Duration};

use log::{debug, error, warn};
use tokio::time;

use crate::{
   device::ToggleOutcome,
   notifier::StateNotifier,
   platform::{AudioProfile, PlatformDevice},
   toggle::progress::{Progress, ToggleError},
};

/// Profile operations that change the connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectPrimitive {
   Connect,
   Disconnect,
}

impl ConnectPrimitive {
   pub const fn method_name(self) -> &'static str {
      match self {
         Self::Connect => "connect",
         Self::Disconnect => "disconnect",
      }
   }

   /// Connected state the device reaches once the primitive succeeds.
   pub const fn target_state(self) -> bool {
      matches!(self, Self::Connect)
   }
}

/// Runs connection primitives against an A2DP profile.
pub struct A2dpConnector<'a, P> {
   profile: &'a P,
   notifier: &'a StateNotifier,
}

impl<'a, P: AudioProfile> A2dpConnector<'a, P> {
   pub const fn new(profile: &'a P, notifier: &'a StateNotifier) -> Self {
      Self { profile, notifier }
   }

   pub async fn connect_device(&self, device: &PlatformDevice, timeout: Duration) -> bool {
      self.execute(device, timeout, ConnectPrimitive::Connect).await
   }

   pub async fn disconnect_device(&self, device: &PlatformDevice, timeout: Duration) -> bool {
      self.execute(device, timeout, ConnectPrimitive::Disconnect).await
   }

   async fn execute(
      &self,
      device: &PlatformDevice,
      timeout: Duration,
      primitive: ConnectPrimitive,
   ) -> bool {
      // Subscribe before invoking so a fast state flip is not missed.
      let mut subscription = self.notifier.subscribe();
      debug!(
         "Watching {} for connected={} ({} subscribers)",
         device.address,
         primitive.target_state(),
         self.notifier.subscriber_count()
      );

      if !self.invoke(device, primitive).await {
         return false;
      }

      let target = primitive.target_state();
      match time::timeout(timeout, subscription.wait_for(target, &device.address)).await {
         Ok(confirmed) => confirmed,
         Err(_) => {
            warn!(
               "{} ({}) did not report connected={target} within {timeout:?}",
               device.name, device.address
            );
            false
         },
      }
   }

   async fn invoke(&self, device: &PlatformDevice, primitive: ConnectPrimitive) -> bool {
      let method = primitive.method_name();
      match self.profile.invoke(method, device).await {
         Ok(true) => {
            debug!("Initiated {method} for {}", device.address);
            true
         },
         Ok(false) => {
            warn!("{method} was not initiated for {}", device.address);
            false
         },
         Err(e) => {
            error!("Exception calling {method} for {}: {e}", device.address);
            false
         },
      }
   }
}

/// One direction of a connection change.
pub trait ConnectionStrategy: Send + Sync {
   fn starting(&self) -> Progress;

   fn success(&self) -> ToggleOutcome;

   fn failure(&self) -> ToggleError;

   /// Attempts the change and reports whether it was confirmed in time.
   fn connection_method(
      &self,
      device: &PlatformDevice,
      timeout: Duration,
   ) -> impl Future<Output = bool> + Send;
}

pub struct ConnectStrategy<'a, P> {
   connector: &'a A2dpConnector<'a, P>,
}

impl<'a, P> ConnectStrategy<'a, P> {
   pub const fn new(connector: &'a A2dpConnector<'a, P>) -> Self {
      Self { connector }
   }
}

impl<P: AudioProfile> ConnectionStrategy for ConnectStrategy<'_, P> {
   fn starting(&self) -> Progress {
      Progress::Connecting
   }

   fn success(&self) -> ToggleOutcome {
      ToggleOutcome::Connected
   }

   fn failure(&self) -> ToggleError {
      ToggleError::ConnectFailed
   }

   async fn connection_method(&self, device: &PlatformDevice, timeout: Duration) -> bool {
      self.connector.connect_device(device, timeout).await
   }
}

pub struct DisconnectStrategy<'a, P> {
   connector: &'a A2dpConnector<'a, P>,
}

impl<'a, P> DisconnectStrategy<'a, P> {
   pub const fn new(connector: &'a A2dpConnector<'a, P>) -> Self {
      Self { connector }
   }
}

impl<P: AudioProfile> ConnectionStrategy for DisconnectStrategy<'_, P> {
   fn starting(&self) -> Progress {
      Progress::Disconnecting
   }

   fn success(&self) -> ToggleOutcome {
      ToggleOutcome::Disconnected
   }

   fn failure(&self) -> ToggleError {
      ToggleError::DisconnectFailed
   }

   async fn connection_method(&self, device: &PlatformDevice, timeout: Duration) -> bool {
      self.connector.disconnect_device(device, timeout).await
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   use tokio::time::Instant;

   use crate::{
      notifier::{ConnectionStateEvent, ProfileState},
      testing::{FakePlatform, PrimitiveMode, SPEAKER_A, SPEAKER_B, assert_elapsed},
   };

   const TIMEOUT: Duration = Duration::from_secs(10);

   fn speaker(platform: &FakePlatform, (name, address): (&str, &str)) -> PlatformDevice {
      platform.pair(name, address);
      PlatformDevice {
         address: address.to_string(),
         name: name.to_string(),
      }
   }

   #[tokio::test(start_paused = true)]
   async fn test_connect_confirmed() {
      let platform = FakePlatform::new();
      let device = speaker(&platform, SPEAKER_A);
      platform.set_primitive_mode(PrimitiveMode::Confirm(Duration::from_secs(2)));

      let profile = platform.profile();
      let connector = A2dpConnector::new(&profile, platform.notifier());
      let start = Instant::now();

      assert!(connector.connect_device(&device, TIMEOUT).await);
      assert_elapsed(start, Duration::from_secs(2));
      assert_eq!(platform.notifier().subscriber_count(), 0);
   }

   #[tokio::test(start_paused = true)]
   async fn test_confirmation_before_invoke_returns() {
      let platform = FakePlatform::new();
      let device = speaker(&platform, SPEAKER_A);
      platform.set_connected(SPEAKER_A.1, true);
      platform.set_primitive_mode(PrimitiveMode::Confirm(Duration::ZERO));

      let profile = platform.profile();
      let connector = A2dpConnector::new(&profile, platform.notifier());

      assert!(connector.disconnect_device(&device, TIMEOUT).await);
      assert!(!platform.is_connected(SPEAKER_A.1));
   }

   #[tokio::test(start_paused = true)]
   async fn test_missing_confirmation_times_out() {
      let platform = FakePlatform::new();
      let device = speaker(&platform, SPEAKER_A);
      platform.set_primitive_mode(PrimitiveMode::Silent);

      let profile = platform.profile();
      let connector = A2dpConnector::new(&profile, platform.notifier());
      let start = Instant::now();

      assert!(!connector.connect_device(&device, TIMEOUT).await);
      assert_elapsed(start, TIMEOUT);
      assert_eq!(platform.notifier().subscriber_count(), 0);
   }

   #[tokio::test(start_paused = true)]
   async fn test_other_device_does_not_confirm() {
      let platform = FakePlatform::new();
      let device = speaker(&platform, SPEAKER_A);
      let other = speaker(&platform, SPEAKER_B);
      platform.set_primitive_mode(PrimitiveMode::Silent);

      let notifier = platform.notifier().clone();
      tokio::spawn(async move {
         time::sleep(Duration::from_secs(1)).await;
         notifier.publish(ConnectionStateEvent {
            state: ProfileState::Connected,
            device: Some(other),
         });
      });

      let profile = platform.profile();
      let connector = A2dpConnector::new(&profile, platform.notifier());
      assert!(!connector.connect_device(&device, TIMEOUT).await);
   }

   #[tokio::test(start_paused = true)]
   async fn test_rejected_primitive_fails_fast() {
      for mode in [PrimitiveMode::Reject, PrimitiveMode::Error] {
         let platform = FakePlatform::new();
         let device = speaker(&platform, SPEAKER_A);
         platform.set_primitive_mode(mode);

         let profile = platform.profile();
         let connector = A2dpConnector::new(&profile, platform.notifier());
         let start = Instant::now();

         assert!(!connector.connect_device(&device, TIMEOUT).await);
         assert_elapsed(start, Duration::ZERO);
         assert_eq!(platform.notifier().subscriber_count(), 0);
      }
   }

   #[tokio::test(start_paused = true)]
   async fn test_no_listener_left_after_attempt() {
      let platform = FakePlatform::new();
      let device = speaker(&platform, SPEAKER_A);
      platform.set_primitive_mode(PrimitiveMode::Confirm(Duration::from_millis(100)));

      let profile = platform.profile();
      let connector = A2dpConnector::new(&profile, platform.notifier());
      let strategy = ConnectStrategy::new(&connector);
      assert!(strategy.connection_method(&device, TIMEOUT).await);

      platform.notifier().publish(ConnectionStateEvent {
         state: ProfileState::Disconnected,
         device: Some(device),
      });
      assert_eq!(platform.notifier().subscriber_count(), 0);
      assert_eq!(strategy.success(), ToggleOutcome::Connected);
   }

   #[test]
   fn test_primitive_names() {
      assert_eq!(ConnectPrimitive::Connect.method_name(), "connect");
      assert_eq!(ConnectPrimitive::Disconnect.method_name(), "disconnect");
      assert!(ConnectPrimitive::Connect.target_state());
      assert!(!ConnectPrimitive::Disconnect.target_state());
   }
}
