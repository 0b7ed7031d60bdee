//! Acquisition of an audio profile session.
//!
//! The platform hands out profile proxies through a callback. This module
//! turns that callback into an awaitable bounded by a timeout.

use std::time::Duration;

use log::{debug, warn};
use tokio::{sync::oneshot, time};

use crate::{
   platform::{BluetoothAdapter, ProfileKind},
   toggle::completion::Completion,
};

/// Receives the outcome of a profile proxy request.
///
/// Only the first matching `on_connected` is kept; anything that arrives
/// after the requester stopped waiting is dropped.
pub struct ProfileListener<P> {
   expected: ProfileKind,
   completion: Completion<P>,
}

impl<P> Clone for ProfileListener<P> {
   fn clone(&self) -> Self {
      Self {
         expected: self.expected,
         completion: self.completion.clone(),
      }
   }
}

impl<P> ProfileListener<P> {
   pub fn new(expected: ProfileKind) -> (Self, oneshot::Receiver<P>) {
      let (completion, rx) = Completion::new();
      (Self { expected, completion }, rx)
   }

   pub fn on_connected(&self, kind: ProfileKind, proxy: Option<P>) {
      if kind != self.expected {
         debug!("Ignoring {kind} proxy, waiting for {}", self.expected);
         return;
      }
      let Some(proxy) = proxy else {
         debug!("Ignoring empty {kind} proxy");
         return;
      };
      if !self.completion.complete(proxy) {
         debug!("Discarding late {kind} proxy");
      }
   }

   /// Proxy teardown notice. Not an error while acquiring.
   pub fn on_disconnected(&self, kind: ProfileKind) {
      debug!("{kind} proxy disconnected");
   }
}

/// Requests the A2DP profile from `adapter` and waits up to `timeout` for it.
pub async fn acquire_profile_session<A: BluetoothAdapter>(
   adapter: &A,
   timeout: Duration,
) -> Option<A::Profile> {
   let (listener, rx) = ProfileListener::new(ProfileKind::A2dp);
   adapter.request_profile(ProfileKind::A2dp, listener);

   match time::timeout(timeout, rx).await {
      Ok(Ok(profile)) => Some(profile),
      Ok(Err(_)) => {
         warn!("A2DP profile request was dropped by the platform");
         None
      },
      Err(_) => {
         warn!("No A2DP profile within {timeout:?}");
         None
      },
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   use tokio::time::Instant;

   use crate::{
      platform::BluetoothPlatform,
      testing::{FakeAdapter, FakePlatform, ProfileMode, assert_elapsed},
   };

   const TIMEOUT: Duration = Duration::from_secs(5);

   async fn adapter_for(mode: ProfileMode) -> (FakePlatform, FakeAdapter) {
      let platform = FakePlatform::new();
      platform.set_profile_mode(mode);
      let adapter = platform.adapter().await.unwrap();
      (platform, adapter)
   }

   #[tokio::test(start_paused = true)]
   async fn test_immediate_proxy() {
      let (_platform, adapter) = adapter_for(ProfileMode::Immediate).await;
      assert!(acquire_profile_session(&adapter, TIMEOUT).await.is_some());
   }

   #[tokio::test(start_paused = true)]
   async fn test_silent_platform_times_out() {
      let (_platform, adapter) = adapter_for(ProfileMode::Never).await;
      let start = Instant::now();

      assert!(acquire_profile_session(&adapter, TIMEOUT).await.is_none());
      assert_elapsed(start, TIMEOUT);
   }

   #[tokio::test(start_paused = true)]
   async fn test_disconnect_notice_is_not_an_answer() {
      let (_platform, adapter) = adapter_for(ProfileMode::DisconnectedOnly).await;
      let start = Instant::now();

      assert!(acquire_profile_session(&adapter, TIMEOUT).await.is_none());
      assert_elapsed(start, TIMEOUT);
   }

   #[tokio::test(start_paused = true)]
   async fn test_late_proxy_discarded() {
      let (platform, adapter) =
         adapter_for(ProfileMode::Delayed(Duration::from_secs(6))).await;

      assert!(acquire_profile_session(&adapter, TIMEOUT).await.is_none());

      // Let the late delivery fire; it must land nowhere.
      time::sleep(Duration::from_secs(2)).await;
      assert_eq!(platform.proxy_deliveries(), 1);
   }

   #[test]
   fn test_listener_keeps_first_proxy() {
      let (listener, mut rx) = ProfileListener::new(ProfileKind::A2dp);
      listener.on_disconnected(ProfileKind::A2dp);
      listener.on_connected(ProfileKind::A2dp, None);
      listener.on_connected(ProfileKind::A2dp, Some(1));
      listener.clone().on_connected(ProfileKind::A2dp, Some(2));

      assert_eq!(rx.try_recv().unwrap(), 1);
   }
}
