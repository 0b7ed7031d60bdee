//! BlueZ backend for the toggle core.
//!
//! This module implements the platform traits on top of `bluer` and keeps
//! the state notifier fed from device property changes.

pub mod bluez;
pub mod monitor;

use uuid::Uuid;

use crate::platform::ProfileKind;

/// Advanced Audio Distribution, source role (the host side)
const A2DP_SOURCE_UUID: Uuid = Uuid::from_u128(0x0000110a_0000_1000_8000_00805f9b34fb);
/// Advanced Audio Distribution, sink role (the speaker side)
const A2DP_SINK_UUID: Uuid = Uuid::from_u128(0x0000110b_0000_1000_8000_00805f9b34fb);

/// Service UUID the adapter must offer to act on this profile.
const fn local_uuid(kind: ProfileKind) -> Uuid {
   match kind {
      ProfileKind::A2dp => A2DP_SOURCE_UUID,
   }
}

/// Service UUID a remote device exposes for this profile.
const fn remote_uuid(kind: ProfileKind) -> Uuid {
   match kind {
      ProfileKind::A2dp => A2DP_SINK_UUID,
   }
}
