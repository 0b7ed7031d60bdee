//! Lookup of paired speakers.

use log::{debug, error};

use crate::{
   device::DeviceRef,
   error::Result,
   platform::{BluetoothAdapter, BluetoothPlatform, PlatformDevice},
};

/// Returns the default adapter if it exists and is switched on.
pub async fn enabled_adapter<P: BluetoothPlatform>(platform: &P) -> Option<P::Adapter> {
   let adapter = platform.adapter().await?;
   if adapter.is_enabled().await {
      Some(adapter)
   } else {
      debug!("Bluetooth adapter is disabled");
      None
   }
}

/// Finds the bonded device with exactly this address.
pub async fn find_bonded<A: BluetoothAdapter>(
   adapter: &A,
   address: &str,
) -> Result<Option<PlatformDevice>> {
   let bonded = adapter.bonded_devices().await?;
   Ok(bonded.into_iter().find(|device| device.address == address))
}

/// Lists paired speakers sorted by name.
///
/// `None` means Bluetooth is unavailable or disabled; an empty list means
/// nothing is paired.
pub async fn paired_devices<P: BluetoothPlatform>(platform: &P) -> Option<Vec<DeviceRef>> {
   let adapter = enabled_adapter(platform).await?;
   match adapter.bonded_devices().await {
      Ok(bonded) => {
         let mut devices: Vec<DeviceRef> = bonded
            .into_iter()
            .map(|device| DeviceRef::new(device.name, device.address))
            .collect();
         devices.sort();
         Some(devices)
      },
      Err(e) => {
         error!("Failed to read bonded devices: {e}");
         None
      },
   }
}
