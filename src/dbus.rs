use std::{str::FromStr, sync::Arc, time::Duration};

use bluer::Address;
use log::info;
use parking_lot::Mutex;
use zbus::{interface, object_server::SignalEmitter};

use crate::{
   bluetooth::bluez::BluezPlatform,
   config::Config,
   device::{ConnectionIntent, DeviceRef, ToggleOutcome},
   error::SpeakerError,
   event::{EventBus, EventSender, SpeakerEvent},
   platform::BluetoothPlatform,
   status::StatusBoard,
   toggle::{Progress, ToggleCoordinator, ToggleError},
};

pub type Coordinator = ToggleCoordinator<BluezPlatform>;

pub struct SpeakerService {
   coordinator: Arc<Coordinator>,
   events: EventSender,
   status: Arc<StatusBoard>,
   config: Arc<Mutex<Config>>,
}

impl SpeakerService {
   pub fn new(coordinator: Arc<Coordinator>, events: EventSender, config: Config) -> Self {
      Self {
         coordinator,
         events,
         status: StatusBoard::new(),
         config: Arc::new(Mutex::new(config)),
      }
   }

   fn start_session(
      &self,
      address: &str,
      name: &str,
      intent: ConnectionIntent,
   ) -> zbus::fdo::Result<()> {
      let device = parse_device(address, name)?;
      let coordinator = self.coordinator.clone();
      let events = self.events.clone();
      let status = self.status.clone();
      let reset_delay = self.config.lock().status_reset();

      tokio::spawn(async move {
         let _ = run_session(&coordinator, &device, intent, &*events, &status, reset_delay).await;
      });
      Ok(())
   }
}

/// Runs one session, mirroring its progress into events and the status line.
///
/// A request rejected because another session runs only emits its events;
/// the running session keeps the status line and its reset timer.
async fn run_session<P: BluetoothPlatform>(
   coordinator: &ToggleCoordinator<P>,
   device: &DeviceRef,
   intent: ConnectionIntent,
   events: &dyn EventBus,
   status: &Arc<StatusBoard>,
   reset_delay: Duration,
) -> Result<ToggleOutcome, ToggleError> {
   let rejection = Progress::Failed(ToggleError::AlreadyInProgress).message(device.name());

   let result = coordinator
      .run(device, intent, |message| {
         if message != rejection {
            status.update(&message);
         }
         events.emit(device, SpeakerEvent::Progress(message));
      })
      .await;

   if result != Err(ToggleError::AlreadyInProgress) {
      status.finish(reset_delay);
   }
   events.emit(device, SpeakerEvent::Finished {
      success: result.is_ok(),
   });
   result
}

/// Builds a device from D-Bus arguments; an empty name falls back to the address.
fn parse_device(address: &str, name: &str) -> zbus::fdo::Result<DeviceRef> {
   let address = parse_address(address)?;
   let name = if name.is_empty() { address.clone() } else { name.to_string() };
   Ok(DeviceRef::new(name, address))
}

/// Normalizes a textual Bluetooth address.
fn parse_address(address: &str) -> zbus::fdo::Result<String> {
   Address::from_str(address)
      .map(|addr| addr.to_string())
      .map_err(|e| zbus::fdo::Error::InvalidArgs(e.to_string()))
}

#[interface(name = "org.speakerctl.Speaker")]
impl SpeakerService {
   async fn paired_devices(&self) -> zbus::fdo::Result<String> {
      let devices = self
         .coordinator
         .paired_devices()
         .await
         .ok_or_else(|| zbus::fdo::Error::Failed("Bluetooth unavailable".into()))?;
      serde_json::to_string(&devices).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
   }

   async fn toggle(&self, address: String, name: String) -> zbus::fdo::Result<()> {
      self.start_session(&address, &name, ConnectionIntent::Toggle)
   }

   async fn connect(&self, address: String, name: String) -> zbus::fdo::Result<()> {
      self.start_session(&address, &name, ConnectionIntent::Connect)
   }

   async fn disconnect(&self, address: String, name: String) -> zbus::fdo::Result<()> {
      self.start_session(&address, &name, ConnectionIntent::Disconnect)
   }

   async fn select_device(&self, address: String) -> zbus::fdo::Result<String> {
      let address = parse_address(&address)?;
      let device = self
         .coordinator
         .paired_device(&address)
         .await
         .map_err(|e| match e {
            SpeakerError::DeviceNotPaired(_) => zbus::fdo::Error::InvalidArgs(e.to_string()),
            e => zbus::fdo::Error::Failed(e.to_string()),
         })?;

      let mut config = self.config.lock();
      config.last_device = Some(device.clone());
      config
         .save()
         .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;

      info!("Selected speaker {device} ({})", device.address());
      serde_json::to_string(&device).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
   }

   async fn selected_device(&self) -> zbus::fdo::Result<String> {
      let selected = self.config.lock().last_device.clone();
      serde_json::to_string(&selected).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
   }

   // Signals
   #[zbus(signal)]
   pub async fn progress(
      emitter: &SignalEmitter<'_>,
      address: &str,
      message: &str,
   ) -> zbus::Result<()>;

   #[zbus(signal)]
   pub async fn finished(emitter: &SignalEmitter<'_>, address: &str, success: bool)
   -> zbus::Result<()>;

   #[zbus(property)]
   async fn status(&self) -> String {
      self.status.current().to_string()
   }

   #[zbus(property)]
   async fn busy(&self) -> bool {
      self.coordinator.is_in_progress()
   }
}
