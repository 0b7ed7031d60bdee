//! Bluetooth speaker connection toggle.
//!
//! Connects, disconnects, or toggles a paired A2DP speaker through BlueZ,
//! either once from the command line or as a D-Bus service that reports
//! progress through signals.

use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use log::{info, warn};
use tokio::signal;
use zbus::{Connection, connection, object_server::InterfaceRef};

use bluetooth::bluez::BluezPlatform;
use cli::{Args, Command};
use config::Config;
use dbus::{Coordinator, SpeakerService};
use device::{ConnectionIntent, DeviceRef};
use event::{SignalQueue, SpeakerEvent};
use toggle::ToggleCoordinator;

mod bluetooth;
mod cli;
mod config;
mod dbus;
mod device;
mod error;
mod event;
mod notifier;
mod platform;
mod registry;
mod status;
#[cfg(test)]
mod testing;
mod toggle;

use crate::{
   dbus::SpeakerServiceSignals,
   error::{Result, SpeakerError},
};

#[tokio::main]
async fn main() -> Result<ExitCode> {
   env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

   let args = Args::parse();
   let mut config = Config::load()?;

   let session = bluer::Session::new().await?;
   let platform = BluezPlatform::new(session).await;
   let coordinator = Arc::new(ToggleCoordinator::new(platform, config.timeouts()));

   match args.command {
      Command::Serve => serve(coordinator, config).await,
      Command::List => list(&coordinator).await,
      Command::Toggle { address } => {
         run_intent(&coordinator, &config, address, ConnectionIntent::Toggle).await
      },
      Command::Connect { address } => {
         run_intent(&coordinator, &config, address, ConnectionIntent::Connect).await
      },
      Command::Disconnect { address } => {
         run_intent(&coordinator, &config, address, ConnectionIntent::Disconnect).await
      },
      Command::Select { address } => select(&coordinator, &mut config, address).await,
   }
}

async fn serve(coordinator: Arc<Coordinator>, config: Config) -> Result<ExitCode> {
   info!("Starting speakerctl D-Bus service...");

   let signals = SignalQueue::new();
   let service = SpeakerService::new(coordinator, signals.clone(), config);

   let connection = connection::Builder::session()?
      .name("org.speakerctl")?
      .serve_at("/org/speakerctl", service)?
      .build()
      .await?;

   info!("speakerctl D-Bus service started at org.speakerctl");

   spawn_signal_dispatcher(signals, &connection).await?;

   signal::ctrl_c().await?;
   info!("Shutting down speakerctl service...");

   Ok(ExitCode::SUCCESS)
}

async fn list(coordinator: &Coordinator) -> Result<ExitCode> {
   let devices = coordinator
      .paired_devices()
      .await
      .ok_or(SpeakerError::BluetoothUnavailable)?;

   if devices.is_empty() {
      println!("No paired speakers");
   }
   for device in devices {
      println!("{}  {}", device.address(), device.name());
   }
   Ok(ExitCode::SUCCESS)
}

async fn run_intent(
   coordinator: &Coordinator,
   config: &Config,
   address: Option<bluer::Address>,
   intent: ConnectionIntent,
) -> Result<ExitCode> {
   let device = match address {
      Some(address) => resolve_paired(coordinator, address).await,
      None => config
         .last_device
         .clone()
         .ok_or(SpeakerError::NoDeviceSelected)?,
   };

   let result = match intent {
      ConnectionIntent::Toggle => coordinator.toggle(&device, print_progress).await,
      intent => coordinator.run(&device, intent, print_progress).await,
   };

   Ok(if result.is_ok() {
      ExitCode::SUCCESS
   } else {
      ExitCode::FAILURE
   })
}

fn print_progress(message: String) {
   println!("{message}");
}

/// Names `address` after its paired device; unknown addresses keep the address as name.
async fn resolve_paired(coordinator: &Coordinator, address: bluer::Address) -> DeviceRef {
   let address = address.to_string();
   coordinator
      .paired_device(&address)
      .await
      .unwrap_or_else(|_| DeviceRef::new(address.clone(), address))
}

async fn select(
   coordinator: &Coordinator,
   config: &mut Config,
   address: bluer::Address,
) -> Result<ExitCode> {
   let device = coordinator.paired_device(&address.to_string()).await?;

   println!("Selected {} ({})", device.name(), device.address());
   config.last_device = Some(device);
   config.save()?;
   Ok(ExitCode::SUCCESS)
}

/// Forwards queued session events as D-Bus signals until the process exits.
async fn spawn_signal_dispatcher(queue: Arc<SignalQueue>, connection: &Connection) -> Result<()> {
   let iface = connection
      .object_server()
      .interface::<_, SpeakerService>("/org/speakerctl")
      .await?;
   tokio::spawn(async move {
      loop {
         let (device, event) = queue.next().await;
         if let Err(e) = emit_signal(&iface, &device, event).await {
            warn!("Error emitting signal for {device}: {e}");
         }
      }
   });
   Ok(())
}

async fn emit_signal(
   iface: &InterfaceRef<SpeakerService>,
   device: &DeviceRef,
   event: SpeakerEvent,
) -> zbus::Result<()> {
   match event {
      SpeakerEvent::Progress(message) => iface.progress(device.address(), &message).await,
      SpeakerEvent::Finished { success } => iface.finished(device.address(), success).await,
   }
}
