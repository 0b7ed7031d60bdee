//! User-facing progress of a toggle session.

use thiserror::Error;

use crate::device::ToggleOutcome;

/// Reasons a toggle session can end without reaching the requested state.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleError {
   #[error("Toggling already in progress")]
   AlreadyInProgress,

   #[error("Bluetooth disabled")]
   BluetoothDisabled,

   #[error("Speaker not paired")]
   SpeakerUnpaired,

   #[error("Failed to get audio profile")]
   ProfileUnavailable,

   #[error("Connecting failed")]
   ConnectFailed,

   #[error("Disconnecting failed")]
   DisconnectFailed,

   #[error("Toggle timed out")]
   TimedOut,

   #[error("Unknown error")]
   Unknown,
}

/// One step reported to the progress sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
   Starting,
   Connecting,
   Disconnecting,
   Finished(ToggleOutcome),
   Failed(ToggleError),
}

impl Progress {
   /// Renders the message shown for `name`.
   pub fn message(&self, name: &str) -> String {
      match self {
         Self::Starting => format!("starting for {name}"),
         Self::Connecting => format!("connecting to {name}"),
         Self::Disconnecting => format!("disconnecting from {name}"),
         Self::Finished(outcome) => match outcome {
            ToggleOutcome::Connected => format!("connected to {name}"),
            ToggleOutcome::Disconnected => format!("disconnected from {name}"),
            ToggleOutcome::AlreadyConnected => format!("already connected to {name}"),
            ToggleOutcome::AlreadyDisconnected => format!("already disconnected from {name}"),
         },
         Self::Failed(error) => match error {
            ToggleError::AlreadyInProgress => format!("toggle already in progress for {name}"),
            ToggleError::BluetoothDisabled => format!("Bluetooth disabled, cannot reach {name}"),
            ToggleError::SpeakerUnpaired => format!("{name} is not paired"),
            ToggleError::ProfileUnavailable => format!("failed to get profile for {name}"),
            ToggleError::ConnectFailed => format!("error connecting to {name} failed"),
            ToggleError::DisconnectFailed => format!("error disconnecting from {name} failed"),
            ToggleError::TimedOut => format!("timed out toggling {name}"),
            ToggleError::Unknown => format!("unknown error toggling {name}"),
         },
      }
   }
}
