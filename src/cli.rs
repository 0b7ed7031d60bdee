use bluer::Address;
use clap::{Parser, Subcommand};

/// Connect, disconnect, or toggle a paired Bluetooth speaker
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
   #[command(subcommand)]
   pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
   /// Run the D-Bus service
   Serve,

   /// List paired speakers
   List,

   /// Connect the speaker if it is disconnected, disconnect it otherwise
   Toggle {
      /// Speaker address (the selected speaker if unspecified)
      address: Option<Address>,
   },

   /// Connect the speaker
   Connect {
      /// Speaker address (the selected speaker if unspecified)
      address: Option<Address>,
   },

   /// Disconnect the speaker
   Disconnect {
      /// Speaker address (the selected speaker if unspecified)
      address: Option<Address>,
   },

   /// Remember a paired speaker as the default target
   Select {
      /// Speaker address
      address: Address,
   },
}
