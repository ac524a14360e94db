use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "roster")]
#[command(about = "Reconcile reservation shadows into the local roster database")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Bring the local copy of a reservation up to its remote shadow
    Reconcile {
        /// Reservation code (shadow name)
        code: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the remote shadow document without storing it
    Fetch {
        /// Reservation code (shadow name)
        code: String,
    },
    /// Show the locally stored reservation
    Show {
        /// Reservation code (shadow name)
        code: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a reservation and its members from the local database
    Delete {
        /// Reservation code (shadow name)
        code: String,
    },
    /// Delete the remote shadow, then the local copy
    Purge {
        /// Reservation code (shadow name)
        code: String,
    },
    /// Run a JSON operation event, e.g. {"operation":"reconcile","shadowName":"HMABC123"}
    Dispatch {
        /// Event JSON (read from stdin when omitted)
        #[arg(long, value_name = "JSON")]
        event: Option<String>,
    },
}
