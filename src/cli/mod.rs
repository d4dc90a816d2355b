//! CLI for the offline gateway
//!
//! - `serve`: run the gateway
//! - `verify`: check that every precache asset can be fetched

pub mod serve;
pub mod verify;

use clap::{Parser, Subcommand};

/// Offline gateway for the personal finance web app
#[derive(Parser)]
#[command(name = "pfm-offline-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the gateway
    Serve(serve::ServeArgs),

    /// Fetch the precache manifest once and report assets that would fail an install
    Verify,
}
