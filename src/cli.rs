use std::path::PathBuf;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version)]
#[command(about = "Reads cadence from a bluetooth cycling speed and cadence sensor and sends it to a local UDP listener.\n\nPress Enter or Ctrl-C to exit.", long_about = None)]
pub struct Args {
    /// Read settings from this JSON file instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Advertised name of the sensor to connect to (exact match)
    #[arg(long)]
    pub name: Option<String>,

    /// Address to send cadence values to, for example 127.0.0.1:3300
    #[arg(long)]
    pub sink: Option<String>,

    /// How often (milliseconds) to re-evaluate the connection state
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// How long (milliseconds) connecting to the sensor may take
    #[arg(long)]
    pub negotiation_timeout: Option<u64>,

    /// Start cadence tracking from zero whenever the sensor reconnects
    #[arg(long)]
    pub reset_tracker_on_connect: bool,

    /// Log debug output
    #[arg(short, long)]
    pub verbose: bool,
}
