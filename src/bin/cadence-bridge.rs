use clap::Parser;
use log::{error, info, LevelFilter};
use cadence_bridge::{init_logging, run};
use cadence_bridge::cli::Args;
use cadence_bridge::error::AppRunError;

#[tokio::main]
async fn main() -> Result<(), AppRunError> {
    let args = Args::parse();

    init_logging(if args.verbose { LevelFilter::Debug } else { LevelFilter::Info });
    info!(concat!("Cadence Bridge ", env!("CARGO_PKG_VERSION")));

    match run(args).await {
        Err(err) => {
            error!("Unexpected error: {}", err);
            Err(err)
        },
        Ok(_) => Ok(()),
    }
}
