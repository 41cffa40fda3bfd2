use std::env;
use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;
use log::{debug, info, warn, LevelFilter};
use tokio_util::sync::CancellationToken;

use crate::cli::Args;
use crate::config::io::load_config;
use crate::device::btle::BtlePlatform;
use crate::device::machine::{MachineSettings, SensorMachine};
use crate::error::AppRunError;
use crate::sink::UdpSink;

pub mod cadence;
pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod sink;

pub fn init_logging(level: LevelFilter) {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(
            fern::log_file(log_file).expect("Failed to open LOG_FILE")
        );
    }

    dispatch.apply().expect("Failed to initialize logger");
}

/// Cancel `cancel` on Ctrl-C, or when a line is read from stdin.
fn spawn_shutdown_listener(cancel: CancellationToken) {
    // a blocking read on stdin can not be cancelled, so it gets its own thread instead of a
    // tokio task that would keep the runtime from shutting down
    let key_press_cancel = cancel.clone();
    thread::spawn(move || {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => debug!("stdin is closed, only Ctrl-C will exit"),
            Ok(_) => {
                info!("Key press received, exiting");
                key_press_cancel.cancel();
            },
            Err(err) => warn!("Failed to read stdin: {}", err),
        }
    });

    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => {
                    info!("Ctrl-C received, exiting");
                    cancel.cancel();
                },
                Err(err) => warn!("Failed to listen for Ctrl-C: {}", err),
            }
        }
    });
}

pub async fn run(args: Args) -> Result<(), AppRunError> {
    let mut config = load_config(args.config.as_deref()).await?;
    config.apply_args(&args);

    let sink = UdpSink::bind(config.sink_socket_addr()?).await?;
    info!("Sending cadence to udp://{}", sink.target());

    let platform = BtlePlatform::new().await?;
    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    info!("Press Enter to exit");
    let machine = SensorMachine::new(platform, Arc::new(sink), MachineSettings::from(&config), cancel);
    machine.run().await;

    Ok(())
}
