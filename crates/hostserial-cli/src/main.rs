//! `hostserial-echo`: USB serial echo demo.
//!
//! Sends "USB says hello" periodically and writes every received byte
//! straight back. The simulated adapter side logs what it receives so the
//! round trip is visible.

mod cli;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use hostserial_core::{DeviceFilter, LineConfiguration};
use hostserial_hardware::mock::{MockDeviceSpec, MockUsbHost, MockUsbHostHandle};
use hostserial_transport::{SerialTransport, TransportConfig, UsbHost};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

const GREETING: &[u8] = b"USB says hello\n";

/// How often the echo loop checks for received data.
const ECHO_POLL: Duration = Duration::from_millis(10);

fn load_config(cli: &Cli) -> Result<TransportConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => TransportConfig::default(),
    };

    if cli.vid.is_some() || cli.pid.is_some() {
        config.filter = DeviceFilter::from_ids(cli.vid.unwrap_or(0), cli.pid.unwrap_or(0));
    }
    Ok(config)
}

/// Play the adapter: plug it in, then feed a numbered line every interval
/// and log whatever the transport sent out.
async fn simulate_adapter(handle: MockUsbHostHandle, feed_every: Duration) {
    tokio::time::sleep(Duration::from_millis(500)).await;
    handle.attach(MockDeviceSpec::ftdi());
    info!("Simulated adapter plugged in");

    let mut seen = 0;
    let mut line = 0u32;
    let mut feed = tokio::time::interval(feed_every);
    feed.tick().await;

    loop {
        feed.tick().await;

        let sent = handle.transmitted();
        if sent.len() > seen {
            let text = String::from_utf8_lossy(&sent[seen..]);
            info!(text = %text.trim_end(), "Adapter received");
            seen = sent.len();
        }

        line += 1;
        let text = format!("line {line}\n");
        if !handle.receive(text.as_bytes()) {
            warn!("Adapter not open yet, input dropped");
        }
    }
}

async fn run(port: &SerialTransport, hello_every: Duration) {
    let mut hello = tokio::time::interval(hello_every);
    let mut poll = tokio::time::interval(ECHO_POLL);
    let mut buf = [0u8; 256];

    loop {
        tokio::select! {
            _ = hello.tick() => {
                if port.write(GREETING).await == 0 {
                    warn!(pending = port.pending_tx(), "Greeting not queued");
                }
            }
            _ = poll.tick() => {
                if port.available() == 0 {
                    continue;
                }
                let len = port.read(&mut buf).await;
                if len > 0 && port.write(&buf[..len]).await == 0 {
                    warn!(len, "Echo not queued");
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let line = LineConfiguration::from_raw(cli.baud, cli.stop_bits, cli.parity, cli.data_bits)
        .context("invalid line coding")?;

    let (stack, handle) = MockUsbHost::new();
    let port = SerialTransport::new(UsbHost::new(stack), config)
        .context("creating serial transport")?;
    port.begin(line).await.context("starting serial transport")?;

    tokio::spawn(simulate_adapter(handle, cli.feed_interval()));

    let stop = async {
        match cli.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Ctrl-C handler failed, stopping");
                }
            }
        }
    };

    tokio::select! {
        _ = stop => info!("Stopping"),
        _ = run(&port, cli.hello_interval()) => {}
    }

    port.end().await.context("stopping serial transport")?;
    Ok(())
}
