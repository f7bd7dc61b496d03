//! Rollcall command-line reader.
//!
//! Connects to a card reader and prints identifiers as JSON lines on stdout.
//! Logs go to stderr.

mod args;

use anyhow::{Context, bail};
use args::{Cli, Command, TransportArgs};
use clap::Parser;
use rollcall_core::ConnectionState;
use rollcall_hardware::keyboard::StreamKeyboard;
use rollcall_reader::{CardReader, CardReaderBuilder, Identifier, ReaderConfig, ReaderError};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let mut config = load_config(cli.config.as_deref())?;
    cli.overrides.apply(&mut config);
    config.validate()?;

    match cli.command {
        Command::Listen => listen(build_reader(cli.transports, config)?).await,
        Command::Read { timeout_ms } => {
            let reader = build_reader(cli.transports, config)?;
            read_once(reader, Duration::from_millis(timeout_ms)).await
        }
        Command::Devices => list_devices(&config).await,
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ReaderConfig> {
    let Some(path) = path else {
        return Ok(ReaderConfig::default());
    };

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = ReaderConfig::from_json(&text)
        .with_context(|| format!("invalid configuration in {}", path.display()))?;

    info!(path = %path.display(), "Loaded reader configuration");
    Ok(config)
}

fn build_reader(transports: TransportArgs, config: ReaderConfig) -> anyhow::Result<CardReader> {
    let all = transports.offer_all();
    let mut builder = CardReader::builder();

    if all || transports.radio {
        builder = offer_radio(builder, transports.radio)?;
    }
    if all || transports.hid {
        builder = offer_hid(builder, &config, transports.hid)?;
    }
    if all || transports.keyboard {
        builder = builder.with_keyboard(StreamKeyboard::stdin());
    }

    let reader = builder.config(config).build()?;
    if let Some(kind) = reader.reader_type() {
        info!(transport = %kind, "Card reader ready");
    }
    Ok(reader)
}

#[cfg(feature = "hardware-pcsc")]
fn offer_radio(builder: CardReaderBuilder, _explicit: bool) -> anyhow::Result<CardReaderBuilder> {
    Ok(builder.with_radio(rollcall_hardware::smartcard::PcscScanner::new()))
}

#[cfg(not(feature = "hardware-pcsc"))]
fn offer_radio(builder: CardReaderBuilder, explicit: bool) -> anyhow::Result<CardReaderBuilder> {
    if explicit {
        bail!("radio scan needs a build with the hardware-pcsc feature");
    }
    Ok(builder)
}

#[cfg(feature = "hardware-usb")]
fn offer_hid(
    builder: CardReaderBuilder,
    config: &ReaderConfig,
    explicit: bool,
) -> anyhow::Result<CardReaderBuilder> {
    match rollcall_hardware::usb::UsbHidBackend::new(config.device_filters.clone()) {
        Ok(backend) => Ok(builder.with_hid(backend)),
        Err(e) if explicit => Err(e).context("failed to initialize HID"),
        Err(e) => {
            warn!(error = %e, "HID unavailable");
            Ok(builder)
        }
    }
}

#[cfg(not(feature = "hardware-usb"))]
fn offer_hid(
    builder: CardReaderBuilder,
    _config: &ReaderConfig,
    explicit: bool,
) -> anyhow::Result<CardReaderBuilder> {
    if explicit {
        bail!("HID readers need a build with the hardware-usb feature");
    }
    Ok(builder)
}

/// Attach a hint telling the operator whether retrying can help.
fn reader_failure(error: ReaderError) -> anyhow::Error {
    let hint = if error.is_recoverable() {
        "card reader failed, present the card or reconnect the reader and retry"
    } else {
        "card reader needs attention before retrying"
    };
    anyhow::Error::new(error).context(hint)
}

/// Connect, or wait for the automatic reconnect to settle.
async fn ensure_connected(reader: &CardReader) -> anyhow::Result<()> {
    match reader.connect().await {
        Ok(()) => Ok(()),
        Err(ReaderError::NoDeviceSelected) => bail!("no matching card reader found"),
        Err(e) => Err(reader_failure(e)),
    }
}

async fn listen(reader: CardReader) -> anyhow::Result<()> {
    let mut identifiers = reader.identifiers();
    let mut snapshots = reader.subscribe();
    ensure_connected(&reader).await?;
    info!("Listening for cards, press Ctrl+C to stop");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break Ok(());
            }
            received = identifiers.recv() => match received {
                Ok(identifier) => print_identifier(&identifier)?,
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Card reads dropped"),
                Err(RecvError::Closed) => break Ok(()),
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break Ok(());
                }

                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.connection_state == ConnectionState::Error {
                    if let Some(error) = snapshot.error {
                        break Err(reader_failure(error));
                    }
                } else if let Some(message) = snapshot.error_message() {
                    warn!(%message, "Reader reported an error");
                }
            }
        }
    };

    reader.shutdown().await?;
    outcome
}

async fn read_once(reader: CardReader, timeout: Duration) -> anyhow::Result<()> {
    ensure_connected(&reader).await?;
    info!(timeout_ms = timeout.as_millis() as u64, "Present a card");

    let result = reader.read_identifier(timeout).await;
    reader.shutdown().await?;

    print_identifier(&result.map_err(reader_failure)?)
}

#[cfg(feature = "hardware-usb")]
async fn list_devices(config: &ReaderConfig) -> anyhow::Result<()> {
    use rollcall_hardware::HidBackend;

    let mut backend = rollcall_hardware::usb::UsbHidBackend::new(config.device_filters.clone())
        .context("failed to initialize HID")?;
    let devices = backend.authorized_devices().await?;
    if devices.is_empty() {
        info!("No matching HID readers attached");
    }

    let mut stdout = std::io::stdout().lock();
    for device in devices {
        writeln!(stdout, "{}", serde_json::to_string(&device)?)?;
    }
    Ok(())
}

#[cfg(not(feature = "hardware-usb"))]
async fn list_devices(_config: &ReaderConfig) -> anyhow::Result<()> {
    bail!("device listing needs a build with the hardware-usb feature")
}

fn print_identifier(identifier: &Identifier) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", serde_json::to_string(identifier)?)?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ReaderError::read_timeout(3000), "retry")]
    #[case(ReaderError::transport("Device disconnected: ACR122U"), "retry")]
    #[case(ReaderError::permission_denied("ACR122U"), "needs attention")]
    #[case(ReaderError::NoTransport, "needs attention")]
    fn test_reader_failure_hint(#[case] error: ReaderError, #[case] hint: &str) {
        let message = error.to_string();
        let failure = reader_failure(error);

        assert!(failure.to_string().contains(hint));
        assert_eq!(failure.root_cause().to_string(), message);
        assert!(failure.downcast_ref::<ReaderError>().is_some());
    }
}
