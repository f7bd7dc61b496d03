//! Command-line arguments.

use clap::{Args, Parser, Subcommand};
use rollcall_core::constants::DEFAULT_MANUAL_READ_TIMEOUT_MS;
use rollcall_reader::ReaderConfig;
use std::path::PathBuf;

/// Read attendance cards from a contactless reader.
#[derive(Debug, Parser)]
#[command(name = "rollcall", author, version, about)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, default_value = "info", global = true)]
    pub log_level: String,

    /// Reader configuration file (JSON)
    #[arg(short, long, env = "ROLLCALL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub transports: TransportArgs,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    #[command(subcommand)]
    pub command: Command,
}

/// Transports offered to the reader. With no flag, every transport compiled
/// into this binary is offered and the reader picks by precedence.
#[derive(Debug, Clone, Copy, Default, Args)]
pub struct TransportArgs {
    /// Offer PC/SC contactless readers (needs the hardware-pcsc feature)
    #[arg(long, global = true)]
    pub radio: bool,

    /// Offer USB HID readers (needs the hardware-usb feature)
    #[arg(long, global = true)]
    pub hid: bool,

    /// Treat standard input as a keyboard-wedge reader
    #[arg(long, global = true)]
    pub keyboard: bool,
}

impl TransportArgs {
    /// Returns `true` if no transport was named explicitly.
    pub fn offer_all(&self) -> bool {
        !(self.radio || self.hid || self.keyboard)
    }
}

/// Flags that take precedence over the configuration file.
#[derive(Debug, Clone, Copy, Default, Args)]
pub struct ConfigOverrides {
    /// Silence that completes an identifier, in milliseconds
    #[arg(long, global = true)]
    pub debounce_ms: Option<u64>,

    /// Suppress repeats of the same card within this many milliseconds
    #[arg(long, global = true)]
    pub min_reemit_interval_ms: Option<u64>,

    /// Do not reopen a previously granted HID reader at start-up
    #[arg(long, global = true)]
    pub no_auto_reconnect: bool,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut ReaderConfig) {
        if let Some(debounce_ms) = self.debounce_ms {
            config.debounce_ms = debounce_ms;
        }
        if self.min_reemit_interval_ms.is_some() {
            config.min_reemit_interval_ms = self.min_reemit_interval_ms;
        }
        if self.no_auto_reconnect {
            config.auto_reconnect = false;
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print every card read as a JSON line until interrupted
    Listen,

    /// Wait for one card and print it
    Read {
        /// How long to wait for a card
        #[arg(short, long, default_value_t = DEFAULT_MANUAL_READ_TIMEOUT_MS)]
        timeout_ms: u64,
    },

    /// List attached HID readers matching the configured filters
    Devices,

    /// Validate the configuration and print the effective values
    Config,
}
