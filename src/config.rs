use crate::logger::Verbosity;
use crate::protocol::DEFAULT_POLL_INTERVAL_MS;
use crate::session::SessionConfig;
use clap::Parser;
use std::time::Duration;

/// Maps DDR dance pads onto a virtual gamepad.
#[derive(Debug, Clone, Parser)]
#[command(name = "ddrpad-driver", version, about)]
pub struct Args {
    /// Delay between reads of one pad, in milliseconds.
    #[arg(long, env = "DDRPAD_POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// More output: -v debug, -vv also every raw frame. RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only take over pads that are attached at startup.
    #[arg(long)]
    pub no_hotplug: bool,
}

impl Args {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_u8(self.verbose)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            ..SessionConfig::default()
        }
    }
}
