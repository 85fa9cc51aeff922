use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl Verbosity {
    pub fn from_u8(level: u8) -> Self {
        match level {
            0 => Verbosity::Low,
            1 => Verbosity::Medium,
            _ => Verbosity::High,
        }
    }

    /// Default filter when `RUST_LOG` is not set. High also dumps every frame.
    pub fn directive(self) -> &'static str {
        match self {
            Verbosity::Low => "info",
            Verbosity::Medium => "debug",
            Verbosity::High => "trace",
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides `verbosity`.
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    // a second init (tests) keeps the first subscriber
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
    {
        tracing::debug!("logger already initialised: {e}");
    }
}

/// `01 A0 FF` style rendering of raw report bytes.
pub fn hex_dump(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_saturates_at_high() {
        assert_eq!(Verbosity::from_u8(0), Verbosity::Low);
        assert_eq!(Verbosity::from_u8(1), Verbosity::Medium);
        assert_eq!(Verbosity::from_u8(2), Verbosity::High);
        assert_eq!(Verbosity::from_u8(9), Verbosity::High);
        assert!(Verbosity::Low < Verbosity::High);
    }

    #[test]
    fn hex_dump_is_uppercase_and_spaced() {
        assert_eq!(hex_dump(&[0x01, 0xa0, 0xff]), "01 A0 FF");
        assert_eq!(hex_dump(&[]), "");
    }
}
