use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Echo everything received from a USB serial adapter back to it, and send
/// a greeting at a fixed interval.
///
/// Runs against the simulated host stack: a virtual adapter is plugged in
/// shortly after start and fed a line of input now and then.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a JSON transport configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Baud rate
    #[arg(short, long, default_value_t = 9600)]
    pub baud: u32,

    /// Stop bits code: 0 = 1, 1 = 1.5, 2 = 2
    #[arg(long, default_value_t = 0)]
    pub stop_bits: u8,

    /// Parity code: 0 = none, 1 = odd, 2 = even, 3 = mark, 4 = space
    #[arg(long, default_value_t = 0)]
    pub parity: u8,

    /// Data bits
    #[arg(long, default_value_t = 8)]
    pub data_bits: u8,

    /// Only accept adapters with this vendor id (hex, 0 = any)
    #[arg(long, value_parser = parse_hex_u16)]
    pub vid: Option<u16>,

    /// Only accept adapters with this product id (hex, 0 = any)
    #[arg(long, value_parser = parse_hex_u16)]
    pub pid: Option<u16>,

    /// Seconds between greetings
    #[arg(long, default_value_t = 10)]
    pub hello_every: u64,

    /// Seconds between simulated inbound lines
    #[arg(long, default_value_t = 3)]
    pub feed_every: u64,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    pub duration: Option<u64>,
}

impl Cli {
    pub fn hello_interval(&self) -> Duration {
        Duration::from_secs(self.hello_every.max(1))
    }

    pub fn feed_interval(&self) -> Duration {
        Duration::from_secs(self.feed_every.max(1))
    }
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex id {s:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["hostserial-echo"]);
        assert_eq!(cli.baud, 9600);
        assert_eq!(cli.data_bits, 8);
        assert_eq!(cli.hello_interval(), Duration::from_secs(10));
        assert!(cli.vid.is_none());
    }

    #[test]
    fn test_hex_ids() {
        let cli = Cli::parse_from(["hostserial-echo", "--vid", "0x0403", "--pid", "6001"]);
        assert_eq!(cli.vid, Some(0x0403));
        assert_eq!(cli.pid, Some(0x6001));
        assert!(parse_hex_u16("zz").is_err());
    }
}
