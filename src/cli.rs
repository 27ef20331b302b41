//! Command line interface for the `ackframe` binary.
//!
//! `serve` runs an echo server; `send` dials a peer, sends one string and
//! prints the reply.

use std::net::IpAddr;

use clap::{Parser, Subcommand};

/// Default TCP port for both subcommands.
pub const DEFAULT_PORT: u16 = 6543;

/// Command line arguments for the `ackframe` binary.
#[derive(Debug, Parser)]
#[command(name = "ackframe", version, about = "Acknowledged request/reply framing over TCP")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Accept connections and echo every request back as its reply.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Close connections that stay silent this many seconds after connecting.
        #[arg(long, default_value_t = 10)]
        idle_timeout_secs: u64,
        /// Largest frame accepted from a peer, in bytes.
        #[arg(long, default_value_t = 128 * 1024)]
        max_frame_size: usize,
    },
    /// Send one message and print the peer's reply.
    Send {
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Give up when no ACK or NAK arrives within this many milliseconds.
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
        /// Text to send.
        message: String,
    },
}
