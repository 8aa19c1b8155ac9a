//! Runtime configuration for the `tokenrelay-server` binary.
//!
//! All values are parsed from CLI arguments or environment variables,
//! with defaults matching the reference deployment, and validated into an
//! owned [`ServiceConfig`].

use clap::Parser;
use core::time::Duration;
use tokenrelay_core::Error;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tokenrelay-server",
    version,
    about = "Correlation engine for asynchronous token issuance"
)]
pub struct CliArgs {
    /// Name of the outbound request channel.
    ///
    /// Environment variable: `REQUEST_CHANNEL`
    #[arg(long, env = "REQUEST_CHANNEL", default_value_t = String::from("token-requests"))]
    pub request_channel: String,

    /// Name of the inbound response channel.
    ///
    /// Environment variable: `RESPONSE_CHANNEL`
    #[arg(long, env = "RESPONSE_CHANNEL", default_value_t = String::from("token-responses"))]
    pub response_channel: String,

    /// Seconds a caller blocks waiting for the matching response before
    /// failing with a timeout.
    ///
    /// Environment variable: `WAIT_TIMEOUT_SECS`
    #[arg(long, env = "WAIT_TIMEOUT_SECS", default_value_t = 30)]
    pub wait_timeout_secs: u64,

    /// Grace period subtracted from the expiry check so near-expiry cache
    /// entries are refreshed early.
    ///
    /// Environment variable: `GRACE_PERIOD_SECS`
    #[arg(long, env = "GRACE_PERIOD_SECS", default_value_t = 30)]
    pub grace_period_secs: u64,

    /// Validity window stamped onto issued tokens.
    ///
    /// Environment variable: `TOKEN_VALIDITY_SECS`
    #[arg(long, env = "TOKEN_VALIDITY_SECS", default_value_t = 60)]
    pub token_validity_secs: u64,

    /// Number of simulated issuance workers.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = 4)]
    pub num_workers: usize,

    /// Per-subscriber backlog of the broadcast bus. A subscriber that
    /// falls further behind than this is a fatal condition.
    ///
    /// Environment variable: `BUS_CAPACITY`
    #[arg(long, env = "BUS_CAPACITY", default_value_t = 1024)]
    pub bus_capacity: usize,

    /// Capacity of the in-memory request/response channels.
    ///
    /// Environment variable: `CHANNEL_CAPACITY`
    #[arg(long, env = "CHANNEL_CAPACITY", default_value_t = 256)]
    pub channel_capacity: usize,

    /// Users the demo loop issues tokens for. Repeatable.
    #[arg(long = "demo-user", default_value = "alice")]
    pub demo_users: Vec<String>,

    /// Seconds between demo issuance rounds.
    #[arg(long, env = "DEMO_INTERVAL_SECS", default_value_t = 10)]
    pub demo_interval_secs: u64,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub request_channel: String,
    pub response_channel: String,
    pub wait_timeout: Duration,
    pub grace_period: Duration,
    pub token_validity: Duration,
    pub num_workers: usize,
    pub bus_capacity: usize,
    pub channel_capacity: usize,
    pub demo_users: Vec<String>,
    pub demo_interval: Duration,
}

impl TryFrom<CliArgs> for ServiceConfig {
    type Error = Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.wait_timeout_secs == 0 {
            return Err(Error::InvalidConfig {
                reason: "WAIT_TIMEOUT_SECS must be greater than 0".into(),
            });
        }
        if args.num_workers == 0 {
            return Err(Error::InvalidConfig {
                reason: "NUM_WORKERS must be greater than 0".into(),
            });
        }
        if args.bus_capacity == 0 {
            return Err(Error::InvalidConfig {
                reason: "BUS_CAPACITY must be greater than 0".into(),
            });
        }
        if args.channel_capacity == 0 {
            return Err(Error::InvalidConfig {
                reason: "CHANNEL_CAPACITY must be greater than 0".into(),
            });
        }
        if args.token_validity_secs <= args.grace_period_secs {
            // Otherwise every freshly issued token is already stale and
            // every lookup misses.
            return Err(Error::InvalidConfig {
                reason: "TOKEN_VALIDITY_SECS must exceed GRACE_PERIOD_SECS".into(),
            });
        }

        Ok(Self {
            request_channel: args.request_channel,
            response_channel: args.response_channel,
            wait_timeout: Duration::from_secs(args.wait_timeout_secs),
            grace_period: Duration::from_secs(args.grace_period_secs),
            token_validity: Duration::from_secs(args.token_validity_secs),
            num_workers: args.num_workers,
            bus_capacity: args.bus_capacity,
            channel_capacity: args.channel_capacity,
            demo_users: args.demo_users,
            demo_interval: Duration::from_secs(args.demo_interval_secs),
        })
    }
}
