use clap::Parser;
use rustkv::config::{
    Config, DEFAULT_EXPIRE_CRON_MAX_KEYS, DEFAULT_EXPIRE_CRON_PERIOD, DEFAULT_PORT,
};
use rustkv::{server, Error};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// The port to listen on
    #[arg(short, long, env = "RUSTKV_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Log filter, e.g. `debug` or `rustkv=trace`
    #[arg(long, env = "RUSTKV_LOG", default_value = "info")]
    log_level: String,

    /// Milliseconds between active expiration sweeps
    #[arg(long, default_value_t = DEFAULT_EXPIRE_CRON_PERIOD.as_millis() as u64)]
    expire_period_ms: u64,

    /// Keys inspected by a single expiration sweep
    #[arg(long, default_value_t = DEFAULT_EXPIRE_CRON_MAX_KEYS)]
    expire_max_keys: usize,
}

fn main() -> Result<(), Error> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log_level)?)
        .try_init()?;

    let config = Config {
        expire_cron_period: Duration::from_millis(args.expire_period_ms),
        expire_cron_max_keys: args.expire_max_keys,
        ..Config::with_port(args.port)
    };

    server::run(config)
}
