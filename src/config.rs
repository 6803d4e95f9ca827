use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 2000;
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;
/// Ten expiration sweeps per second.
pub const DEFAULT_EXPIRE_CRON_PERIOD: Duration = Duration::from_millis(100);
pub const DEFAULT_EXPIRE_CRON_MAX_KEYS: usize = 20;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the listener binds to.
    pub addr: SocketAddr,
    /// Upper bound on the bytes taken from a socket by a single read call.
    pub read_chunk_size: usize,
    /// How often the active expiration sweep runs.
    pub expire_cron_period: Duration,
    /// Keys inspected by one expiration sweep.
    pub expire_cron_max_keys: usize,
}

impl Config {
    pub fn with_port(port: u16) -> Config {
        Config {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            ..Config::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            expire_cron_period: DEFAULT_EXPIRE_CRON_PERIOD,
            expire_cron_max_keys: DEFAULT_EXPIRE_CRON_MAX_KEYS,
        }
    }
}
