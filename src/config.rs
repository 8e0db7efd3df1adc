use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};
use simplelog::LevelFilter;

// Runtime configuration, read from the environment at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub listen_addr: SocketAddr,
    pub max_games: usize,
    pub lock_timeout: Duration,
    pub reap_interval: Duration,
    pub reap_grace: Duration,
    pub log_level: LevelFilter,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = env::var("JWT_SECRET").context("$JWT_SECRET is not set")?;
        if jwt_secret.is_empty() {
            return Err(anyhow!("$JWT_SECRET is empty"));
        }
        Ok(Self {
            jwt_secret,
            listen_addr: var_or("LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            max_games: var_or("MAX_GAMES", 10_000)?,
            lock_timeout: Duration::from_millis(var_or("LOCK_TIMEOUT_MS", 250)?),
            reap_interval: Duration::from_secs(var_or("REAP_INTERVAL_SECS", 30)?),
            reap_grace: Duration::from_secs(var_or("REAP_GRACE_SECS", 60)?),
            log_level: var_or("LOG_LEVEL", LevelFilter::Debug)?,
        })
    }
}

// Parses an optional variable, falling back to `default` when it is not set
fn var_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|err| anyhow!("${name} is not valid ({raw:?}): {err}")),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(anyhow!("${name} could not be read: {err}")),
    }
}
