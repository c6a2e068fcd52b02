use std::time::Duration;

/// Problems with a loaded configuration that flag parsing can't catch
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("at least one address is required")]
    NoAddresses,

    #[error("wait time {0:?} is too long; the limit is {limit:?}", limit = MAX_WAIT)]
    WaitTooLong(Duration),

    #[error("log level for component {component:?} is {level:?}, which isn't a known level")]
    UnknownLevel { component: String, level: String },
}

pub const MAX_WAIT: Duration = Duration::from_secs(60 * 60);
