mod error;

use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use anyhow::Context as _;
use chrono::{DateTime, FixedOffset};
use flagtag::{Fields, FlagSource, Stage, TimeLayout};
use lazy_format::lazy_format;

use crate::error::{ConfigError, MAX_WAIT};

const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Fields, Debug, Default)]
struct Limits {
    #[tags(flag = "name=retries,desc='how many times to retry a request',default=3")]
    retries: u64,

    #[tags(flag = "name=ratio,desc='fraction of requests to sample',default=0.25")]
    ratio: f64,
}

#[derive(Fields, Debug, Default)]
struct Config {
    #[tags(flag = "name=broker,desc='description with, comma',default='127.0.0.1:9092'")]
    broker: String,

    #[tags(flag = "name=addr,desc='addresses to listen on',default='127.0.0.1:9092'")]
    addr: Vec<String>,

    #[tags(flag = "name=wait,desc='wait time',default='2s'", env = "DEMO_WAIT")]
    wait: Duration,

    #[tags(flag = "name=verbose,desc='verbose output',default=false")]
    verbose: bool,

    #[tags(flag = "name=time,desc='start time',default='02 Jan 06 15:04 +0000'")]
    time: Option<DateTime<FixedOffset>>,

    #[tags(flag = "name=components,desc='per component log levels'")]
    components: BTreeMap<String, String>,

    #[tags(flag = "name=metadata,desc='some meta',default=''")]
    metadata: HashMap<String, isize>,

    #[tags(flatten)]
    limits: Option<Box<Limits>>,
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.addr.is_empty() {
            return Err(ConfigError::NoAddresses);
        }

        if self.wait > MAX_WAIT {
            return Err(ConfigError::WaitTooLong(self.wait));
        }

        match self
            .components
            .iter()
            .find(|(_, level)| !LEVELS.contains(&level.as_str()))
        {
            Some((component, level)) => Err(ConfigError::UnknownLevel {
                component: component.clone(),
                level: level.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("DEMO_LOG")
                .as_deref()
                .unwrap_or("flagtag=info,flagtag_demo=info"),
        )
        .init();

    let mut config = Config {
        time: Some(DateTime::default()),
        limits: Some(Box::default()),
        ..Config::default()
    };

    let mut source = FlagSource::new(&mut config)
        .named("command line")
        .time_layout(TimeLayout::RFC822Z)
        .hook(Stage::AfterLoad, |source| {
            tracing::info!(source = source.name(), kind = source.kind(), "loaded");
            Ok(())
        });

    source.init_and_load().context("failed to load configuration")?;

    let reports = source.report().to_vec();
    let rest = source.args().join(" ");
    drop(source);

    config.validate().context("invalid configuration")?;

    if config.verbose {
        for report in &reports {
            let (path, state) = (&report.path, &report.state);

            println!(
                "{}",
                lazy_format!(match (report.flag.as_deref()) {
                    Some(flag) => "{path}: -{flag} {state:?}",
                    None => "{path}: {state:?}",
                })
            );
        }
    }

    println!("{config:#?}");

    if !rest.is_empty() {
        println!("remaining arguments: {rest}");
    }

    Ok(())
}
