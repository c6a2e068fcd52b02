use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    io,
    iter,
    rc::Rc,
    time::Duration,
};

use chrono::{DateTime, FixedOffset};
use flagtag::{
    Accessor, Bindable, BoundField, Error, ErrorHandling, Fields, FieldState, FlagSet, FlagSource,
    LoadedArguments, SkipReason, Source as _, Stage, TimeLayout,
};

#[derive(Debug, Default)]
struct NestedConfig {
    #[allow(dead_code)]
    value: String,
}

#[derive(Fields, Debug, Default)]
struct Config {
    #[tags(flag = "name=time,desc='some time',default='02 Jan 06 15:04 +0000'")]
    time: Option<DateTime<FixedOffset>>,

    #[tags(flag = "name=components,desc='component levels'")]
    components: HashMap<String, String>,

    #[tags(flag = "name=metadata,desc='some meta',default=''")]
    metadata: BTreeMap<String, isize>,

    nested: Option<Box<NestedConfig>>,

    #[tags(flag = "name=broker,desc='description with, comma',default='127.0.0.1:9092'")]
    broker: String,

    #[tags(flag = "name=without_desc,default=without_default")]
    without_desc: String,

    #[tags(flag = "name=without_all")]
    without_all: String,

    #[tags(flag = "name=without_default,desc=with")]
    without_default: String,

    #[tags(flag = "name=addr,desc='addresses',default='127.0.0.1:9092'")]
    addr: Vec<String>,

    #[tags(flag = "name=wait,desc='wait time',default='2s'", env = "WAIT")]
    wait: Duration,

    #[tags(flag = "name=verbose,desc='verbose output',default=false")]
    verbose: bool,
}

fn config() -> Config {
    Config {
        time: Some(DateTime::default()),
        ..Config::default()
    }
}

/// A source over `args` whose flag set reports errors instead of exiting
fn flag_source<'a, S: Fields>(target: &'a mut S, args: &[&str]) -> FlagSource<'a, S> {
    let mut flags = FlagSet::new("test", ErrorHandling::ContinueOnError);
    flags.set_output(io::sink());

    FlagSource::new(target)
        .flag_set(flags)
        .time_layout(TimeLayout::RFC822Z)
        .arguments(LoadedArguments::new(
            iter::once("test").chain(args.iter().copied()),
        ))
}

const ARGS: &[&str] = &[
    "-broker",
    "5566:33",
    "-verbose",
    "-wait",
    "5s",
    "-addr",
    "33,44",
    "-time",
    "10 Mar 21 08:30 +0100",
    "-metadata",
    "key=20",
    "-components",
    "all=info,api=debug",
    "-addr",
    "33,44",
    "-badflag",
    "test",
];

#[test]
fn init_applies_defaults() {
    let mut config = config();
    let mut source = flag_source(&mut config, &[]);
    source.init().unwrap();
    source.load().unwrap();
    drop(source);

    assert_eq!(config.broker, "127.0.0.1:9092");
    assert_eq!(config.without_desc, "without_default");
    assert_eq!(config.without_all, "");
    assert_eq!(config.without_default, "");
    assert_eq!(config.addr, ["127.0.0.1:9092"]);
    assert_eq!(config.wait, Duration::from_secs(2));
    assert!(!config.verbose);
    assert!(config.metadata.is_empty());
    assert!(config.components.is_empty());
    assert_eq!(
        config.time.unwrap().to_rfc3339(),
        "2006-01-02T15:04:00+00:00"
    );
    assert!(config.nested.is_none());
}

#[test]
fn load_applies_flags_until_an_undefined_one() {
    let mut config = config();
    let mut source = flag_source(&mut config, ARGS);
    source.init().unwrap();

    let err = source.load().unwrap_err();
    assert!(matches!(err, Error::Undefined(ref name) if name == "badflag"));
    drop(source);

    assert_eq!(config.broker, "5566:33");
    assert!(config.verbose);
    assert_eq!(config.wait, Duration::from_secs(5));
    assert_eq!(config.addr, ["33", "44"]);
    assert_eq!(config.metadata, BTreeMap::from([("key".to_owned(), 20)]));
    assert_eq!(config.components.len(), 2);
    assert_eq!(config.components["all"], "info");
    assert_eq!(config.components["api"], "debug");
    assert_eq!(
        config.time.unwrap().to_rfc3339(),
        "2021-03-10T08:30:00+01:00"
    );
}

#[test]
fn allow_fail_swallows_parse_errors() {
    let mut config = config();
    let mut source = flag_source(&mut config, ARGS).allow_fail(true);

    source.init_and_load().unwrap();
    drop(source);

    assert_eq!(config.broker, "5566:33");
}

#[test]
fn remaining_arguments() {
    let mut config = config();
    let mut source = flag_source(&mut config, &["-verbose", "--", "-broker", "x"]);
    source.init_and_load().unwrap();

    assert_eq!(source.args(), ["-broker", "x"]);
    drop(source);

    assert!(config.verbose);
    assert_eq!(config.broker, "127.0.0.1:9092");
}

#[test]
fn usage_mentions_env() {
    let mut config = config();
    let mut source = flag_source(&mut config, &[]);
    source.init().unwrap();

    let flag = source.flags().lookup("wait").unwrap();
    assert_eq!(flag.usage(), "wait time (env WAIT)");

    let mut out = Vec::new();
    source.write_usage(&mut out).unwrap();
    let out = String::from_utf8(out).unwrap();

    assert!(out.starts_with("Usage of test:\n"));
    assert!(out.contains("  -wait duration\n    \twait time (env WAIT) (default \"2s\")\n"));
    assert!(out.contains("  -addr string with \",\" as separator\n"));
}

#[test]
fn report_states() {
    #[derive(Fields, Default)]
    struct Mixed {
        #[tags(env = "ONLY_ENV")]
        only_env: String,

        #[tags(flag = "desc='no name'")]
        unnamed: String,

        #[tags(flag = "name=maybe")]
        maybe: Option<u64>,

        #[tags(flag = "name=count,default=4")]
        count: usize,
    }

    let mut mixed = Mixed::default();
    let mut source = flag_source(&mut mixed, &[]);
    source.init().unwrap();

    let states: Vec<_> = source
        .report()
        .iter()
        .map(|report| (report.path.as_str(), report.state.clone()))
        .collect();

    assert_eq!(
        states,
        [
            ("only_env", FieldState::Skipped(SkipReason::Untagged)),
            ("unnamed", FieldState::Skipped(SkipReason::Unnamed)),
            ("maybe", FieldState::Skipped(SkipReason::Absent)),
            ("count", FieldState::Bound),
        ]
    );
    assert_eq!(source.flags().len(), 1);
    drop(source);

    assert_eq!(mixed.count, 4);
}

/// Registering a name that already exists ends initialization early but
/// successfully. The fields after the collision are never visited.
#[test]
fn name_collision_stops_init() {
    #[derive(Fields, Default)]
    struct Twice {
        #[tags(flag = "name=port,default=1")]
        first: u64,

        #[tags(flag = "name=port,default=2")]
        second: u64,

        #[tags(flag = "name=host,default=localhost")]
        host: String,
    }

    let after_init = Rc::new(RefCell::new(false));

    let mut twice = Twice::default();
    let mut source = flag_source(&mut twice, &[]).hook(Stage::AfterInit, {
        let after_init = Rc::clone(&after_init);
        move |_| {
            *after_init.borrow_mut() = true;
            Ok(())
        }
    });

    source.init().unwrap();

    let states: Vec<_> = source
        .report()
        .iter()
        .map(|report| report.state.clone())
        .collect();
    assert_eq!(
        states,
        [
            FieldState::Bound,
            FieldState::Skipped(SkipReason::Collision),
            FieldState::Pending,
        ]
    );
    assert!(source.flags().lookup("host").is_none());
    assert!(!*after_init.borrow());
    drop(source);

    assert_eq!(twice.first, 1);
    assert_eq!(twice.second, 0);
    assert_eq!(twice.host, "");
}

/// A second `init` runs into the flags the first one registered, so it does
/// nothing and succeeds.
#[test]
fn init_twice_is_a_no_op() {
    let mut config = config();
    let mut source = flag_source(&mut config, &["-broker", "other"]);

    source.init().unwrap();
    let count = source.flags().len();

    source.init().unwrap();
    assert_eq!(source.flags().len(), count);

    source.load().unwrap();
    drop(source);

    assert_eq!(config.broker, "other");
}

#[test]
fn timestamp_needs_a_layout() {
    let mut config = config();
    let mut flags = FlagSet::new("test", ErrorHandling::ContinueOnError);
    flags.set_output(io::sink());

    let mut source = FlagSource::new(&mut config).flag_set(flags);

    let err = source.init().unwrap_err();
    assert!(matches!(err, Error::InvalidValue));
    assert_eq!(source.report()[0].flag.as_deref(), Some("time"));
    assert!(matches!(source.report()[0].state, FieldState::Failed(_)));
    assert_eq!(source.report()[1].state, FieldState::Pending);
    assert!(source.flags().is_empty());
}

#[test]
fn allow_fail_abandons_remaining_fields() {
    #[derive(Fields, Default)]
    struct Broken {
        #[tags(flag = "name=name,default=first")]
        name: String,

        #[tags(flag = "name=wait")]
        wait: Duration,

        #[tags(flag = "name=after,default=unreached")]
        after: String,
    }

    let mut broken = Broken::default();
    let mut source = flag_source(&mut broken, &[]).allow_fail(true);

    source.init().unwrap();
    assert!(matches!(source.report()[1].state, FieldState::Failed(_)));
    assert_eq!(source.report()[2].state, FieldState::Pending);
    assert_eq!(source.flags().len(), 1);
    drop(source);

    assert_eq!(broken.name, "first");
    assert_eq!(broken.after, "");
}

#[test]
fn map_entry_without_separator() {
    let mut config = config();
    let mut source = flag_source(&mut config, &["-metadata", "keyonly"]);
    source.init().unwrap();

    let err = source.load().unwrap_err();
    match err {
        Error::Flag {
            ref name,
            ref value,
            ref source,
        } => {
            assert_eq!(name, "metadata");
            assert_eq!(value, "keyonly");
            assert!(matches!(**source, Error::InvalidValue));
        }
        err => panic!("unexpected error: {err}"),
    }
}

#[test]
fn watch_is_not_implemented() {
    let mut config = config();
    let mut source = flag_source(&mut config, &[]);

    assert!(matches!(source.watch(), Err(Error::NotImplemented)));
    assert_eq!(source.kind(), "flag");
}

#[derive(Fields, Debug, Default)]
struct Limits {
    #[tags(flag = "name=retries,desc='retry count',default=3")]
    retries: u64,

    #[tags(flag = "name=ratio,default=0.5")]
    ratio: f64,
}

#[derive(Fields, Debug, Default)]
struct Service {
    #[tags(flag = "name=service,default=api")]
    name: String,

    #[tags(flatten)]
    limits: Option<Box<Limits>>,
}

#[test]
fn flatten_through_option_box() {
    let mut service = Service {
        limits: Some(Box::default()),
        ..Service::default()
    };
    let mut source = flag_source(&mut service, &["-retries", "9"]);
    source.init_and_load().unwrap();

    let paths: Vec<_> = source
        .report()
        .iter()
        .map(|report| report.path.as_str())
        .collect();
    assert_eq!(paths, ["name", "limits.retries", "limits.ratio"]);
    drop(source);

    let limits = service.limits.unwrap();
    assert_eq!(limits.retries, 9);
    assert_eq!(limits.ratio, 0.5);
}

#[test]
fn flatten_absent_is_skipped() {
    let mut service = Service::default();
    let mut source = flag_source(&mut service, &[]);
    source.init().unwrap();

    assert_eq!(
        source.report()[1].state,
        FieldState::Skipped(SkipReason::Absent)
    );
    assert_eq!(source.flags().len(), 1);
}

#[test]
fn custom_struct_tag() {
    #[derive(Fields, Default)]
    struct Custom {
        #[tags(tag(key = "cli", value = "name=level,default=info"))]
        level: String,

        #[tags(flag = "name=ignored,default=x")]
        ignored: String,
    }

    let mut custom = Custom::default();
    let mut source = flag_source(&mut custom, &[]).struct_tag("cli");
    source.init().unwrap();

    assert_eq!(
        source.report()[1].state,
        FieldState::Skipped(SkipReason::Untagged)
    );
    drop(source);

    assert_eq!(custom.level, "info");
    assert_eq!(custom.ignored, "");
}

#[test]
fn custom_delimiters() {
    let mut config = config();
    let mut source = flag_source(
        &mut config,
        &["-addr", "a;b,c", "-metadata", "x=1|y=2"],
    )
    .slice_delimiter(";")
    .map_delimiter("|");

    source.init_and_load().unwrap();
    assert_eq!(
        source.flags().lookup("addr").unwrap().value().type_label(),
        "string with \";\" as separator"
    );
    drop(source);

    assert_eq!(config.addr, ["a", "b,c"]);
    assert_eq!(
        config.metadata,
        BTreeMap::from([("x".to_owned(), 1), ("y".to_owned(), 2)])
    );
}

/// A kind that opts out of binding by hand
#[derive(Debug, Default)]
struct Level(u8);

impl Bindable for Level {
    fn bound_field<S: 'static>(_: Accessor<S, Self>) -> BoundField<S> {
        BoundField::Unsupported
    }
}

#[test]
fn unsupported_kind_is_left_alone() {
    #[derive(Fields, Default)]
    struct Logging {
        #[tags(flag = "name=level,default=3")]
        level: Level,

        #[tags(flag = "name=target,default=stderr")]
        target: String,
    }

    let mut logging = Logging::default();
    let mut source = flag_source(&mut logging, &[]);
    source.init().unwrap();

    assert_eq!(
        source.report()[0].state,
        FieldState::Skipped(SkipReason::Unsupported)
    );
    assert_eq!(source.report()[1].state, FieldState::Bound);
    assert!(source.flags().lookup("level").is_none());
    drop(source);

    assert_eq!(logging.level.0, 0);
    assert_eq!(logging.target, "stderr");
}

#[test]
fn hooks_run_in_order() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let record = |stage: &'static str| {
        let log = Rc::clone(&log);
        move |_: &dyn flagtag::Source| -> Result<(), flagtag::BoxError> {
            log.borrow_mut().push(stage);
            Ok(())
        }
    };

    let mut config = config();
    let mut source = flag_source(&mut config, &[])
        .hook(Stage::BeforeInit, record("before init"))
        .hook(Stage::AfterInit, record("after init"))
        .hook(Stage::BeforeLoad, record("before load"))
        .hook(Stage::AfterLoad, record("after load"))
        .hook(Stage::BeforeSave, record("before save"))
        .hook(Stage::AfterSave, record("after save"));

    source.init_and_load().unwrap();
    source.save().unwrap();

    assert_eq!(
        *log.borrow(),
        [
            "before init",
            "after init",
            "before load",
            "after load",
            "before save",
            "after save",
        ]
    );
}

#[test]
fn hook_errors() {
    let failing = |_: &dyn flagtag::Source| -> Result<(), flagtag::BoxError> { Err("nope".into()) };

    let mut strict = config();
    let mut source = flag_source(&mut strict, &[]).hook(Stage::BeforeLoad, failing);
    source.init().unwrap();
    assert!(matches!(source.load(), Err(Error::Hook(_))));
    assert!(!source.flags().parsed());
    drop(source);

    let mut lenient = config();
    let mut source = flag_source(&mut lenient, &["-verbose"])
        .allow_fail(true)
        .hook(Stage::BeforeLoad, failing);
    source.init_and_load().unwrap();
    drop(source);

    assert!(lenient.verbose);
}

#[test]
fn skip_load() {
    let mut config = config();
    let mut source = flag_source(&mut config, &["-verbose"])
        .named("flags")
        .skip_load(|source| source.name() == "flags");

    source.init_and_load().unwrap();
    assert!(!source.flags().parsed());
    drop(source);

    assert!(!config.verbose);
}

#[test]
fn flag_set_options() {
    let mut config = config();
    let mut source = flag_source(&mut config, &[])
        .flag_set_name("renamed")
        .usage(|flags, _, out| writeln!(out, "{} flags", flags.len()));
    source.init().unwrap();

    assert_eq!(source.flags().name(), "renamed");

    let mut out = Vec::new();
    source.write_usage(&mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "10 flags\n");
}
