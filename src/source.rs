/*!
The configuration source backed by command line flags.

A [`Source`] is one backend of a configuration loader: it's initialized once,
then loaded (and possibly saved, or watched for changes). [`FlagSource`]
initializes by binding every tagged field of a structure to a flag, and loads
by parsing the command line into those flags.
*/

use std::{borrow::Cow, fmt, io, rc::Rc};

use tracing::{debug, warn};

use crate::{
    arguments::LoadedArguments,
    bind::{BindOptions, Bound, bind},
    error::{BoxError, Error},
    field::{Field, Fields},
    flag_set::{ErrorHandling, FlagSet, UsageFn},
    tag::FlagSpec,
    value::TimeLayout,
};

/// Default tag key holding the flag definition
pub const DEFAULT_STRUCT_TAG: &str = "flag";

/// Default tag key naming the environment variable mentioned in help text
pub const DEFAULT_ENV_TAG: &str = "env";

/// One backend of a configuration loader
pub trait Source {
    fn name(&self) -> &str;

    /// What kind of backend this is, such as `"flag"`
    fn kind(&self) -> &'static str;

    fn init(&mut self) -> Result<(), Error>;

    fn load(&mut self) -> Result<(), Error>;

    fn save(&mut self) -> Result<(), Error>;

    fn watch(&mut self) -> Result<Box<dyn Watcher>, Error>;
}

/// A handle on a running watch
pub trait Watcher {
    fn stop(&mut self) -> Result<(), Error>;
}

/// Called before or after a lifecycle stage
pub type Hook = Box<dyn Fn(&dyn Source) -> Result<(), BoxError>>;

/// Decides whether a load or save should be skipped entirely
pub type Predicate = Box<dyn Fn(&dyn Source) -> bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    BeforeInit,
    AfterInit,
    BeforeLoad,
    AfterLoad,
    BeforeSave,
    AfterSave,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::BeforeInit => "before init",
            Stage::AfterInit => "after init",
            Stage::BeforeLoad => "before load",
            Stage::AfterLoad => "after load",
            Stage::BeforeSave => "before save",
            Stage::AfterSave => "after save",
        })
    }
}

/// Lifecycle hooks, run in registration order
#[derive(Default)]
pub struct Hooks {
    before_init: Vec<Hook>,
    after_init: Vec<Hook>,
    before_load: Vec<Hook>,
    after_load: Vec<Hook>,
    before_save: Vec<Hook>,
    after_save: Vec<Hook>,
}

impl Hooks {
    fn stage_mut(&mut self, stage: Stage) -> &mut Vec<Hook> {
        match stage {
            Stage::BeforeInit => &mut self.before_init,
            Stage::AfterInit => &mut self.after_init,
            Stage::BeforeLoad => &mut self.before_load,
            Stage::AfterLoad => &mut self.after_load,
            Stage::BeforeSave => &mut self.before_save,
            Stage::AfterSave => &mut self.after_save,
        }
    }

    pub fn get(&self, stage: Stage) -> &[Hook] {
        match stage {
            Stage::BeforeInit => &self.before_init,
            Stage::AfterInit => &self.after_init,
            Stage::BeforeLoad => &self.before_load,
            Stage::AfterLoad => &self.after_load,
            Stage::BeforeSave => &self.before_save,
            Stage::AfterSave => &self.after_save,
        }
    }

    pub fn add(&mut self, stage: Stage, hook: Hook) {
        self.stage_mut(stage).push(hook);
    }
}

/// Why a field didn't get a flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The field has tags, but not the struct tag
    Untagged,

    /// The field is behind an `Option` that's `None`
    Absent,

    /// The tag has no `name`
    Unnamed,

    /// A flag with this name already exists. Initialization stops here.
    Collision,

    /// The field's kind can't be bound
    Unsupported,
}

/// Where a field ended up after [`init`][Source::init]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldState {
    /// Initialization stopped before reaching this field
    Pending,
    Bound,
    Skipped(SkipReason),
    Failed(String),
}

/// The outcome of initialization for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldReport {
    pub path: String,
    pub flag: Option<String>,
    pub state: FieldState,
}

/// What to do after looking at one field
enum Step {
    Next(FieldState),
    Stop,
}

struct Options<S> {
    name: String,
    allow_fail: bool,
    struct_tag: Cow<'static, str>,
    env_tag: Cow<'static, str>,
    bind: BindOptions,
    hooks: Hooks,
    skip_load: Option<Predicate>,
    skip_save: Option<Predicate>,
    flag_set_name: Option<String>,
    error_handling: Option<ErrorHandling>,
    usage: Option<UsageFn<S>>,
}

impl<S> Default for Options<S> {
    fn default() -> Self {
        Self {
            name: String::new(),
            allow_fail: false,
            struct_tag: Cow::Borrowed(DEFAULT_STRUCT_TAG),
            env_tag: Cow::Borrowed(DEFAULT_ENV_TAG),
            bind: BindOptions::default(),
            hooks: Hooks::default(),
            skip_load: None,
            skip_save: None,
            flag_set_name: None,
            error_handling: None,
            usage: None,
        }
    }
}

/**
A [`Source`] that binds the tagged fields of `S` to command line flags.

```no_run
use flagtag::{Fields, FlagSource, Source as _};

#[derive(Fields, Default)]
struct Config {
    #[tags(flag = "name=broker,desc='broker address',default='127.0.0.1:9092'")]
    broker: String,
}

let mut config = Config::default();
let mut source = FlagSource::new(&mut config);
source.init()?;
source.load()?;
drop(source);

println!("{}", config.broker);
# Ok::<(), flagtag::Error>(())
```

By default the flag set is named after the program and exits the process
on a parse error, like a typical command line tool.
*/
pub struct FlagSource<'a, S> {
    target: &'a mut S,
    flags: FlagSet<S>,
    arguments: LoadedArguments,
    options: Options<S>,
    report: Vec<FieldReport>,
}

impl<'a, S: Fields> FlagSource<'a, S> {
    /// A source over the process's command line arguments
    pub fn new(target: &'a mut S) -> Self {
        let arguments = LoadedArguments::from_env();
        let flags = FlagSet::new(arguments.program_name(), ErrorHandling::ExitOnError);

        Self {
            target,
            flags,
            arguments,
            options: Options::default(),
            report: Vec::new(),
        }
    }

    /// Name reported by [`Source::name`]
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.options.name = name.into();
        self
    }

    /// Log binding and parsing errors instead of returning them. A binding
    /// error still abandons the remaining fields.
    #[must_use]
    pub fn allow_fail(mut self, allow_fail: bool) -> Self {
        self.options.allow_fail = allow_fail;
        self
    }

    /// Tag key holding the flag definition. Defaults to `flag`.
    #[must_use]
    pub fn struct_tag(mut self, tag: impl Into<Cow<'static, str>>) -> Self {
        self.options.struct_tag = tag.into();
        self
    }

    /// Tag key naming an environment variable, which is mentioned in the
    /// flag's help text. Defaults to `env`.
    #[must_use]
    pub fn env_tag(mut self, tag: impl Into<Cow<'static, str>>) -> Self {
        self.options.env_tag = tag.into();
        self
    }

    #[must_use]
    pub fn slice_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.options.bind.slice_delimiter = delimiter.into();
        self
    }

    #[must_use]
    pub fn map_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.options.bind.map_delimiter = delimiter.into();
        self
    }

    /// Layout for timestamp fields. Without one, binding a timestamp fails.
    #[must_use]
    pub fn time_layout(mut self, layout: TimeLayout) -> Self {
        self.options.bind.time_layout = Some(layout);
        self
    }

    /// Register flags in this set instead of a fresh one
    #[must_use]
    pub fn flag_set(mut self, flags: FlagSet<S>) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn flag_set_name(mut self, name: impl Into<String>) -> Self {
        self.options.flag_set_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn error_handling(mut self, error_handling: ErrorHandling) -> Self {
        self.options.error_handling = Some(error_handling);
        self
    }

    /// Replace the usage message printer
    #[must_use]
    pub fn usage(
        mut self,
        usage: impl Fn(&FlagSet<S>, &S, &mut dyn io::Write) -> io::Result<()> + 'static,
    ) -> Self {
        self.options.usage = Some(Rc::new(usage));
        self
    }

    /// Parse these arguments instead of the process's. The first one is the
    /// program name.
    #[must_use]
    pub fn arguments(mut self, arguments: LoadedArguments) -> Self {
        self.arguments = arguments;
        self
    }

    #[must_use]
    pub fn hook(
        mut self,
        stage: Stage,
        hook: impl Fn(&dyn Source) -> Result<(), BoxError> + 'static,
    ) -> Self {
        self.options.hooks.add(stage, Box::new(hook));
        self
    }

    #[must_use]
    pub fn skip_load(mut self, skip: impl Fn(&dyn Source) -> bool + 'static) -> Self {
        self.options.skip_load = Some(Box::new(skip));
        self
    }

    #[must_use]
    pub fn skip_save(mut self, skip: impl Fn(&dyn Source) -> bool + 'static) -> Self {
        self.options.skip_save = Some(Box::new(skip));
        self
    }

    /// The flags registered so far
    #[inline]
    pub fn flags(&self) -> &FlagSet<S> {
        &self.flags
    }

    /// The bound structure, as it currently stands
    #[inline]
    pub fn target(&self) -> &S {
        self.target
    }

    /// Per-field outcome of the most recent [`init`][Source::init]
    #[inline]
    pub fn report(&self) -> &[FieldReport] {
        &self.report
    }

    /// Arguments left over after flag parsing stopped
    #[inline]
    pub fn args(&self) -> &[String] {
        self.flags.args()
    }

    /// Write the usage message for the registered flags
    pub fn write_usage(&self, out: &mut dyn io::Write) -> io::Result<()> {
        self.flags.write_usage(self.target, out)
    }

    /// [`init`][Source::init], then [`load`][Source::load]
    pub fn init_and_load(&mut self) -> Result<(), Error> {
        self.init()?;
        self.load()
    }

    /// Apply the flag set options
    fn configure(&mut self) {
        if let Some(ref name) = self.options.flag_set_name {
            self.flags.set_name(name.clone());
        }

        if let Some(error_handling) = self.options.error_handling {
            self.flags.set_error_handling(error_handling);
        }

        if let Some(ref usage) = self.options.usage {
            self.flags.set_usage(Rc::clone(usage));
        }
    }

    fn run_hooks(&self, stage: Stage) -> Result<(), Error> {
        let result = self
            .options
            .hooks
            .get(stage)
            .iter()
            .try_for_each(|hook| hook(self).map_err(Error::Hook));

        match result {
            Err(error) if self.options.allow_fail => {
                warn!(source = %self.options.name, %stage, %error, "hook failed");
                Ok(())
            }
            result => result,
        }
    }

    /// Look at one field and bind it if it should be bound
    fn visit_field(&mut self, field: &Field<S>, spec: &mut Option<FlagSpec>) -> Result<Step, Error> {
        let Some(tag) = field.tag(&self.options.struct_tag) else {
            return Ok(Step::Next(FieldState::Skipped(SkipReason::Untagged)));
        };

        let spec = spec.insert(FlagSpec::parse(tag));

        if let Some(env) = field.tag(&self.options.env_tag) {
            spec.desc = format!("{} (env {env})", spec.desc);
        }

        if !field.is_present(self.target) {
            debug!(field = field.path(), "field is absent, skipping");
            return Ok(Step::Next(FieldState::Skipped(SkipReason::Absent)));
        }

        if spec.name.is_empty() {
            warn!(field = field.path(), "flag tag has no name, skipping");
            return Ok(Step::Next(FieldState::Skipped(SkipReason::Unnamed)));
        }

        if self.flags.lookup(&spec.name).is_some() {
            return Ok(Step::Stop);
        }

        let bound = bind(
            &mut self.flags,
            self.target,
            field.binding(),
            spec,
            &self.options.bind,
        )?;

        Ok(Step::Next(match bound {
            Bound::Registered => FieldState::Bound,
            Bound::Ignored => FieldState::Skipped(SkipReason::Unsupported),
        }))
    }
}

impl<S: Fields> Source for FlagSource<'_, S> {
    fn name(&self) -> &str {
        &self.options.name
    }

    fn kind(&self) -> &'static str {
        "flag"
    }

    /**
    Bind every tagged field, in declaration order.

    If a field's flag name is already registered, initialization stops at
    that field and succeeds without running the after-init hooks. Calling
    `init` a second time is therefore a no-op.
    */
    fn init(&mut self) -> Result<(), Error> {
        self.run_hooks(Stage::BeforeInit)?;
        self.configure();

        let fields = S::fields();
        self.report = fields
            .iter()
            .map(|field| FieldReport {
                path: field.path().to_owned(),
                flag: None,
                state: FieldState::Pending,
            })
            .collect();

        for (index, field) in fields.iter().enumerate() {
            let mut spec = None;
            let step = self.visit_field(field, &mut spec);

            let report = &mut self.report[index];
            report.flag = spec.map(|spec| spec.name);

            match step {
                Ok(Step::Next(state)) => report.state = state,
                Ok(Step::Stop) => {
                    report.state = FieldState::Skipped(SkipReason::Collision);
                    debug!(
                        field = field.path(),
                        flag = report.flag.as_deref(),
                        "flag already registered, stopping"
                    );
                    return Ok(());
                }
                Err(error) => {
                    report.state = FieldState::Failed(error.to_string());

                    if !self.options.allow_fail {
                        return Err(error);
                    }

                    warn!(field = field.path(), %error, "failed to bind field, abandoning the rest");
                    return self.run_hooks(Stage::AfterInit);
                }
            }
        }

        self.run_hooks(Stage::AfterInit)
    }

    fn load(&mut self) -> Result<(), Error> {
        if let Some(ref skip) = self.options.skip_load
            && skip(&*self)
        {
            debug!(source = %self.options.name, "load skipped");
            return Ok(());
        }

        self.run_hooks(Stage::BeforeLoad)?;

        if let Err(error) = self.flags.parse(self.target, self.arguments.flag_args()) {
            if !self.options.allow_fail {
                return Err(error);
            }

            warn!(source = %self.options.name, %error, "failed to parse command line flags");
        }

        self.run_hooks(Stage::AfterLoad)
    }

    /// Flags are read only, so this only runs the hooks.
    fn save(&mut self) -> Result<(), Error> {
        if let Some(ref skip) = self.options.skip_save
            && skip(&*self)
        {
            debug!(source = %self.options.name, "save skipped");
            return Ok(());
        }

        self.run_hooks(Stage::BeforeSave)?;
        self.run_hooks(Stage::AfterSave)
    }

    fn watch(&mut self) -> Result<Box<dyn Watcher>, Error> {
        Err(Error::NotImplemented)
    }
}

impl<S> fmt::Debug for FlagSource<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagSource")
            .field("name", &self.options.name)
            .field("flags", &self.flags)
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}
