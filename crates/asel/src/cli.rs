#![forbid(unsafe_code)]

//! Command-line interface for the `asel` binary.
//!
//! Arguments are parsed by hand. Options come first; the first non-option
//! argument (or whatever follows `--`) names the program, and everything
//! after it is passed to the program untouched. Environment variables supply
//! defaults that explicit flags override.

use std::env;
use std::fmt;
use std::process::{Command as ProcessCommand, Stdio};
use std::time::Duration;

use asel_core::{
    AsyncSpec, CandidateSource, LinesFromProcess, MatchOptions, OutputBuffer, SelectError,
    StaticSource,
};
use asel_runtime::{AsyncSelect, AsyncSelectConfig, RefreshAction, SelectOptions};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const HELP_TEXT: &str = "\
asel - pick one line from a program's output while it is still running

USAGE:
    asel [OPTIONS] [--] PROGRAM [ARGS...]

OPTIONS:
    --prompt=TEXT        Prompt shown before the input (default: '> ')
    --refresh-ms=N       Redisplay period in milliseconds; 0 disables (default: 300)
    --no-refresh         Never redisplay while idle
    --require-match      Only accept a listed candidate
    --initial=TEXT       Pre-fill the input
    --ignore-case        Match candidates case-insensitively
    --sync               Wait for PROGRAM to exit, then pick from its output
    --help, -h           Show this help message
    --version, -V        Show version

KEYS:
    Enter               Accept
    Tab                 Complete the common prefix
    Up/Down, C-p/C-n    Move the selection
    C-a / C-e           Start / end of input
    C-u                 Clear input
    Esc, C-c, C-g       Cancel

ENVIRONMENT VARIABLES:
    ASEL_PROMPT          Default for --prompt
    ASEL_REFRESH_MS      Default for --refresh-ms
    ASEL_REFRESH         on|off; off behaves like --no-refresh
    ASEL_LOG             Log filter directives (logging is off when unset)
    ASEL_LOG_FORMAT      text|json
    ASEL_LOG_FILE        Write logs to this file instead of stderr

EXIT STATUS:
    0    a line was selected and printed
    1    usage, spawn or terminal error
    130  cancelled";

/// Exit status for a successful selection.
pub const EXIT_SELECTED: u8 = 0;
/// Exit status for usage, spawn and terminal errors.
pub const EXIT_FAILURE: u8 = 1;
/// Exit status for a cancelled prompt.
pub const EXIT_CANCELLED: u8 = 130;

const DEFAULT_PROMPT: &str = "> ";

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
    pub prompt: String,
    /// Refresh period override; `Some(0)` disables refresh.
    pub refresh_ms: Option<u64>,
    pub no_refresh: bool,
    pub require_match: bool,
    pub initial: Option<String>,
    pub ignore_case: bool,
    /// Run the program to completion before prompting.
    pub sync: bool,
    pub program: String,
    pub args: Vec<String>,
}

impl Opts {
    /// Options for `program` with every flag at its default.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            prompt: DEFAULT_PROMPT.into(),
            refresh_ms: None,
            no_refresh: false,
            require_match: false,
            initial: None,
            ignore_case: false,
            sync: false,
            program: program.into(),
            args: Vec::new(),
        }
    }

    fn spec(&self) -> AsyncSpec {
        AsyncSpec::new(self.program.clone(), self.args.clone())
    }

    fn match_options(&self) -> MatchOptions {
        if self.ignore_case {
            MatchOptions::ignore_case()
        } else {
            MatchOptions::default()
        }
    }

    fn select_options(&self) -> SelectOptions {
        let options = SelectOptions::new().require_match(self.require_match);
        match &self.initial {
            Some(text) => options.with_initial_input(text.clone()),
            None => options,
        }
    }

    /// Apply the refresh flags on top of `config`.
    ///
    /// A positive `--refresh-ms` re-enables a refresh the environment turned
    /// off; `--no-refresh` wins over both.
    pub fn apply(&self, mut config: AsyncSelectConfig) -> AsyncSelectConfig {
        if let Some(ms) = self.refresh_ms {
            config = config.with_refresh_period(Duration::from_millis(ms));
            if ms > 0 && !config.refresh.is_enabled() {
                config = config.with_refresh(RefreshAction::Redisplay);
            }
        }
        if self.no_refresh {
            config = config.with_refresh(RefreshAction::Disabled);
        }
        config
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(Opts),
    Help,
    Version,
}

/// Parse the process arguments and environment.
///
/// # Errors
///
/// See [`parse_from`].
pub fn parse() -> Result<Command, CliError> {
    parse_from(env::args().skip(1), |key| env::var(key).ok())
}

/// Parse `args` (without the binary name) with `get_env` for defaults.
///
/// # Errors
///
/// Returns a [`CliError`] for unknown options, malformed values, or a
/// missing program.
pub fn parse_from<I, S, F>(args: I, get_env: F) -> Result<Command, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    F: Fn(&str) -> Option<String>,
{
    let mut opts = Opts::new(String::new());
    if let Some(prompt) = get_env("ASEL_PROMPT") {
        opts.prompt = prompt;
    }

    let mut args = args.into_iter().map(Into::<String>::into);
    let mut program = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(Command::Help),
            "--version" | "-V" => return Ok(Command::Version),
            "--" => {
                program = args.next();
                break;
            }
            "--no-refresh" => opts.no_refresh = true,
            "--require-match" => opts.require_match = true,
            "--ignore-case" => opts.ignore_case = true,
            "--sync" => opts.sync = true,
            other => {
                if let Some(val) = other.strip_prefix("--prompt=") {
                    opts.prompt = val.to_string();
                } else if let Some(val) = other.strip_prefix("--initial=") {
                    opts.initial = Some(val.to_string());
                } else if let Some(val) = other.strip_prefix("--refresh-ms=") {
                    let ms = val.parse().map_err(|_| CliError::InvalidValue {
                        flag: "--refresh-ms",
                        value: val.to_string(),
                    })?;
                    opts.refresh_ms = Some(ms);
                } else if other.starts_with('-') && other.len() > 1 {
                    return Err(CliError::UnknownOption(other.to_string()));
                } else {
                    program = Some(other.to_string());
                    break;
                }
            }
        }
    }

    opts.program = program.ok_or(CliError::MissingProgram)?;
    opts.args = args.collect();
    Ok(Command::Run(opts))
}

/// Run the prompt described by `opts` with configuration from the environment.
///
/// # Errors
///
/// See [`run_with`].
pub fn run(opts: &Opts) -> Result<String, SelectError> {
    run_with(opts, AsyncSelectConfig::from_env())
}

/// Run the prompt described by `opts` on top of `config`.
///
/// # Errors
///
/// [`SelectError::Spawn`] when the program cannot be started, otherwise
/// whatever the selection returns.
pub fn run_with(opts: &Opts, config: AsyncSelectConfig) -> Result<String, SelectError> {
    let select = AsyncSelect::new(opts.apply(config));
    let options = opts.select_options();
    let mut source: Box<dyn CandidateSource> = if opts.sync {
        Box::new(read_to_end(opts)?)
    } else {
        Box::new(LinesFromProcess::new(opts.spec()).with_match_options(opts.match_options()))
    };
    select.run(&opts.prompt, source.as_mut(), None, &options)
}

/// Run the program to completion and offer its lines as a static list.
fn read_to_end(opts: &Opts) -> Result<StaticSource, SelectError> {
    let spec = opts.spec();
    let output = ProcessCommand::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|source| SelectError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
    if !output.status.success() {
        tracing::debug!(program = %spec.program, status = %output.status, "program exited unsuccessfully");
    }

    let buffer = OutputBuffer::new();
    buffer.append(&output.stdout);
    buffer.finish();
    let mut lines = LinesFromProcess::new(spec);
    lines.poll(&buffer);
    buffer.destroy();

    Ok(StaticSource::new(lines.lines().iter().cloned()).with_match_options(opts.match_options()))
}

/// Exit status for the outcome of [`run`].
pub fn exit_code(result: &Result<String, SelectError>) -> u8 {
    match result {
        Ok(_) => EXIT_SELECTED,
        Err(err) if err.is_cancelled() => EXIT_CANCELLED,
        Err(_) => EXIT_FAILURE,
    }
}

/// Invalid command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    UnknownOption(String),
    InvalidValue { flag: &'static str, value: String },
    MissingProgram,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOption(opt) => write!(f, "unknown option: {opt}"),
            Self::InvalidValue { flag, value } => write!(f, "invalid value for {flag}: {value}"),
            Self::MissingProgram => write!(f, "missing PROGRAM"),
        }
    }
}

impl std::error::Error for CliError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn parse_opts(args: &[&str]) -> Opts {
        match parse_from(args.iter().copied(), no_env).unwrap() {
            Command::Run(opts) => opts,
            other => panic!("expected Run, got {other:?}"),
        }
    }

    #[test]
    fn version_string_nonempty() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn help_text_lists_env_vars() {
        for var in ["ASEL_PROMPT", "ASEL_REFRESH_MS", "ASEL_REFRESH", "ASEL_LOG"] {
            assert!(HELP_TEXT.contains(var), "{var} missing from help");
        }
    }

    #[test]
    fn program_only() {
        let opts = parse_opts(&["find", ".", "-type", "f"]);
        assert_eq!(opts.program, "find");
        assert_eq!(opts.args, [".", "-type", "f"]);
        assert_eq!(opts.prompt, "> ");
        assert!(!opts.sync);
    }

    #[test]
    fn flags_before_program() {
        let opts = parse_opts(&[
            "--prompt=File: ",
            "--refresh-ms=50",
            "--require-match",
            "--initial=src/",
            "--ignore-case",
            "--sync",
            "ls",
        ]);
        assert_eq!(opts.prompt, "File: ");
        assert_eq!(opts.refresh_ms, Some(50));
        assert!(opts.require_match);
        assert_eq!(opts.initial.as_deref(), Some("src/"));
        assert!(opts.ignore_case);
        assert!(opts.sync);
        assert_eq!(opts.program, "ls");
    }

    #[test]
    fn double_dash_ends_options() {
        let opts = parse_opts(&["--no-refresh", "--", "--weird-program", "--help"]);
        assert!(opts.no_refresh);
        assert_eq!(opts.program, "--weird-program");
        assert_eq!(opts.args, ["--help"]);
    }

    #[test]
    fn help_and_version() {
        assert_eq!(parse_from(["--help"], no_env).unwrap(), Command::Help);
        assert_eq!(parse_from(["-V", "ls"], no_env).unwrap(), Command::Version);
    }

    #[test]
    fn errors() {
        assert_eq!(
            parse_from(Vec::<String>::new(), no_env).unwrap_err(),
            CliError::MissingProgram
        );
        assert_eq!(
            parse_from(["--bogus", "ls"], no_env).unwrap_err(),
            CliError::UnknownOption("--bogus".into())
        );
        let err = parse_from(["--refresh-ms=fast", "ls"], no_env).unwrap_err();
        assert_eq!(err.to_string(), "invalid value for --refresh-ms: fast");
    }

    #[test]
    fn env_prompt_is_overridden_by_flag() {
        let env = |key: &str| (key == "ASEL_PROMPT").then(|| "env> ".to_string());
        let Command::Run(opts) = parse_from(["ls"], env).unwrap() else {
            panic!("expected Run");
        };
        assert_eq!(opts.prompt, "env> ");
        let Command::Run(opts) = parse_from(["--prompt=flag> ", "ls"], env).unwrap() else {
            panic!("expected Run");
        };
        assert_eq!(opts.prompt, "flag> ");
    }

    #[test]
    fn refresh_flags_shape_config() {
        let mut opts = Opts::new("ls");
        opts.refresh_ms = Some(40);
        let config = opts.apply(AsyncSelectConfig::default());
        assert_eq!(config.refresh_period, Duration::from_millis(40));
        assert!(config.refresh.is_enabled());

        opts.refresh_ms = Some(0);
        assert!(!opts.apply(AsyncSelectConfig::default()).refresh.is_enabled());

        let mut opts = Opts::new("ls");
        opts.no_refresh = true;
        assert!(!opts.apply(AsyncSelectConfig::default()).refresh.is_enabled());
    }

    #[test]
    fn refresh_flag_overrides_env_that_disabled_refresh() {
        for (key, value) in [("ASEL_REFRESH", "off"), ("ASEL_REFRESH_MS", "0")] {
            let from_env = || {
                AsyncSelectConfig::from_env_with(|k| (k == key).then(|| value.to_string())).config
            };
            assert!(!from_env().refresh.is_enabled(), "{key}={value}");

            let mut opts = Opts::new("ls");
            opts.refresh_ms = Some(100);
            let config = opts.apply(from_env());
            assert!(config.refresh.is_enabled(), "{key}={value}");
            assert_eq!(config.refresh_period, Duration::from_millis(100));

            opts.no_refresh = true;
            assert!(!opts.apply(from_env()).refresh.is_enabled());
        }
    }

    #[test]
    fn refresh_flag_keeps_custom_action() {
        let config = AsyncSelectConfig::default().with_refresh(RefreshAction::custom(|| {}));
        let mut opts = Opts::new("ls");
        opts.refresh_ms = Some(100);
        let config = opts.apply(config);
        assert!(matches!(config.refresh, RefreshAction::Custom(_)));
    }

    #[test]
    fn exit_codes() {
        assert_eq!(exit_code(&Ok("x".into())), EXIT_SELECTED);
        assert_eq!(exit_code(&Err(SelectError::Cancelled)), EXIT_CANCELLED);
        assert_eq!(exit_code(&Err(SelectError::delegate("boom"))), EXIT_FAILURE);
    }
}
