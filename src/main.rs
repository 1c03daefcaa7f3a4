use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use is_terminal::IsTerminal;
use tracing_subscriber::EnvFilter;

mod apply;
mod console;
mod decision;
mod diff;
mod error;
mod highlight;
mod locate;
mod logging;
mod matcher;
mod plan;
mod protect;
mod safety;
mod session;
mod store;

use console::TerminalConsole;
use error::ReplaceError;
use highlight::Renderer;
use logging::ChangeLog;
use session::{SessionConfig, SessionContext, run_session};
use store::{JsonStore, StringStore};

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq, Default)]
enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn should_color(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => io::stdout().is_terminal(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(cli)
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "langsweep=debug"
    } else {
        "langsweep=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Replace(cmd) => handle_replace(cmd)?,
        Command::Batch(cmd) => handle_batch(cmd)?,
        Command::Checkin(cmd) => handle_checkin(cmd)?,
        Command::Discard(cmd) => handle_discard(cmd)?,
        Command::Log(cmd) => handle_log(cmd)?,
    }

    Ok(())
}

fn handle_replace(cmd: ReplaceCommand) -> Result<()> {
    let config = cmd.session_config();
    let mut store = JsonStore::open(&cmd.common.store)?;
    print_command_summary("replace", &cmd.common, &config);
    run_one(&config, &cmd.common, &mut store)
}

fn handle_batch(cmd: BatchCommand) -> Result<()> {
    let plan = plan::load_plan(&cmd.plan)?;
    let base = cmd.common.session_config();
    let mut store = JsonStore::open(&cmd.common.store)?;
    let total = plan.steps.len();
    for (index, step) in plan.steps.iter().enumerate() {
        let config = step.session_config(&base);
        println!("=== step {}/{total} ===", index + 1);
        print_command_summary("batch", &cmd.common, &config);
        run_one(&config, &cmd.common, &mut store)?;
    }
    Ok(())
}

fn run_one(config: &SessionConfig, common: &CommonArgs, store: &mut JsonStore) -> Result<()> {
    let change_log = (!common.no_log).then(ChangeLog::default_location);
    let mut console = TerminalConsole;
    let mut ctx = SessionContext {
        store: &mut *store,
        console: &mut console,
        renderer: Renderer::new(common.color.should_color()),
        change_log: change_log.as_ref(),
    };
    match run_session(config, &mut ctx) {
        Ok(report) => {
            if !report.committed && store.has_pending(&config.lang) {
                println!(
                    "pending edits kept in {}; run `langsweep checkin` or `langsweep discard` for '{}'",
                    store.working_path(&config.lang).display(),
                    config.lang
                );
            }
            Ok(())
        }
        Err(ReplaceError::NoMatches(term)) => {
            println!("no strings match '{term}'; nothing to do.");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn handle_checkin(cmd: StoreCommand) -> Result<()> {
    let mut store = JsonStore::open(&cmd.store)?;
    if !store.has_pending(&cmd.lang) {
        println!("nothing checked out for '{}'.", cmd.lang);
        return Ok(());
    }
    store.checkin(&cmd.lang)?;
    println!("checked in '{}'.", cmd.lang);
    Ok(())
}

fn handle_discard(cmd: StoreCommand) -> Result<()> {
    let mut store = JsonStore::open(&cmd.store)?;
    if !store.has_pending(&cmd.lang) {
        println!("nothing checked out for '{}'.", cmd.lang);
        return Ok(());
    }
    store.discard(&cmd.lang)?;
    println!("discarded pending edits for '{}'.", cmd.lang);
    Ok(())
}

fn handle_log(cmd: LogCommand) -> Result<()> {
    let entries = ChangeLog::default_location().read_recent(cmd.tail)?;
    if entries.is_empty() {
        println!("change log is empty.");
        return Ok(());
    }
    for entry in entries {
        println!(
            "[{}] {:<4} {:<8} {:<12} {}/{} ({})",
            entry.timestamp,
            entry.lang,
            entry.action,
            entry.summary,
            entry.component,
            entry.stringid,
            entry.field
        );
    }
    Ok(())
}

fn print_command_summary(command: &str, common: &CommonArgs, config: &SessionConfig) {
    println!("command: {command}");
    println!(
        "mode: {}",
        match (config.assume_yes, config.assume_no) {
            (true, false) => "assume yes",
            (false, true) => "assume no",
            _ => "interactive",
        }
    );
    println!("store: {}", common.store.display());
    println!("language: {}", config.lang);
    if config.components.is_empty() {
        println!("components: (all)");
    } else {
        println!("components: {:?}", config.components);
    }
    println!(
        "search: {} ({})",
        config.search.as_deref().unwrap_or("(none)"),
        if config.regex { "regex" } else { "literal" }
    );
    println!(
        "replacement: {}",
        config.replacement.as_deref().unwrap_or("(none)")
    );
    if let Some(prefix) = &config.prefix {
        println!("allowed prefix: {prefix}");
    }
    if let Some(suffix) = &config.suffix {
        println!("allowed suffix: {suffix}");
    }
    println!("---");
}

#[derive(Debug, Parser)]
#[command(
    name = "langsweep",
    version,
    about = "Search and replace across customised language strings"
)]
struct Cli {
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Replace(ReplaceCommand),
    Batch(BatchCommand),
    Checkin(StoreCommand),
    Discard(StoreCommand),
    Log(LogCommand),
}

#[derive(Debug, Clone, Args)]
struct CommonArgs {
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    store: PathBuf,
    #[arg(long, value_name = "CODE")]
    lang: String,
    #[arg(long = "component", value_name = "GLOB")]
    components: Vec<String>,
    #[arg(long = "yes", action = ArgAction::SetTrue)]
    assume_yes: bool,
    #[arg(long = "no", action = ArgAction::SetTrue)]
    assume_no: bool,
    #[arg(long = "color", value_enum, default_value = "auto")]
    color: ColorChoice,
    #[arg(long = "no-log", action = ArgAction::SetTrue)]
    no_log: bool,
}

impl CommonArgs {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            lang: self.lang.clone(),
            components: self.components.clone(),
            assume_yes: self.assume_yes,
            assume_no: self.assume_no,
            ..SessionConfig::default()
        }
    }
}

#[derive(Debug, Args)]
struct ReplaceCommand {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, value_name = "TEXT")]
    search: Option<String>,
    #[arg(long = "replace", value_name = "TEXT")]
    replacement: Option<String>,
    #[arg(long, action = ArgAction::SetTrue)]
    regex: bool,
    #[arg(long, value_name = "TEXT")]
    prefix: Option<String>,
    #[arg(long, value_name = "TEXT")]
    suffix: Option<String>,
}

impl ReplaceCommand {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            search: self.search.clone(),
            replacement: self.replacement.clone(),
            regex: self.regex,
            prefix: self.prefix.clone(),
            suffix: self.suffix.clone(),
            ..self.common.session_config()
        }
    }
}

#[derive(Debug, Args)]
struct BatchCommand {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(value_name = "PLAN", value_hint = ValueHint::FilePath)]
    plan: PathBuf,
}

#[derive(Debug, Args)]
struct StoreCommand {
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    store: PathBuf,
    #[arg(long, value_name = "CODE")]
    lang: String,
}

#[derive(Debug, Args)]
struct LogCommand {
    #[arg(long = "tail", default_value_t = 20)]
    tail: usize,
}
