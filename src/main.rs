use std::io::Write;
use std::path::PathBuf;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use omv::analysis::{ModelFilter, ModelQuery, SortKey};
use omv::config::starred::STARRED_FILE_NAME;
use omv::config::{Settings, StarredStore};
use omv::frontend::bridge::select_kind;
use omv::frontend::{display, DefaultFactory, Frontend, FrontendChoice, PresentationBridge, TableFrontend, TerminalProbe};
use omv::inventory::OllamaCli;
use omv::session::{DeletionEvent, Session};
use omv::usage::{locate_data_dir, LocateOptions, UsageDatabase, DATABASE_FILE};
use omv::vault::{self, ObfuscationKey};

#[derive(Parser, Debug)]
#[command(name = "omv", version, about = "Browse, star and clean up locally installed Ollama models")]
struct Cli {
    /// Front-end to launch when no sub-command is given
    #[arg(long, value_enum)]
    frontend: Option<FrontendChoice>,

    /// Directory holding default.toml and local.toml
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    #[command(flatten)]
    query: QueryArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Clone)]
struct QueryArgs {
    /// Only show models matching this filter
    #[arg(long, value_enum, default_value = "all")]
    filter: ModelFilter,

    /// Case-insensitive substring of the model name
    #[arg(long)]
    search: Option<String>,

    #[arg(long, value_enum, default_value = "name")]
    sort: SortKey,

    /// Reverse the sort order
    #[arg(long)]
    reverse: bool,
}

impl From<QueryArgs> for ModelQuery {
    fn from(args: QueryArgs) -> Self {
        ModelQuery {
            search: args.search,
            filter: args.filter,
            sort: args.sort,
            reverse: args.reverse,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the model table once
    List(QueryArgs),
    /// Show the manager's details for one model
    Show { name: String },
    /// Star a model
    Star { name: String },
    /// Remove the star from a model
    Unstar { name: String },
    /// Delete one or more models
    Delete {
        #[arg(required = true)]
        names: Vec<String>,
        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },
    /// List model families with their variants and duplicates
    Families,
    /// Print storage totals
    Storage,
    /// Print Open WebUI usage statistics
    Usage,
    /// Find the Open WebUI database
    Locate {
        /// Obfuscate a plain database found in the data directory
        #[arg(long)]
        obfuscate: bool,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_dir(&cli.config_dir).context("Failed to load settings")?;

    let log_dir = settings.log_dir().to_path_buf();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::RollingFileAppender::new(
        tracing_appender::rolling::Rotation::DAILY,
        &log_dir,
        "omv",
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .with_env_filter(filter)
        .init();

    info!("omv starting up");
    info!("Log directory: {}", log_dir.display());

    match cli.command {
        None => launch(&settings, cli.frontend, cli.query.into()),
        Some(Commands::List(query)) => list(&settings, query.into()),
        Some(Commands::Show { name }) => {
            let session = build_session(&settings, false);
            let details = session.show(&name)?;
            println!("{}\n{}", name.green().bold(), details);
            Ok(())
        }
        Some(Commands::Star { name }) => set_star(&settings, &name, true),
        Some(Commands::Unstar { name }) => set_star(&settings, &name, false),
        Some(Commands::Delete { names, yes }) => delete(&settings, &names, yes),
        Some(Commands::Families) => {
            let session = loaded_session(&settings, false)?;
            display::print_families(&session.families());
            Ok(())
        }
        Some(Commands::Storage) => {
            let session = loaded_session(&settings, false)?;
            display::print_storage(session.total_bytes(), session.records().len(), 0.0, 0);
            Ok(())
        }
        Some(Commands::Usage) => usage(&settings),
        Some(Commands::Locate { obfuscate }) => locate(&settings, obfuscate),
    }
}

fn locate_options(settings: &Settings, key: Option<ObfuscationKey>) -> LocateOptions {
    let mut options = LocateOptions::for_home(dirs::home_dir());
    options.extra_dir = settings.openwebui.data_dir.clone();
    options.docker_copy = settings.openwebui.docker_copy;
    options.search_depth = settings.openwebui.search_depth;
    options.obfuscate_with = key;
    options
}

fn obfuscation_key(settings: &Settings) -> Option<ObfuscationKey> {
    if !settings.openwebui.obfuscate {
        return None;
    }
    match ObfuscationKey::for_current_user() {
        Ok(key) => Some(key),
        Err(e) => {
            warn!("Database obfuscation disabled: {}", e);
            None
        }
    }
}

fn usage_source(settings: &Settings) -> Option<UsageDatabase> {
    if !settings.openwebui.enabled {
        return None;
    }
    let key = obfuscation_key(settings);
    locate_data_dir(&locate_options(settings, key.clone())).map(|dir| UsageDatabase::new(dir, key))
}

fn build_session(settings: &Settings, with_usage: bool) -> Session {
    let manager = OllamaCli::new(
        settings.manager.binary.clone(),
        settings.manager.delete_subcommand.clone(),
    );
    let starred_path = settings
        .starred_path()
        .unwrap_or_else(|| PathBuf::from(STARRED_FILE_NAME));
    let usage = if with_usage { usage_source(settings) } else { None };

    Session::new(Box::new(manager), StarredStore::load(starred_path), usage)
}

fn loaded_session(settings: &Settings, with_usage: bool) -> Result<Session> {
    let mut session = build_session(settings, with_usage);
    let spinner = display::spinner("Listing models...");
    let result = session.reload();
    spinner.finish_and_clear();
    result.context("Could not list models. Is Ollama installed and running?")?;
    Ok(session)
}

fn launch(settings: &Settings, choice: Option<FrontendChoice>, query: ModelQuery) -> Result<()> {
    let choice = choice.unwrap_or(settings.frontend.choice);
    let kind = select_kind(choice, settings.frontend.interactive, TerminalProbe::detect());
    info!("Front-end choice {:?} resolved to {}", choice, kind);

    let session = build_session(settings, true);
    let mut bridge = PresentationBridge::new(DefaultFactory { query });
    bridge.select(kind, session)?;
    bridge.run()?;
    Ok(())
}

fn list(settings: &Settings, query: ModelQuery) -> Result<()> {
    let session = build_session(settings, true);
    let mut table = TableFrontend::new(session, query);
    table
        .load()
        .context("Could not list models. Is Ollama installed and running?")?;
    table.render();
    Ok(())
}

fn set_star(settings: &Settings, name: &str, starred: bool) -> Result<()> {
    let mut session = build_session(settings, false);
    let changed = session.set_star(name, starred)?;
    let verb = if starred { "Starred" } else { "Unstarred" };
    if changed {
        display::print_success(&format!("{} {}", verb, name));
    } else {
        display::print_status(&format!("{} was already {}", name, verb.to_lowercase()));
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{}", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn delete(settings: &Settings, names: &[String], yes: bool) -> Result<()> {
    let mut session = loaded_session(settings, false)?;

    for name in names {
        if session.record(name).is_none() {
            display::print_warning(&format!("{} is not installed, skipping", name));
            continue;
        }
        session.queue_for_deletion(name);
    }

    let queued = session.deletion_queue().len();
    if queued == 0 {
        bail!("Nothing to delete");
    }

    let question = format!(
        "Delete {} models ({})? [y/N] ",
        queued,
        omv::inventory::format_bytes(session.queued_bytes())
    );
    if !yes && !confirm(&question)? {
        display::print_status("Deletion cancelled");
        return Ok(());
    }

    let progress = ProgressBar::new(queued as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:30.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let report = session.process_deletion_queue(|event| match event {
        DeletionEvent::Started { name, .. } => progress.set_message(format!("Deleting {}", name)),
        DeletionEvent::Deleted { .. } | DeletionEvent::Failed { .. } => progress.inc(1),
    });
    progress.finish_and_clear();

    display::print_deletion_report(&report);
    if !report.all_succeeded() {
        bail!("{} of {} deletions failed", report.failed.len(), queued);
    }
    Ok(())
}

fn usage(settings: &Settings) -> Result<()> {
    let session = loaded_session(settings, true)?;
    let records: Vec<_> = session
        .records()
        .iter()
        .filter(|record| record.usage.is_some())
        .collect();

    if records.is_empty() {
        display::print_warning("No Open WebUI usage data available");
    } else {
        println!("\n{}", display::usage_table(&records, Utc::now()));
    }
    Ok(())
}

fn locate(settings: &Settings, obfuscate: bool) -> Result<()> {
    let key = obfuscation_key(settings);
    let Some(dir) = locate_data_dir(&locate_options(settings, key.clone())) else {
        bail!("Open WebUI database not found");
    };
    display::print_success(&format!("Open WebUI data directory: {}", dir.display()));

    let plain = dir.join(DATABASE_FILE);
    if obfuscate && plain.is_file() {
        let key = match key {
            Some(key) => key,
            None => ObfuscationKey::for_current_user()?,
        };
        let obfuscated = vault::obfuscate_file(&plain, &key)?;
        display::print_success(&format!("Obfuscated database written to {}", obfuscated.display()));
    }
    Ok(())
}
