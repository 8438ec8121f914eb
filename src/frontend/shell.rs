use std::io::Write;
use chrono::Utc;
use clap::ValueEnum;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{info, warn};

use crate::analysis::{ModelFilter, ModelQuery, SortKey};
use crate::inventory::{format_bytes, ManagerError, ModelRecord};
use crate::session::{DeletionEvent, Session};
use super::display;
use super::{Frontend, FrontendError, FrontendExit, FrontendKind, InitFailure};

const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const BRIGHT_CYAN: &str = "\x1b[96m";
const RESET: &str = "\x1b[0m";

/// Usage and description of every shell command, in help order.
const COMMANDS: &[(&str, &str)] = &[
    ("list, ls", "Show models with the current search, filter and sort"),
    ("search [text]", "Search by name (no text clears the search)"),
    ("filter <name>", "Apply a filter (see below)"),
    ("sort <name|size|modified> [desc]", "Change the sort order"),
    ("reset", "Clear search, filter and sort"),
    ("show <#|name>", "Show model details"),
    ("star <#|name>", "Star or unstar a model"),
    ("queue [#|name]", "Queue a model for deletion, or list the queue"),
    ("unqueue <#|name>", "Remove a model from the deletion queue"),
    ("clearqueue", "Empty the deletion queue"),
    ("delete", "Delete every queued model"),
    ("families", "Show model families"),
    ("usage", "Show Open WebUI usage statistics"),
    ("storage", "Show storage totals"),
    ("refresh", "Reload the model list"),
    ("switch", "Print the table view and exit"),
    ("clear", "Clear the screen"),
    ("help", "Show this help message"),
    ("exit, bye, quit", "Leave the viewer"),
];

fn print_help() {
    println!("\n{CYAN}Model Viewer Commands{RESET}");
    println!("{BRIGHT_CYAN}{}{RESET}", "=".repeat(60));
    for (usage, description) in COMMANDS {
        println!("{GREEN}{:<34}{RESET}- {}", usage, description);
    }
    println!("Filters: {}", filter_names());
    println!();
}

fn filter_names() -> String {
    ModelFilter::value_variants()
        .iter()
        .filter_map(|filter| filter.to_possible_value())
        .map(|value| value.get_name().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One parsed shell command.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Help,
    Clear,
    Quit,
    List,
    Search(Option<String>),
    Filter(ModelFilter),
    Sort(SortKey, bool),
    Reset,
    Show(String),
    Star(String),
    Queue(Option<String>),
    Unqueue(String),
    ClearQueue,
    Delete,
    Families,
    Usage,
    Storage,
    Refresh,
    Switch,
}

/// Parses one input line. Errors carry a usage message.
pub fn parse_command(input: &str) -> Result<ShellCommand, String> {
    let input = input.trim();
    let (head, rest) = match input.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (input, ""),
    };
    let arg = |usage: &str| {
        if rest.is_empty() {
            Err(format!("Usage: {}", usage))
        } else {
            Ok(rest.to_string())
        }
    };

    match head.to_lowercase().as_str() {
        "help" | "?" => Ok(ShellCommand::Help),
        "clear" => Ok(ShellCommand::Clear),
        "exit" | "bye" | "quit" => Ok(ShellCommand::Quit),
        "list" | "ls" => Ok(ShellCommand::List),
        "search" => Ok(ShellCommand::Search((!rest.is_empty()).then(|| rest.to_string()))),
        "filter" => {
            let name = arg("filter <name>")?;
            ModelFilter::from_str(&name, true)
                .map(ShellCommand::Filter)
                .map_err(|_| format!("Unknown filter '{}'. Filters: {}", name, filter_names()))
        }
        "sort" => {
            let mut words = rest.split_whitespace();
            let key = words.next().ok_or("Usage: sort <name|size|modified> [desc]")?;
            let key = SortKey::from_str(key, true)
                .map_err(|_| format!("Unknown sort key '{}'", key))?;
            let reverse = matches!(words.next(), Some(word) if word.eq_ignore_ascii_case("desc"));
            Ok(ShellCommand::Sort(key, reverse))
        }
        "reset" => Ok(ShellCommand::Reset),
        "show" => arg("show <#|name>").map(ShellCommand::Show),
        "star" => arg("star <#|name>").map(ShellCommand::Star),
        "queue" => Ok(ShellCommand::Queue((!rest.is_empty()).then(|| rest.to_string()))),
        "unqueue" => arg("unqueue <#|name>").map(ShellCommand::Unqueue),
        "clearqueue" => Ok(ShellCommand::ClearQueue),
        "delete" | "rm" => Ok(ShellCommand::Delete),
        "families" => Ok(ShellCommand::Families),
        "usage" => Ok(ShellCommand::Usage),
        "storage" => Ok(ShellCommand::Storage),
        "refresh" | "reload" => Ok(ShellCommand::Refresh),
        "switch" => Ok(ShellCommand::Switch),
        other => Err(format!("Unknown command '{}'. Type 'help' for a list of commands.", other)),
    }
}

/// Result of executing one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Exit(FrontendExit),
}

/// Everything the shell knows apart from the line editor.
pub struct ShellState {
    session: Session,
    query: ModelQuery,
    /// Names in the order of the last printed list, for `#` references
    view: Vec<String>,
}

impl ShellState {
    pub fn new(session: Session, query: ModelQuery) -> Self {
        Self { session, query, view: Vec::new() }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn query(&self) -> &ModelQuery {
        &self.query
    }

    fn refresh_view(&mut self) {
        self.view = self
            .query
            .apply(self.session.records(), Utc::now())
            .iter()
            .map(|record| record.name.clone())
            .collect();
    }

    fn print_list(&mut self) {
        let now = Utc::now();
        let shown = self.query.apply(self.session.records(), now);
        self.view = shown.iter().map(|record| record.name.clone()).collect();
        display::print_models(&shown, self.session.records().len(), now);
    }

    /// A 1-based number from the last list, or a model name.
    pub fn resolve(&mut self, target: &str) -> Option<String> {
        if self.view.is_empty() {
            self.refresh_view();
        }
        if let Ok(number) = target.parse::<usize>() {
            return number.checked_sub(1).and_then(|i| self.view.get(i)).cloned();
        }
        self.session
            .records()
            .iter()
            .find(|record| record.name.eq_ignore_ascii_case(target))
            .map(|record| record.name.clone())
    }

    fn resolve_or_report(&mut self, target: &str) -> Option<String> {
        let name = self.resolve(target);
        if name.is_none() {
            display::print_warning(&format!("No model '{}'", target));
        }
        name
    }

    /// Reloads the inventory, keeping the old list on failure.
    pub fn reload(&mut self) -> Result<usize, ManagerError> {
        let spinner = display::spinner("Listing models...");
        let result = self.session.reload();
        spinner.finish_and_clear();
        self.view.clear();
        result
    }

    fn delete_queued(&mut self, confirm: &mut dyn FnMut(&str) -> bool) {
        let queued = self.session.deletion_queue().len();
        if queued == 0 {
            display::print_warning("The deletion queue is empty");
            return;
        }

        let prompt = format!(
            "Delete {} models ({})? [y/N] ",
            queued,
            format_bytes(self.session.queued_bytes())
        );
        if !confirm(&prompt) {
            display::print_status("Deletion cancelled");
            return;
        }

        let spinner = display::spinner("Deleting...");
        let report = self.session.process_deletion_queue(|event| match event {
            DeletionEvent::Started { name, index, total } => {
                spinner.set_message(format!("Deleting {} ({}/{})", name, index + 1, total));
            }
            DeletionEvent::Deleted { name } => spinner.println(format!("{} {}", "✓".green(), name)),
            DeletionEvent::Failed { name, error } => {
                spinner.println(format!("{} {}: {}", "✗".red(), name, error))
            }
        });
        spinner.finish_and_clear();

        display::print_deletion_report(&report);
        // a reload re-synchronizes with what the manager really removed
        if let Err(e) = self.reload() {
            display::print_error(&format!("Could not refresh models: {}", e));
        }
    }

    /// Runs one command. `confirm` asks the user a yes/no question.
    pub fn execute(&mut self, command: ShellCommand, confirm: &mut dyn FnMut(&str) -> bool) -> Outcome {
        match command {
            ShellCommand::Help => print_help(),
            ShellCommand::Clear => {
                print!("\x1B[2J\x1B[1;1H");
                let _ = std::io::stdout().flush();
            }
            ShellCommand::Quit => return Outcome::Exit(FrontendExit::Quit),
            ShellCommand::Switch => return Outcome::Exit(FrontendExit::Switch(FrontendKind::Table)),
            ShellCommand::List => self.print_list(),
            ShellCommand::Search(term) => {
                self.query.search = term;
                self.print_list();
            }
            ShellCommand::Filter(filter) => {
                self.query.filter = filter;
                self.print_list();
            }
            ShellCommand::Sort(key, reverse) => {
                self.query.sort = key;
                self.query.reverse = reverse;
                self.print_list();
            }
            ShellCommand::Reset => {
                self.query = ModelQuery::default();
                self.print_list();
            }
            ShellCommand::Show(target) => {
                if let Some(name) = self.resolve_or_report(&target) {
                    match self.session.show(&name) {
                        Ok(details) => println!("\n{}\n{}", name.green().bold(), details),
                        Err(e) => display::print_error(&format!("Could not show {}: {}", name, e)),
                    }
                }
            }
            ShellCommand::Star(target) => {
                if let Some(name) = self.resolve_or_report(&target) {
                    match self.session.toggle_star(&name) {
                        Ok(true) => display::print_success(&format!("Starred {}", name)),
                        Ok(false) => display::print_success(&format!("Unstarred {}", name)),
                        Err(e) => display::print_error(&format!("Could not save stars: {}", e)),
                    }
                }
            }
            ShellCommand::Queue(None) => {
                let queue = self.session.deletion_queue();
                if queue.is_empty() {
                    display::print_status("The deletion queue is empty");
                } else {
                    for (i, name) in queue.iter().enumerate() {
                        println!("{:>3}. {}", i + 1, name.red());
                    }
                    display::print_storage(
                        self.session.total_bytes(),
                        self.session.records().len(),
                        self.session.queued_bytes(),
                        queue.len(),
                    );
                }
            }
            ShellCommand::Queue(Some(target)) => {
                if let Some(name) = self.resolve_or_report(&target) {
                    if self.session.queue_for_deletion(&name) {
                        display::print_success(&format!(
                            "Queued {} ({} queued)",
                            name,
                            self.session.deletion_queue().len()
                        ));
                    } else {
                        display::print_status(&format!("{} is already queued", name));
                    }
                }
            }
            ShellCommand::Unqueue(target) => {
                if let Some(name) = self.resolve_or_report(&target) {
                    if self.session.unqueue(&name) {
                        display::print_success(&format!("Removed {} from the queue", name));
                    } else {
                        display::print_status(&format!("{} is not queued", name));
                    }
                }
            }
            ShellCommand::ClearQueue => {
                self.session.clear_queue();
                display::print_success("Deletion queue cleared");
            }
            ShellCommand::Delete => self.delete_queued(confirm),
            ShellCommand::Families => display::print_families(&self.session.families()),
            ShellCommand::Usage => {
                let records: Vec<&ModelRecord> = self
                    .session
                    .records()
                    .iter()
                    .filter(|record| record.usage.is_some())
                    .collect();
                if records.is_empty() {
                    display::print_warning("No Open WebUI usage data available");
                } else {
                    println!("\n{}", display::usage_table(&records, Utc::now()));
                }
            }
            ShellCommand::Storage => display::print_storage(
                self.session.total_bytes(),
                self.session.records().len(),
                self.session.queued_bytes(),
                self.session.deletion_queue().len(),
            ),
            ShellCommand::Refresh => match self.reload() {
                Ok(count) => display::print_success(&format!("Loaded {} models", count)),
                Err(e) => display::print_error(&format!("Could not list models: {}", e)),
            },
        }
        Outcome::Continue
    }
}

/// Interactive front-end built on a line editor.
pub struct ShellFrontend {
    editor: DefaultEditor,
    state: ShellState,
}

impl ShellFrontend {
    /// Fails, returning the session, when the line editor cannot start.
    pub fn new(session: Session, query: ModelQuery) -> Result<Self, InitFailure> {
        match DefaultEditor::new() {
            Ok(editor) => Ok(Self { editor, state: ShellState::new(session, query) }),
            Err(e) => Err(InitFailure { session, error: FrontendError::Readline(e) }),
        }
    }
}

impl Frontend for ShellFrontend {
    fn kind(&self) -> FrontendKind {
        FrontendKind::Shell
    }

    fn load(&mut self) -> Result<usize, ManagerError> {
        self.state.reload()
    }

    fn set_records(&mut self, records: Vec<ModelRecord>) {
        self.state.session.set_records(records);
        self.state.view.clear();
    }

    fn records(&self) -> &[ModelRecord] {
        self.state.session.records()
    }

    fn run(&mut self) -> Result<FrontendExit, FrontendError> {
        info!("Starting interactive shell");
        print_help();
        self.state.print_list();

        let editor = &mut self.editor;
        loop {
            let prompt = match self.state.session.deletion_queue().len() {
                0 => "omv> ".to_string(),
                n => format!("omv [{} queued]> ", n),
            };

            let input = match editor.readline(&prompt) {
                Ok(input) => input,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    println!("Goodbye!");
                    return Ok(FrontendExit::Quit);
                }
                Err(e) => return Err(e.into()),
            };

            let input = input.trim();
            if input.is_empty() {
                continue;
            }
            let _ = editor.add_history_entry(input);

            let command = match parse_command(input) {
                Ok(command) => command,
                Err(message) => {
                    display::print_warning(&message);
                    continue;
                }
            };

            let mut confirm = |question: &str| match editor.readline(question) {
                Ok(answer) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
                Err(e) => {
                    warn!("Confirmation aborted: {}", e);
                    false
                }
            };

            if let Outcome::Exit(exit) = self.state.execute(command, &mut confirm) {
                if exit == FrontendExit::Quit {
                    println!("Goodbye!");
                }
                return Ok(exit);
            }
        }
    }

    fn teardown(self: Box<Self>) -> Session {
        self.state.session
    }
}
