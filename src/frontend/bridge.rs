use std::io::IsTerminal;
use tracing::{info, warn};

use crate::analysis::ModelQuery;
use crate::session::Session;
use super::display;
use super::{
    Frontend, FrontendChoice, FrontendError, FrontendExit, FrontendKind, InitFailure,
    ShellFrontend, TableFrontend,
};

/// Facts about the environment that decide which front-end can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalProbe {
    /// Both stdin and stdout are attached to a terminal
    pub interactive: bool,
}

impl TerminalProbe {
    pub fn detect() -> Self {
        Self {
            interactive: std::io::stdin().is_terminal() && std::io::stdout().is_terminal(),
        }
    }
}

/// Picks the initial front-end.
///
/// `auto` chooses the shell only on a terminal with the interactive flag on.
/// An explicit shell request without a terminal falls back to the table.
pub fn select_kind(choice: FrontendChoice, interactive_flag: bool, probe: TerminalProbe) -> FrontendKind {
    match choice {
        FrontendChoice::Auto if probe.interactive && interactive_flag => FrontendKind::Shell,
        FrontendChoice::Auto | FrontendChoice::Table => FrontendKind::Table,
        FrontendChoice::Shell if probe.interactive => FrontendKind::Shell,
        FrontendChoice::Shell => {
            warn!("Shell requested but no terminal is attached, falling back to table");
            FrontendKind::Table
        }
    }
}

/// Builds front-ends for the bridge.
pub trait FrontendFactory {
    fn create(&self, kind: FrontendKind, session: Session) -> Result<Box<dyn Frontend>, InitFailure>;
}

/// Builds the real table and shell front-ends.
#[derive(Debug, Clone, Default)]
pub struct DefaultFactory {
    /// Initial search/filter/sort for either front-end
    pub query: ModelQuery,
}

impl FrontendFactory for DefaultFactory {
    fn create(&self, kind: FrontendKind, session: Session) -> Result<Box<dyn Frontend>, InitFailure> {
        match kind {
            FrontendKind::Table => Ok(Box::new(TableFrontend::new(session, self.query.clone()))),
            FrontendKind::Shell => ShellFrontend::new(session, self.query.clone())
                .map(|shell| Box::new(shell) as Box<dyn Frontend>),
        }
    }
}

/// Where the bridge is in its life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Unselected,
    Selected(FrontendKind),
}

/// Selects, runs and swaps front-ends over one session.
pub struct PresentationBridge<F: FrontendFactory> {
    factory: F,
    active: Option<Box<dyn Frontend>>,
}

impl<F: FrontendFactory> PresentationBridge<F> {
    pub fn new(factory: F) -> Self {
        Self { factory, active: None }
    }

    pub fn state(&self) -> BridgeState {
        match &self.active {
            Some(frontend) => BridgeState::Selected(frontend.kind()),
            None => BridgeState::Unselected,
        }
    }

    /// The active front-end, if any.
    pub fn active(&self) -> Option<&dyn Frontend> {
        self.active.as_deref()
    }

    /// Creates `kind`, falling back to the table if the shell fails to start.
    fn instantiate(&self, kind: FrontendKind, session: Session) -> Result<Box<dyn Frontend>, FrontendError> {
        match self.factory.create(kind, session) {
            Ok(frontend) => Ok(frontend),
            Err(InitFailure { session, error }) if kind == FrontendKind::Shell => {
                warn!("Shell front-end failed to start ({}), falling back to table", error);
                self.factory
                    .create(FrontendKind::Table, session)
                    .map_err(|failure| failure.error)
            }
            Err(failure) => Err(failure.error),
        }
    }

    /// Selects the first front-end and loads the inventory into it.
    ///
    /// A failed inventory load is reported and leaves the record list empty;
    /// it does not prevent the front-end from running.
    pub fn select(&mut self, kind: FrontendKind, session: Session) -> Result<FrontendKind, FrontendError> {
        if let Some(previous) = self.active.take() {
            drop(previous.teardown());
        }

        let mut frontend = self.instantiate(kind, session)?;
        let selected = frontend.kind();
        info!("Selected {} front-end", selected);

        display::print_status("Loading models...");
        match frontend.load() {
            Ok(count) => display::print_success(&format!("Loaded {} models", count)),
            Err(e) => {
                display::print_error(&format!("Could not list models: {}", e));
                display::print_status("Error: Ollama not found or not running");
            }
        }

        self.active = Some(frontend);
        Ok(selected)
    }

    /// Swaps the active front-end for `kind`, handing the record list over
    /// unchanged.
    pub fn switch_to(&mut self, kind: FrontendKind) -> Result<FrontendKind, FrontendError> {
        let current = self.active.take().ok_or(FrontendError::NotSelected)?;
        if current.kind() == kind {
            self.active = Some(current);
            return Ok(kind);
        }

        let mut session = current.teardown();
        let records = session.take_records();

        let mut next = self.instantiate(kind, session)?;
        next.set_records(records);

        let selected = next.kind();
        info!("Switched to {} front-end", selected);
        self.active = Some(next);
        Ok(selected)
    }

    /// Runs front-ends until one quits, then returns the session.
    pub fn run(&mut self) -> Result<Session, FrontendError> {
        loop {
            let frontend = self.active.as_mut().ok_or(FrontendError::NotSelected)?;
            match frontend.run()? {
                FrontendExit::Quit => break,
                FrontendExit::Switch(kind) => {
                    self.switch_to(kind)?;
                }
            }
        }

        let frontend = self.active.take().ok_or(FrontendError::NotSelected)?;
        Ok(frontend.teardown())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use crate::inventory::{ManagerError, ModelRecord};
    use crate::session::tests::{session_with, FakeManager};

    const TTY: TerminalProbe = TerminalProbe { interactive: true };
    const PIPE: TerminalProbe = TerminalProbe { interactive: false };

    #[test]
    fn test_select_kind() {
        assert_eq!(select_kind(FrontendChoice::Auto, true, TTY), FrontendKind::Shell);
        assert_eq!(select_kind(FrontendChoice::Auto, false, TTY), FrontendKind::Table);
        assert_eq!(select_kind(FrontendChoice::Auto, true, PIPE), FrontendKind::Table);
        assert_eq!(select_kind(FrontendChoice::Shell, false, TTY), FrontendKind::Shell);
        assert_eq!(select_kind(FrontendChoice::Shell, true, PIPE), FrontendKind::Table);
        assert_eq!(select_kind(FrontendChoice::Table, true, TTY), FrontendKind::Table);
    }

    /// Scripted front-end: returns the queued exits in order.
    struct Scripted {
        kind: FrontendKind,
        session: Session,
        exits: Rc<RefCell<Vec<FrontendExit>>>,
        seen: Rc<RefCell<Vec<(FrontendKind, usize)>>>,
    }

    impl Frontend for Scripted {
        fn kind(&self) -> FrontendKind {
            self.kind
        }

        fn load(&mut self) -> Result<usize, ManagerError> {
            self.session.reload()
        }

        fn set_records(&mut self, records: Vec<ModelRecord>) {
            self.session.set_records(records);
        }

        fn records(&self) -> &[ModelRecord] {
            self.session.records()
        }

        fn run(&mut self) -> Result<FrontendExit, FrontendError> {
            self.seen.borrow_mut().push((self.kind, self.session.records().len()));
            Ok(self.exits.borrow_mut().remove(0))
        }

        fn teardown(self: Box<Self>) -> Session {
            self.session
        }
    }

    struct ScriptedFactory {
        shell_fails: bool,
        exits: Rc<RefCell<Vec<FrontendExit>>>,
        seen: Rc<RefCell<Vec<(FrontendKind, usize)>>>,
    }

    impl FrontendFactory for ScriptedFactory {
        fn create(&self, kind: FrontendKind, session: Session) -> Result<Box<dyn Frontend>, InitFailure> {
            if kind == FrontendKind::Shell && self.shell_fails {
                return Err(InitFailure { session, error: FrontendError::NoTerminal });
            }
            Ok(Box::new(Scripted {
                kind,
                session,
                exits: Rc::clone(&self.exits),
                seen: Rc::clone(&self.seen),
            }))
        }
    }

    fn factory(shell_fails: bool, exits: Vec<FrontendExit>) -> ScriptedFactory {
        ScriptedFactory {
            shell_fails,
            exits: Rc::new(RefCell::new(exits)),
            seen: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn two_models() -> FakeManager {
        FakeManager::with_models(&[("a:1", "1 GB", "1 day ago"), ("b:1", "2 GB", "3 days ago")])
    }

    #[test]
    fn test_shell_failure_falls_back_to_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut bridge = PresentationBridge::new(factory(true, vec![FrontendExit::Quit]));
        assert_eq!(bridge.state(), BridgeState::Unselected);

        let selected = bridge.select(FrontendKind::Shell, session_with(&two_models(), dir.path())).unwrap();
        assert_eq!(selected, FrontendKind::Table);
        assert_eq!(bridge.state(), BridgeState::Selected(FrontendKind::Table));
        assert_eq!(bridge.active().unwrap().records().len(), 2);
    }

    #[test]
    fn test_switch_preserves_records() {
        let dir = tempfile::tempdir().unwrap();
        let scripted = factory(
            false,
            vec![FrontendExit::Switch(FrontendKind::Shell), FrontendExit::Quit],
        );
        let seen = Rc::clone(&scripted.seen);
        let fake = two_models();
        let mut bridge = PresentationBridge::new(scripted);

        bridge.select(FrontendKind::Table, session_with(&fake, dir.path())).unwrap();
        // the manager no longer lists anything, so records can only come from the handoff
        fake.models.borrow_mut().clear();

        let session = bridge.run().unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![(FrontendKind::Table, 2), (FrontendKind::Shell, 2)]
        );
        assert_eq!(session.records().len(), 2);
        assert_eq!(bridge.state(), BridgeState::Unselected);
    }

    #[test]
    fn test_switch_to_failing_shell_stays_on_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut bridge = PresentationBridge::new(factory(true, vec![]));
        bridge.select(FrontendKind::Table, session_with(&two_models(), dir.path())).unwrap();

        assert_eq!(bridge.switch_to(FrontendKind::Shell).unwrap(), FrontendKind::Table);
        assert_eq!(bridge.active().unwrap().records().len(), 2);
    }

    #[test]
    fn test_switch_without_selection_fails() {
        let mut bridge = PresentationBridge::new(factory(false, vec![]));
        assert!(matches!(bridge.switch_to(FrontendKind::Table), Err(FrontendError::NotSelected)));
        assert!(matches!(bridge.run(), Err(FrontendError::NotSelected)));
    }
}
