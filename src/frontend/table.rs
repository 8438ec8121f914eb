use chrono::Utc;

use crate::analysis::ModelQuery;
use crate::inventory::{ManagerError, ModelRecord};
use crate::session::Session;
use super::display;
use super::{Frontend, FrontendError, FrontendExit, FrontendKind};

/// One-shot front-end: prints the filtered list, a storage line and exits.
pub struct TableFrontend {
    session: Session,
    query: ModelQuery,
}

impl TableFrontend {
    pub fn new(session: Session, query: ModelQuery) -> Self {
        Self { session, query }
    }

    pub fn query(&self) -> &ModelQuery {
        &self.query
    }

    /// Prints the current view without leaving the front-end.
    pub fn render(&self) {
        let records = self.session.records();
        let shown = self.query.apply(records, Utc::now());

        if self.query.search.is_some() || self.query.filter != Default::default() {
            display::print_status(&format!(
                "Search: {}  Filter: {}  Sort: {:?}{}",
                self.query.search.as_deref().unwrap_or("-"),
                self.query.filter,
                self.query.sort,
                if self.query.reverse { " (reversed)" } else { "" }
            ));
        }
        display::print_models(&shown, records.len(), Utc::now());
        display::print_storage(
            self.session.total_bytes(),
            records.len(),
            self.session.queued_bytes(),
            self.session.deletion_queue().len(),
        );
    }
}

impl Frontend for TableFrontend {
    fn kind(&self) -> FrontendKind {
        FrontendKind::Table
    }

    fn load(&mut self) -> Result<usize, ManagerError> {
        let spinner = display::spinner("Listing models...");
        let result = self.session.reload();
        spinner.finish_and_clear();
        result
    }

    fn set_records(&mut self, records: Vec<ModelRecord>) {
        self.session.set_records(records);
    }

    fn records(&self) -> &[ModelRecord] {
        self.session.records()
    }

    fn run(&mut self) -> Result<FrontendExit, FrontendError> {
        self.render();
        Ok(FrontendExit::Quit)
    }

    fn teardown(self: Box<Self>) -> Session {
        self.session
    }
}
