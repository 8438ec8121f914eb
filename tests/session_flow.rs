use omv::analysis::{ModelFilter, ModelQuery, SortKey};
use omv::config::StarredStore;
use omv::inventory::{parse_list_output, ListedModel, ManagerError, ModelManager};
use omv::session::{DeletionEvent, Session};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

const LIST_OUTPUT: &str = "\
NAME                          ID              SIZE      MODIFIED
llama3:8b                     365c0bd3c000    4.7 GB    3 days ago
llama3:latest                 365c0bd3c000    4.7 GB    3 days ago
llama3:8b-instruct-q4_0       1b2c3d4e5f60    4.7 GB    2 weeks ago
llava:13b                     0d0eb4d7f485    8.0 GB    5 weeks ago
dolphin-mixtral:uncensored    4f9ab12c9d00    26 GB     About a minute ago
";

/// Manager backed by a canned `list` output.
#[derive(Clone)]
struct CannedManager {
    models: Rc<RefCell<Vec<ListedModel>>>,
    refuse: BTreeSet<String>,
}

impl CannedManager {
    fn new(refuse: &[&str]) -> Self {
        Self {
            models: Rc::new(RefCell::new(parse_list_output(LIST_OUTPUT))),
            refuse: refuse.iter().map(|name| name.to_string()).collect(),
        }
    }
}

impl ModelManager for CannedManager {
    fn list(&self) -> Result<Vec<ListedModel>, ManagerError> {
        Ok(self.models.borrow().clone())
    }

    fn delete(&self, name: &str) -> Result<(), ManagerError> {
        if self.refuse.contains(name) {
            return Err(ManagerError::CommandFailed {
                command: format!("ollama rm {}", name),
                code: Some(1),
                stderr: "permission denied".to_string(),
            });
        }
        self.models.borrow_mut().retain(|model| model.name != name);
        Ok(())
    }

    fn show(&self, name: &str) -> Result<String, ManagerError> {
        Ok(format!("details of {}", name))
    }

    fn is_available(&self) -> bool {
        true
    }
}

fn session(manager: &CannedManager, dir: &std::path::Path) -> Session {
    Session::new(
        Box::new(manager.clone()),
        StarredStore::load(dir.join("stars.json")),
        None,
    )
}

#[test]
fn classifies_a_realistic_inventory() {
    let dir = tempfile::tempdir().unwrap();
    let manager = CannedManager::new(&[]);
    let mut session = session(&manager, dir.path());
    assert_eq!(session.reload().unwrap(), 5);

    let latest = session.record("llama3:latest").unwrap();
    assert!(latest.is_duplicate);
    assert!(!session.record("llama3:8b").unwrap().is_duplicate);
    assert!(session.record("llama3:8b-instruct-q4_0").unwrap().is_special_variant);

    let dolphin = session.record("dolphin-mixtral:uncensored").unwrap();
    assert!(dolphin.is_liberated);

    let families = session.families();
    assert_eq!(families.len(), 1);
    assert_eq!(families[0].base_name, "llama3");
    assert_eq!(families[0].total_count, 3);

    let now = chrono::Utc::now();
    let large = ModelQuery { filter: ModelFilter::Large, ..Default::default() };
    let names: Vec<_> = large.apply(session.records(), now).iter().map(|r| r.name.clone()).collect();
    assert_eq!(names, vec!["dolphin-mixtral:uncensored"]);

    let by_size = ModelQuery { sort: SortKey::Size, reverse: true, ..Default::default() };
    assert_eq!(by_size.apply(session.records(), now)[0].name, "dolphin-mixtral:uncensored");
}

#[test]
fn stars_survive_a_new_session() {
    let dir = tempfile::tempdir().unwrap();
    let manager = CannedManager::new(&[]);

    let mut first = session(&manager, dir.path());
    first.reload().unwrap();
    assert!(first.toggle_star("llava:13b").unwrap());

    let mut second = session(&manager, dir.path());
    second.reload().unwrap();
    assert!(second.record("llava:13b").unwrap().is_starred);
    assert!(second.starred().contains("llava:13b"));
}

#[test]
fn deletion_continues_past_failures() {
    let dir = tempfile::tempdir().unwrap();
    let manager = CannedManager::new(&["llama3:latest"]);
    let mut session = session(&manager, dir.path());
    session.reload().unwrap();
    session.toggle_star("llava:13b").unwrap();

    for name in ["llama3:latest", "llava:13b", "dolphin-mixtral:uncensored"] {
        assert!(session.queue_for_deletion(name));
    }
    assert!(!session.queue_for_deletion("llava:13b"));

    let mut failures = 0;
    let report = session.process_deletion_queue(|event| {
        if let DeletionEvent::Failed { .. } = event {
            failures += 1;
        }
    });

    assert_eq!(failures, 1);
    assert_eq!(report.deleted, vec!["llava:13b", "dolphin-mixtral:uncensored"]);
    assert_eq!(report.failed.len(), 1);
    assert!(session.deletion_queue().is_empty());
    assert!(!session.starred().contains("llava:13b"));
    assert!(session.record("llama3:latest").is_some());
    assert_eq!(session.records().len(), 3);
}
