//! # Session Module
//!
//! Owns everything a running viewer knows: the record list, the starred set,
//! the deletion queue and the usage cache. The presentation bridge owns one
//! session and lends it to whichever front-end is active.

use std::collections::{BTreeSet, HashMap};
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analysis::{self, VariantGroup};
use crate::config::{StarredStore, StoreError};
use crate::inventory::{size, ListedModel, ManagerError, ModelManager, ModelRecord};
use crate::usage::{UsageCache, UsageDatabase, UsageInfo};

/// Progress of [`Session::process_deletion_queue`], one event per step.
#[derive(Debug)]
pub enum DeletionEvent<'a> {
    Started { name: &'a str, index: usize, total: usize },
    Deleted { name: &'a str },
    Failed { name: &'a str, error: &'a ManagerError },
}

/// Outcome of processing the deletion queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionReport {
    pub deleted: Vec<String>,
    /// Name and error message of each failed deletion
    pub failed: Vec<(String, String)>,
}

impl DeletionReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Session {
    manager: Box<dyn ModelManager>,
    starred: StarredStore,
    deletion_queue: Vec<String>,
    usage_source: Option<UsageDatabase>,
    usage: OnceCell<UsageCache>,
    records: Vec<ModelRecord>,
}

impl Session {
    pub fn new(
        manager: Box<dyn ModelManager>,
        starred: StarredStore,
        usage_source: Option<UsageDatabase>,
    ) -> Self {
        Self {
            manager,
            starred,
            deletion_queue: Vec::new(),
            usage_source,
            usage: OnceCell::new(),
            records: Vec::new(),
        }
    }

    /// Usage statistics, read from the database on first access only.
    pub fn usage(&self) -> &UsageCache {
        self.usage.get_or_init(|| match &self.usage_source {
            Some(source) => source.load(),
            None => UsageCache::default(),
        })
    }

    /// Re-lists the inventory and rebuilds every record.
    ///
    /// On failure the previous records are kept.
    pub fn reload(&mut self) -> Result<usize, ManagerError> {
        let listed = self.manager.list()?;
        let usage = self.usage();
        let mut records = analysis::classify_models(listed, |name| usage.lookup(name).cloned());

        for record in &mut records {
            record.is_starred = self.starred.contains(&record.name);
            record.is_queued_for_deletion = self.deletion_queue.contains(&record.name);
        }

        info!("Loaded {} models", records.len());
        self.records = records;
        Ok(self.records.len())
    }

    pub fn records(&self) -> &[ModelRecord] {
        &self.records
    }

    /// Replaces the record list wholesale, as handed over by another front-end.
    pub fn set_records(&mut self, records: Vec<ModelRecord>) {
        self.records = records;
    }

    /// Moves the record list out, leaving the session empty.
    pub fn take_records(&mut self) -> Vec<ModelRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn record(&self, name: &str) -> Option<&ModelRecord> {
        self.records.iter().find(|record| record.name == name)
    }

    /// Families with two or more installed members.
    pub fn families(&self) -> Vec<&VariantGroup> {
        let mut seen = BTreeSet::new();
        self.records
            .iter()
            .filter_map(|record| record.variant_info.as_ref())
            .filter(|group| seen.insert(group.base_name.clone()))
            .collect()
    }

    pub fn starred(&self) -> &StarredStore {
        &self.starred
    }

    fn sync_flags(&mut self) {
        for record in &mut self.records {
            record.is_starred = self.starred.contains(&record.name);
            record.is_queued_for_deletion = self.deletion_queue.contains(&record.name);
        }
    }

    /// Flips the star on `name`, persists it and returns the new state.
    ///
    /// If the file cannot be written the star is flipped back.
    pub fn toggle_star(&mut self, name: &str) -> Result<bool, StoreError> {
        let starred = self.starred.toggle(name);
        if let Err(e) = self.starred.save() {
            self.starred.toggle(name);
            return Err(e);
        }
        self.sync_flags();
        Ok(starred)
    }

    /// Stars or unstars `name`. Returns whether anything changed.
    ///
    /// If the file cannot be written the change is undone.
    pub fn set_star(&mut self, name: &str, starred: bool) -> Result<bool, StoreError> {
        let changed = if starred {
            self.starred.insert(name)
        } else {
            self.starred.remove(name)
        };
        if !changed {
            return Ok(false);
        }
        if let Err(e) = self.starred.save() {
            if starred {
                self.starred.remove(name);
            } else {
                self.starred.insert(name);
            }
            return Err(e);
        }
        self.sync_flags();
        Ok(true)
    }

    /// Appends `name` to the deletion queue. Returns false if already queued.
    pub fn queue_for_deletion(&mut self, name: &str) -> bool {
        if self.deletion_queue.iter().any(|queued| queued == name) {
            return false;
        }
        self.deletion_queue.push(name.to_string());
        self.sync_flags();
        true
    }

    pub fn unqueue(&mut self, name: &str) -> bool {
        let before = self.deletion_queue.len();
        self.deletion_queue.retain(|queued| queued != name);
        let removed = self.deletion_queue.len() != before;
        if removed {
            self.sync_flags();
        }
        removed
    }

    pub fn clear_queue(&mut self) {
        self.deletion_queue.clear();
        self.sync_flags();
    }

    pub fn deletion_queue(&self) -> &[String] {
        &self.deletion_queue
    }

    /// Bytes that deleting the queued models would free.
    pub fn queued_bytes(&self) -> f64 {
        size::total_bytes(
            self.records
                .iter()
                .filter(|record| self.deletion_queue.contains(&record.name))
                .map(|record| record.size.as_str()),
        )
    }

    /// Bytes used by every listed model.
    pub fn total_bytes(&self) -> f64 {
        size::total_bytes(self.records.iter().map(|record| record.size.as_str()))
    }

    /// Deletes every queued model, one at a time, in queue order.
    ///
    /// Failures are collected and do not stop the remaining deletions. The
    /// queue is empty afterwards whatever the outcome. Deleted models are
    /// also unstarred and dropped from the record list.
    pub fn process_deletion_queue<F>(&mut self, mut on_event: F) -> DeletionReport
    where
        F: FnMut(DeletionEvent<'_>),
    {
        let queue = std::mem::take(&mut self.deletion_queue);
        let total = queue.len();
        let mut report = DeletionReport::default();

        for (index, name) in queue.iter().enumerate() {
            on_event(DeletionEvent::Started { name, index, total });
            match self.manager.delete(name) {
                Ok(()) => {
                    on_event(DeletionEvent::Deleted { name });
                    report.deleted.push(name.clone());
                }
                Err(error) => {
                    warn!("Failed to delete {}: {}", name, error);
                    on_event(DeletionEvent::Failed { name, error: &error });
                    report.failed.push((name.clone(), error.to_string()));
                }
            }
        }

        let mut unstarred = false;
        for name in &report.deleted {
            unstarred |= self.starred.remove(name);
        }
        if unstarred {
            if let Err(e) = self.starred.save() {
                warn!("Could not save starred models: {}", e);
            }
        }

        self.reclassify_without(&report.deleted);

        info!(
            "Deletion finished: {} deleted, {} failed",
            report.deleted.len(),
            report.failed.len()
        );
        report
    }

    /// Drops `removed` from the record list and classifies the rest again,
    /// so duplicate and family flags reflect the remaining models.
    fn reclassify_without(&mut self, removed: &[String]) {
        let mut usage: HashMap<String, UsageInfo> = HashMap::new();
        let listed: Vec<ListedModel> = std::mem::take(&mut self.records)
            .into_iter()
            .filter(|record| !removed.contains(&record.name))
            .map(|record| {
                if let Some(info) = record.usage {
                    usage.insert(record.name.clone(), info);
                }
                ListedModel {
                    name: record.name,
                    id: record.id,
                    size: record.size,
                    modified: record.modified,
                }
            })
            .collect();

        self.records = analysis::classify_models(listed, |name| usage.remove(name));
        self.sync_flags();
    }

    /// Detail text for one model from the manager.
    pub fn show(&self, name: &str) -> Result<String, ManagerError> {
        self.manager.show(name)
    }

    pub fn manager_available(&self) -> bool {
        self.manager.is_available()
    }
}
