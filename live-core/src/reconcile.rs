use std::collections::HashSet;

use tracing::debug;

use crate::cache::ContentCache;
use crate::item::{Item, RemoteItem};
use crate::observer::ChangeSet;
use crate::view::LocalView;

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Rows new to the view whose detail content is not cached yet.
    pub inserted_ids: Vec<u64>,
    pub changes: ChangeSet,
}

/// Merges a freshly polled remote list into a [`LocalView`].
pub struct ListReconciler<'a> {
    cache: &'a ContentCache,
    current_item: Option<u64>,
}

impl<'a> ListReconciler<'a> {
    pub fn new(cache: &'a ContentCache) -> Self {
        Self {
            cache,
            current_item: None,
        }
    }

    /// Excludes the item the caller is currently viewing from every pass.
    pub fn excluding(mut self, current_item: Option<u64>) -> Self {
        self.current_item = current_item;
        self
    }

    pub async fn reconcile(&self, view: &mut LocalView, remote: &[RemoteItem]) -> Reconciliation {
        let collection = view.collection().to_owned();
        let mut changes = ChangeSet {
            collection: collection.clone(),
            ..ChangeSet::default()
        };
        let mut inserted_ids = Vec::new();

        // The marker only lives for the pass that inserted the row.
        for item in view.items_mut().iter_mut() {
            item.is_newly_inserted = false;
        }

        let max_len = view.max_len();
        let mut polled: Vec<u64> = Vec::with_capacity(remote.len());
        let mut fresh_rows: Vec<Item> = Vec::new();
        for entry in remote {
            if entry.icon().is_excluded_from_list() {
                continue;
            }
            let Some(id) = entry.id else {
                debug!(collection = %collection, "skipping remote entry without id");
                continue;
            };
            if Some(id) == self.current_item || polled.contains(&id) {
                continue;
            }
            polled.push(id);
            // Entries past the cap would be trimmed in this pass and come
            // back as new in the next one.
            if polled.len() > max_len {
                continue;
            }

            if let Some(existing) = view.get_mut(id) {
                existing.is_marked_deleted = false;
                let groups = existing.fields.differing_groups(&entry.fields);
                if !groups.is_empty() {
                    existing.fields.overwrite(&entry.fields, &groups);
                    changes.updated.push((id, groups));
                }
                continue;
            }

            let cached = self.cache.has(&collection, id).await;
            let mut row = Item::new(&collection, id, entry.fields.clone());
            row.is_newly_inserted = true;
            row.detail_available = cached;
            fresh_rows.push(row);
            changes.inserted.push(id);
            if !cached {
                inserted_ids.push(id);
            }
        }
        let fresh_ids: HashSet<u64> = fresh_rows.iter().map(|row| row.id).collect();
        view.prepend(fresh_rows);

        while view.regular_len() > view.max_len() {
            match view.pop_regular() {
                Some(trimmed) => changes.removed.push(trimmed.id),
                None => break,
            }
        }
        // Rows trimmed in the same pass they arrived are never reported.
        inserted_ids.retain(|id| view.contains(*id));
        changes.inserted.retain(|id| view.contains(*id));
        changes.removed.retain(|id| !fresh_ids.contains(id));

        let window = polled.len().min(max_len);
        self.detect_deletions(view, &polled, window, &mut changes);

        debug!(
            collection = %collection,
            inserted = changes.inserted.len(),
            updated = changes.updated.len(),
            deleted = changes.deleted.len(),
            removed = changes.removed.len(),
            "list reconciled"
        );
        Reconciliation {
            inserted_ids,
            changes,
        }
    }

    /// Walks the first `window` regular rows and marks the ones missing from
    /// the poll. Promotional rows are dropped from the view instead.
    fn detect_deletions(
        &self,
        view: &mut LocalView,
        polled: &[u64],
        window: usize,
        changes: &mut ChangeSet,
    ) {
        let polled: HashSet<u64> = polled.iter().copied().collect();
        let window: Vec<u64> = view
            .iter()
            .filter(|item| !item.is_notice)
            .take(window)
            .map(|item| item.id)
            .collect();

        for id in window {
            let Some(item) = view.get_mut(id) else {
                continue;
            };
            if item.is_newly_inserted || item.is_marked_deleted {
                continue;
            }
            if item.fields.title.icon.is_promotional() {
                view.remove(id);
                changes.removed.push(id);
                continue;
            }
            if !polled.contains(&id) {
                item.is_marked_deleted = true;
                item.is_checked = false;
                changes.deleted.push(id);
            }
        }
    }
}
