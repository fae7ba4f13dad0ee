use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::item::FieldGroup;

/// What a reconciliation pass changed in the view, for the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeSet {
    pub collection: String,
    pub inserted: Vec<u64>,
    pub updated: Vec<(u64, Vec<FieldGroup>)>,
    pub deleted: Vec<u64>,
    pub removed: Vec<u64>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty()
            && self.updated.is_empty()
            && self.deleted.is_empty()
            && self.removed.is_empty()
    }
}

/// Presentation collaborator. Rendering and markup stay on its side.
pub trait ViewObserver: Send + Sync {
    fn set_loading(&self, _collection: &str, _item: u64, _loading: bool) {}
    fn apply(&self, _changes: &ChangeSet) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ViewObserver for NullObserver {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub link: String,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        info!(
            title = %notification.title,
            link = %notification.link,
            "notification rule matched"
        );
    }
}

/// Sets the loading indicator of a row and clears it when dropped.
pub struct LoadingGuard<'a> {
    observer: &'a dyn ViewObserver,
    collection: &'a str,
    item: u64,
}

impl<'a> LoadingGuard<'a> {
    pub fn acquire(observer: &'a dyn ViewObserver, collection: &'a str, item: u64) -> Self {
        observer.set_loading(collection, item, true);
        Self {
            observer,
            collection,
            item,
        }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.observer.set_loading(self.collection, self.item, false);
    }
}

pub type SharedObserver = Arc<dyn ViewObserver>;
pub type SharedNotifier = Arc<dyn Notifier>;
