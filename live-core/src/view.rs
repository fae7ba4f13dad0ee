use std::sync::Arc;

use tokio::sync::RwLock;

use crate::item::Item;

/// Ordered newest-first sequence of rows; notices are kept ahead of the
/// regular rows and do not count towards [`LocalView::max_len`].
#[derive(Debug, Clone)]
pub struct LocalView {
    collection: String,
    items: Vec<Item>,
    max_len: usize,
}

pub type SharedView = Arc<RwLock<LocalView>>;

impl LocalView {
    pub fn new(collection: impl Into<String>, max_len: usize) -> Self {
        Self {
            collection: collection.into(),
            items: Vec::new(),
            max_len,
        }
    }

    pub fn shared(self) -> SharedView {
        Arc::new(RwLock::new(self))
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn set_max_len(&mut self, max_len: usize) {
        self.max_len = max_len;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Rows subject to the length cap.
    pub fn regular_len(&self) -> usize {
        self.items.iter().filter(|item| !item.is_notice).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    pub fn ids(&self) -> Vec<u64> {
        self.items.iter().map(|item| item.id).collect()
    }

    pub fn get(&self, id: u64) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.get(id).is_some()
    }

    pub fn set_checked(&mut self, id: u64, checked: bool) -> bool {
        match self.get_mut(id) {
            Some(item) => {
                item.is_checked = checked;
                true
            }
            None => false,
        }
    }

    pub fn set_open(&mut self, id: u64, open: bool) -> bool {
        match self.get_mut(id) {
            Some(item) => {
                item.is_open = open;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: u64) -> Option<Item> {
        let idx = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(idx))
    }

    /// Replaces the contents with the rows of an initially rendered page.
    /// Duplicate ids keep their first occurrence.
    pub fn seed(&mut self, items: impl IntoIterator<Item = Item>) {
        self.items.clear();
        for item in items {
            if !self.contains(item.id) {
                self.items.push(item);
            }
        }
        self.items.sort_by_key(|item| !item.is_notice);
    }

    /// Inserts rows at the front of the regular section, keeping their order.
    pub(crate) fn prepend(&mut self, items: Vec<Item>) {
        let at = self.items.iter().take_while(|item| item.is_notice).count();
        self.items.splice(at..at, items);
    }

    /// Removes the last regular row.
    pub(crate) fn pop_regular(&mut self) -> Option<Item> {
        let idx = self.items.iter().rposition(|item| !item.is_notice)?;
        Some(self.items.remove(idx))
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<Item> {
        &mut self.items
    }
}
