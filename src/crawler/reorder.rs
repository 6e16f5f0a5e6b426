use std::collections::BTreeMap;

/// Releases items in sequence order
///
/// Items arrive tagged with the dense discovery sequence of their entry and
/// are held back until every lower sequence has been released.
#[derive(Debug)]
pub(crate) struct ReorderBuffer<T> {
    next: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> ReorderBuffer<T> {
    pub fn new() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Adds an item and returns everything that is now in order
    pub fn push(&mut self, sequence: u64, item: T) -> Vec<T> {
        self.pending.insert(sequence, item);

        let mut ready = Vec::new();
        while let Some(item) = self.pending.remove(&self.next) {
            ready.push(item);
            self.next += 1;
        }
        ready
    }

    /// Releases everything still held, in sequence order, skipping gaps
    pub fn drain(&mut self) -> Vec<T> {
        let pending = std::mem::take(&mut self.pending);
        if let Some(last) = pending.keys().next_back() {
            self.next = last + 1;
        }
        pending.into_values().collect()
    }

    #[cfg(test)]
    pub fn held(&self) -> usize {
        self.pending.len()
    }
}
