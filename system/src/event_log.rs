use crate::types::{ConnectionId, Entry, GroupId};

/// Append-only ordered sequence of canvas entries.
///
/// Entries are never reordered: they are appended at the end, or removed as
/// whole units by undo and clear.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Vec<Entry>,
}

/// What a successful undo took out of the log.
#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    pub group_id: Option<GroupId>,
    pub removed: usize,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn append(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// Removes the author's most recent entry together with its whole group.
    ///
    /// Group members are matched by group id alone, wherever they sit in the
    /// log and whoever wrote them.
    pub fn remove_last_by_author(&mut self, author_id: &ConnectionId) -> Option<Removal> {
        let index = self
            .entries
            .iter()
            .rposition(|entry| &entry.author_id == author_id)?;

        match self.entries[index].group_id.clone() {
            Some(group_id) => {
                let before = self.entries.len();
                self.entries
                    .retain(|entry| entry.group_id.as_ref() != Some(&group_id));
                Some(Removal {
                    removed: before - self.entries.len(),
                    group_id: Some(group_id),
                })
            }
            None => {
                self.entries.remove(index);
                Some(Removal {
                    group_id: None,
                    removed: 1,
                })
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn snapshot(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }
}
