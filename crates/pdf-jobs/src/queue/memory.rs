//! In-process work queue

use parking_lot::Mutex;
use std::collections::VecDeque;

use super::{QueueDiscipline, WorkQueue};
use crate::error::Result;

/// Named list held in memory; entries are lost on restart
pub struct MemoryQueue {
    key: String,
    discipline: QueueDiscipline,
    entries: Mutex<VecDeque<String>>,
}

impl MemoryQueue {
    pub fn new(key: impl Into<String>, discipline: QueueDiscipline) -> Self {
        Self {
            key: key.into(),
            discipline,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Copy of the current entries, head first
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.lock().iter().cloned().collect()
    }
}

impl WorkQueue for MemoryQueue {
    fn push(&self, entry: &str) -> Result<()> {
        self.entries.lock().push_front(entry.to_string());
        Ok(())
    }

    fn pop(&self) -> Result<Option<String>> {
        let mut entries = self.entries.lock();
        Ok(match self.discipline {
            QueueDiscipline::Fifo => entries.pop_back(),
            QueueDiscipline::Lifo => entries.pop_front(),
        })
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.lock().len())
    }

    fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn key(&self) -> &str {
        &self.key
    }
}
