//! Instantiation queue (spec §4.5.1, glossary "instantiation queue").
//!
//! Near-direct port of
//! `examples/original_source/src/InstantiationQueue.h`: the status enum,
//! the `(template_name, args)` key, and the pending/in-progress/completed/
//! failed bookkeeping, reshaped from manual hash-combining into
//! `HashMap`/`HashSet` over a `#[derive(Hash)]` key.

use std::collections::{HashMap, HashSet};

use cxxfe_ast::{StringHandle, TypeIndex};

use crate::types::registry::TemplateArgRecord;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstantiationKey {
    pub template_name: StringHandle,
    pub args: Vec<TemplateArgRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointOfInstantiation {
    pub file_index: u32,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone)]
pub enum InstantiationStatus {
    Pending,
    InProgress,
    Complete(TypeIndex),
    Failed(String),
}

#[derive(Debug, Default, Clone, Copy)]
pub struct QueueStatistics {
    pub pending_count: usize,
    pub in_progress_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
}

#[derive(Default)]
pub struct InstantiationQueue {
    pending: Vec<(InstantiationKey, PointOfInstantiation)>,
    in_progress: HashSet<InstantiationKey>,
    completed: HashMap<InstantiationKey, TypeIndex>,
    failed: HashMap<InstantiationKey, String>,
}

impl InstantiationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skips enqueueing if the key is already tracked anywhere (spec
    /// §4.5.1 "enqueue skips if already tracked").
    pub fn enqueue(&mut self, key: InstantiationKey, poi: PointOfInstantiation) {
        if self.completed.contains_key(&key) || self.in_progress.contains(&key) || self.failed.contains_key(&key) {
            return;
        }
        if self.pending.iter().any(|(k, _)| k == &key) {
            return;
        }
        self.pending.push((key, poi));
    }

    pub fn status(&self, key: &InstantiationKey) -> Option<InstantiationStatus> {
        if let Some(idx) = self.completed.get(key) {
            return Some(InstantiationStatus::Complete(*idx));
        }
        if let Some(msg) = self.failed.get(key) {
            return Some(InstantiationStatus::Failed(msg.clone()));
        }
        if self.in_progress.contains(key) {
            return Some(InstantiationStatus::InProgress);
        }
        if self.pending.iter().any(|(k, _)| k == key) {
            return Some(InstantiationStatus::Pending);
        }
        None
    }

    pub fn result(&self, key: &InstantiationKey) -> Option<TypeIndex> {
        self.completed.get(key).copied()
    }

    /// Returns `false` on a cycle (spec §4.5.1/§4.5.4 step 2).
    #[must_use]
    pub fn mark_in_progress(&mut self, key: InstantiationKey) -> bool {
        if self.in_progress.contains(&key) {
            return false;
        }
        self.in_progress.insert(key);
        true
    }

    pub fn mark_complete(&mut self, key: &InstantiationKey, result: TypeIndex) {
        self.in_progress.remove(key);
        self.completed.insert(key.clone(), result);
        self.pending.retain(|(k, _)| k != key);
    }

    pub fn mark_failed(&mut self, key: &InstantiationKey, message: String) {
        self.in_progress.remove(key);
        self.failed.insert(key.clone(), message);
        self.pending.retain(|(k, _)| k != key);
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn stats(&self) -> QueueStatistics {
        QueueStatistics {
            pending_count: self.pending.len(),
            in_progress_count: self.in_progress.len(),
            completed_count: self.completed.len(),
            failed_count: self.failed.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poi() -> PointOfInstantiation {
        PointOfInstantiation { file_index: 0, line: 1, column: 1 }
    }

    fn key(n: u32) -> InstantiationKey {
        InstantiationKey {
            template_name: StringHandle(n),
            args: vec![TemplateArgRecord::Value(n as i64)],
        }
    }

    #[test]
    fn cycle_detection_rejects_a_second_in_progress_mark() {
        let mut queue = InstantiationQueue::new();
        let k = key(1);
        assert!(queue.mark_in_progress(k.clone()));
        assert!(!queue.mark_in_progress(k));
    }

    #[test]
    fn completing_removes_from_pending_and_caches_the_result() {
        let mut queue = InstantiationQueue::new();
        let k = key(2);
        queue.enqueue(k.clone(), poi());
        assert!(queue.has_pending());
        queue.mark_in_progress(k.clone());
        queue.mark_complete(&k, TypeIndex(7));
        assert!(!queue.has_pending());
        assert_eq!(queue.result(&k), Some(TypeIndex(7)));
        assert_eq!(queue.stats().completed_count, 1);
    }

    #[test]
    fn enqueue_is_idempotent_once_completed() {
        let mut queue = InstantiationQueue::new();
        let k = key(3);
        queue.mark_in_progress(k.clone());
        queue.mark_complete(&k, TypeIndex(1));
        queue.enqueue(k.clone(), poi());
        assert_eq!(queue.stats().pending_count, 0);
    }
}
