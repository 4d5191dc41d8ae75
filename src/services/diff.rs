use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::models::schedule::ScheduleBlock;

/// Persistence operations needed to bring storage in line with a draft.
///
/// The three lists are disjoint by block id. `to_create` and `to_update`
/// follow draft order, `to_delete` follows baseline order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub to_create: Vec<ScheduleBlock>,
    pub to_update: Vec<ScheduleBlock>,
    pub to_delete: Vec<ScheduleBlock>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len()
    }
}

/// Compare a draft against the baseline snapshot, keyed by block id.
pub fn compute_changes(baseline: &[ScheduleBlock], draft: &[ScheduleBlock]) -> ChangeSet {
    let baseline_by_id: HashMap<&str, &ScheduleBlock> =
        baseline.iter().map(|b| (b.id.as_str(), b)).collect();
    let draft_by_id: HashMap<&str, &ScheduleBlock> =
        draft.iter().map(|b| (b.id.as_str(), b)).collect();

    let mut changes = ChangeSet::default();

    // A repeated id keeps its first position and its last value.
    let mut seen = HashSet::new();
    for id in draft.iter().map(|b| b.id.as_str()) {
        if !seen.insert(id) {
            continue;
        }
        let block = draft_by_id[id];
        match baseline_by_id.get(id) {
            None => changes.to_create.push(block.clone()),
            Some(original) if original.canonical() != block.canonical() => {
                changes.to_update.push(block.clone())
            }
            Some(_) => {}
        }
    }

    let mut seen = HashSet::new();
    for id in baseline.iter().map(|b| b.id.as_str()) {
        if seen.insert(id) && !draft_by_id.contains_key(id) {
            changes.to_delete.push(baseline_by_id[id].clone());
        }
    }

    debug!(
        "Computed changes: {} to create, {} to update, {} to delete",
        changes.to_create.len(),
        changes.to_update.len(),
        changes.to_delete.len()
    );

    changes
}

/// Order-insensitive equality of two block lists via their canonical form
pub fn lists_differ(baseline: &[ScheduleBlock], draft: &[ScheduleBlock]) -> bool {
    canonical_list(baseline) != canonical_list(draft)
}

fn canonical_list(blocks: &[ScheduleBlock]) -> Vec<String> {
    let mut sorted: Vec<&ScheduleBlock> = blocks.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    sorted.into_iter().map(ScheduleBlock::canonical).collect()
}
