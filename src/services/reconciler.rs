//! Timetable editing session.
//!
//! A `TimetableReconciler` owns one editing session: the baseline snapshot
//! taken when the session opened, the user's draft, the creation contexts of
//! not-yet-persisted blocks and the session's time-slot cache. Saving diffs
//! the draft against the baseline and applies the result through the
//! `TimetableStore` in three phases: creates, then updates, then deletes.
//!
//! A failed storage call aborts the save. Operations that already went
//! through are not rolled back, and the session does not refresh its
//! baseline on its own; call `reload` for that.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{ReconcileError, ReconcileResult};
use crate::models::common::Field;
use crate::models::schedule::{BlockPatch, ClockTime, CreationContext, ScheduleBlock};
use crate::models::timetable::{
    CreateTimetableItemRequest, TimeSlot, TimetableItem, UpdateTimetableItemRequest,
};
use crate::services::diff::{compute_changes, lists_differ, ChangeSet};
use crate::services::time_slots::TimeSlotCache;
use crate::store::TimetableStore;

const LOAD_TIME_SLOTS_FALLBACK: &str = "Failed to load time slots";
const LOAD_ITEMS_FALLBACK: &str = "Failed to load timetable items";
const CREATE_TIME_SLOT_FALLBACK: &str = "Failed to create time slot";
const CREATE_ITEM_FALLBACK: &str = "Failed to create timetable item";
const UPDATE_ITEM_FALLBACK: &str = "Failed to update timetable item";
const DELETE_ITEM_FALLBACK: &str = "Failed to delete timetable item";

/// How the item calls of one save phase are issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    /// One storage call in flight at a time
    #[default]
    Sequential,
    /// Item calls of a phase run together; phases still run in order
    Concurrent,
}

impl FromStr for ApplyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(ApplyMode::Sequential),
            "concurrent" => Ok(ApplyMode::Concurrent),
            other => Err(format!("Unknown apply mode '{}'", other)),
        }
    }
}

impl fmt::Display for ApplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyMode::Sequential => f.write_str("sequential"),
            ApplyMode::Concurrent => f.write_str("concurrent"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcilerOptions {
    pub apply_mode: ApplyMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBlock {
    /// Draft id of the block
    pub block_id: String,
    /// Id storage assigned to the new timetable item
    pub item_id: String,
}

/// What a successful save applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub created: Vec<CreatedBlock>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
    pub time_slots_created: usize,
}

impl SaveReport {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

pub struct TimetableReconciler {
    store: Arc<dyn TimetableStore>,
    timetable_id: String,
    baseline: Vec<ScheduleBlock>,
    draft: Vec<ScheduleBlock>,
    contexts: HashMap<String, CreationContext>,
    time_slots: TimeSlotCache,
    options: ReconcilerOptions,
}

impl TimetableReconciler {
    /// Start a session from an already-loaded baseline. The draft starts as a
    /// copy of the baseline.
    pub fn new(
        store: Arc<dyn TimetableStore>,
        timetable_id: impl Into<String>,
        baseline: Vec<ScheduleBlock>,
        time_slots: Vec<TimeSlot>,
        options: ReconcilerOptions,
    ) -> Self {
        Self {
            store,
            timetable_id: timetable_id.into(),
            draft: baseline.clone(),
            baseline,
            contexts: HashMap::new(),
            time_slots: TimeSlotCache::new(time_slots),
            options,
        }
    }

    /// Start a session by loading the timetable's items and the time slots
    /// from storage.
    pub async fn open(
        store: Arc<dyn TimetableStore>,
        timetable_id: impl Into<String>,
        options: ReconcilerOptions,
    ) -> ReconcileResult<Self> {
        let timetable_id = timetable_id.into();
        let (baseline, time_slots) = load_baseline(store.as_ref(), &timetable_id).await?;
        info!(
            "Opened timetable {} with {} blocks and {} time slots",
            timetable_id,
            baseline.len(),
            time_slots.len()
        );
        Ok(Self::new(store, timetable_id, baseline, time_slots, options))
    }

    /// Refetch the baseline and time slots from storage, discarding the
    /// draft and any creation contexts.
    pub async fn reload(&mut self) -> ReconcileResult<()> {
        let (baseline, time_slots) = load_baseline(self.store.as_ref(), &self.timetable_id).await?;
        info!(
            "Reloaded timetable {}: {} blocks, {} time slots",
            self.timetable_id,
            baseline.len(),
            time_slots.len()
        );
        self.draft = baseline.clone();
        self.baseline = baseline;
        self.time_slots = TimeSlotCache::new(time_slots);
        self.contexts.clear();
        Ok(())
    }

    pub fn timetable_id(&self) -> &str {
        &self.timetable_id
    }

    pub fn baseline(&self) -> &[ScheduleBlock] {
        &self.baseline
    }

    pub fn draft(&self) -> &[ScheduleBlock] {
        &self.draft
    }

    pub fn time_slots(&self) -> &[TimeSlot] {
        self.time_slots.slots()
    }

    pub fn create_context(&self, block_id: &str) -> Option<&CreationContext> {
        self.contexts.get(block_id)
    }

    /// Append a block to the draft. Id uniqueness is the caller's concern.
    pub fn add_block(&mut self, block: ScheduleBlock) {
        debug!("Adding block {} to draft", block.id);
        self.draft.push(block);
    }

    /// Apply `patch` to the draft block with `id`. Returns false, and does
    /// nothing, when no such block exists.
    pub fn update_block(&mut self, id: &str, patch: &BlockPatch) -> bool {
        match self.draft.iter_mut().find(|block| block.id == id) {
            Some(block) => {
                patch.apply_to(block);
                debug!("Updated draft block {}", id);
                true
            }
            None => {
                debug!("Ignoring update for unknown block {}", id);
                false
            }
        }
    }

    /// Remove the draft block with `id`. Returns false when it was absent.
    pub fn delete_block(&mut self, id: &str) -> bool {
        let before = self.draft.len();
        self.draft.retain(|block| block.id != id);
        let removed = self.draft.len() != before;
        if !removed {
            debug!("Ignoring delete for unknown block {}", id);
        }
        removed
    }

    /// Attach the references a new block needs to be created
    pub fn set_create_context(&mut self, block_id: impl Into<String>, context: CreationContext) {
        let block_id = block_id.into();
        debug!("Setting creation context for block {}", block_id);
        self.contexts.insert(block_id, context);
    }

    pub fn has_changes(&self) -> bool {
        lists_differ(&self.baseline, &self.draft)
    }

    pub fn diff(&self) -> ChangeSet {
        compute_changes(&self.baseline, &self.draft)
    }

    /// Id of the stored time slot for `start..end`, creating the slot when
    /// the session has not seen one with exactly those times.
    pub async fn resolve_time_slot_id(
        &mut self,
        start: ClockTime,
        end: ClockTime,
    ) -> ReconcileResult<String> {
        if let Some(slot) = self.time_slots.find(&start, &end) {
            debug!("Reusing time slot {} for {}-{}", slot.id, start, end);
            return Ok(slot.id.clone());
        }

        let request = self.time_slots.new_slot_request(start, end);
        info!(
            "Creating time slot {} ({} minutes, order {})",
            request.name, request.duration, request.order
        );

        let slot = self
            .store
            .create_time_slot(&request)
            .await
            .into_result(CREATE_TIME_SLOT_FALLBACK)
            .map_err(|message| {
                error!("Failed to create time slot {}: {}", request.name, message);
                ReconcileError::TimeSlotCreate {
                    start,
                    end,
                    message,
                }
            })?;

        Ok(self.time_slots.insert(slot))
    }

    /// Diff the draft against the baseline and apply the result.
    ///
    /// Nothing is sent when the diff is empty. Every block to be created
    /// needs a creation context naming its class and teacher; that and the
    /// time ranges are checked before the first storage call.
    pub async fn save_changes(&mut self) -> ReconcileResult<SaveReport> {
        let changes = self.diff();
        if changes.is_empty() {
            info!("No changes to save for timetable {}", self.timetable_id);
            return Ok(SaveReport::default());
        }

        self.validate(&changes)?;

        info!(
            "Saving timetable {} ({} mode): {} creates, {} updates, {} deletes",
            self.timetable_id,
            self.options.apply_mode,
            changes.to_create.len(),
            changes.to_update.len(),
            changes.to_delete.len()
        );

        let slots_before = self.time_slots.len();
        let created = self.apply_creates(&changes.to_create).await?;
        let updated = self.apply_updates(&changes.to_update).await?;
        let deleted = self.apply_deletes(&changes.to_delete).await?;

        let report = SaveReport {
            created,
            updated,
            deleted,
            time_slots_created: self.time_slots.len() - slots_before,
        };
        info!(
            "Saved timetable {}: {} created, {} updated, {} deleted, {} new time slots",
            self.timetable_id,
            report.created.len(),
            report.updated.len(),
            report.deleted.len(),
            report.time_slots_created
        );
        Ok(report)
    }

    fn validate(&self, changes: &ChangeSet) -> ReconcileResult<()> {
        for block in &changes.to_create {
            let context = self.contexts.get(&block.id).ok_or_else(|| {
                ReconcileError::MissingCreateContext {
                    block_id: block.id.clone(),
                }
            })?;
            context.required_refs(&block.id)?;
            block.validate_time_range()?;
        }
        for block in &changes.to_update {
            block.validate_time_range()?;
        }
        Ok(())
    }

    async fn prepare_create(
        &mut self,
        block: &ScheduleBlock,
    ) -> ReconcileResult<CreateTimetableItemRequest> {
        let context = self.contexts.get(&block.id).cloned().ok_or_else(|| {
            ReconcileError::MissingCreateContext {
                block_id: block.id.clone(),
            }
        })?;
        let (class_id, teacher_id) = context.required_refs(&block.id)?;
        let (class_id, teacher_id) = (class_id.to_string(), teacher_id.to_string());

        let time_slot_id = self
            .resolve_time_slot_id(block.start_time, block.end_time)
            .await?;

        Ok(CreateTimetableItemRequest {
            timetable_id: self.timetable_id.clone(),
            class_id,
            teacher_id,
            room_id: Field::nullable(context.room_id),
            day_of_week: block.day_of_week,
            time_slot_id,
            start_date: context.start_date,
            end_date: Field::nullable(context.end_date),
            notes: Field::nullable(block.notes.clone()),
            is_recurring: false,
        })
    }

    async fn prepare_update(
        &mut self,
        block: &ScheduleBlock,
    ) -> ReconcileResult<UpdateTimetableItemRequest> {
        let time_slot_id = self
            .resolve_time_slot_id(block.start_time, block.end_time)
            .await?;

        let had_notes = self
            .baseline
            .iter()
            .any(|original| original.id == block.id && original.notes.is_some());
        let notes = match &block.notes {
            Some(notes) => Field::Value(notes.clone()),
            None if had_notes => Field::Null,
            None => Field::Absent,
        };

        Ok(UpdateTimetableItemRequest {
            day_of_week: block.day_of_week,
            time_slot_id,
            notes,
        })
    }

    async fn apply_creates(&mut self, blocks: &[ScheduleBlock]) -> ReconcileResult<Vec<CreatedBlock>> {
        match self.options.apply_mode {
            ApplyMode::Sequential => {
                let mut created = Vec::with_capacity(blocks.len());
                for block in blocks {
                    let request = self.prepare_create(block).await?;
                    created.push(create_item(self.store.as_ref(), block, &request).await?);
                }
                Ok(created)
            }
            ApplyMode::Concurrent => {
                let mut requests = Vec::with_capacity(blocks.len());
                for block in blocks {
                    requests.push(self.prepare_create(block).await?);
                }
                let store = self.store.as_ref();
                let results = join_all(
                    blocks
                        .iter()
                        .zip(&requests)
                        .map(|(block, request)| create_item(store, block, request)),
                )
                .await;
                settle("create", results)
            }
        }
    }

    async fn apply_updates(&mut self, blocks: &[ScheduleBlock]) -> ReconcileResult<Vec<String>> {
        match self.options.apply_mode {
            ApplyMode::Sequential => {
                let mut updated = Vec::with_capacity(blocks.len());
                for block in blocks {
                    let request = self.prepare_update(block).await?;
                    updated.push(update_item(self.store.as_ref(), block, &request).await?);
                }
                Ok(updated)
            }
            ApplyMode::Concurrent => {
                let mut requests = Vec::with_capacity(blocks.len());
                for block in blocks {
                    requests.push(self.prepare_update(block).await?);
                }
                let store = self.store.as_ref();
                let results = join_all(
                    blocks
                        .iter()
                        .zip(&requests)
                        .map(|(block, request)| update_item(store, block, request)),
                )
                .await;
                settle("update", results)
            }
        }
    }

    async fn apply_deletes(&self, blocks: &[ScheduleBlock]) -> ReconcileResult<Vec<String>> {
        let store = self.store.as_ref();
        match self.options.apply_mode {
            ApplyMode::Sequential => {
                let mut deleted = Vec::with_capacity(blocks.len());
                for block in blocks {
                    deleted.push(delete_item(store, block).await?);
                }
                Ok(deleted)
            }
            ApplyMode::Concurrent => {
                let results = join_all(blocks.iter().map(|block| delete_item(store, block))).await;
                settle("delete", results)
            }
        }
    }
}

async fn load_baseline(
    store: &dyn TimetableStore,
    timetable_id: &str,
) -> ReconcileResult<(Vec<ScheduleBlock>, Vec<TimeSlot>)> {
    let time_slots = store
        .get_all_time_slots()
        .await
        .into_result(LOAD_TIME_SLOTS_FALLBACK)
        .map_err(|message| {
            error!("Failed to load time slots: {}", message);
            ReconcileError::TimeSlotLoad { message }
        })?;

    let items = store
        .list_timetable_items(timetable_id)
        .await
        .into_result(LOAD_ITEMS_FALLBACK)
        .map_err(|message| {
            error!("Failed to load items for timetable {}: {}", timetable_id, message);
            ReconcileError::ItemLoad { message }
        })?;

    let blocks = items
        .into_iter()
        .filter_map(|item| {
            let block = block_from_item(&item, &time_slots);
            if block.is_none() {
                warn!(
                    "Skipping timetable item {}: unknown time slot {}",
                    item.id, item.time_slot_id
                );
            }
            block
        })
        .collect();

    Ok((blocks, time_slots))
}

fn block_from_item(item: &TimetableItem, time_slots: &[TimeSlot]) -> Option<ScheduleBlock> {
    let slot = time_slots.iter().find(|slot| slot.id == item.time_slot_id)?;
    Some(ScheduleBlock {
        id: item.id.clone(),
        day_of_week: item.day_of_week,
        start_time: slot.start_time,
        end_time: slot.end_time,
        notes: item.notes.clone(),
    })
}

async fn create_item(
    store: &dyn TimetableStore,
    block: &ScheduleBlock,
    request: &CreateTimetableItemRequest,
) -> ReconcileResult<CreatedBlock> {
    debug!(
        "Creating timetable item for block {} ({} {}-{})",
        block.id, block.day_of_week, block.start_time, block.end_time
    );
    let item = store
        .create_timetable_item(request)
        .await
        .into_result(CREATE_ITEM_FALLBACK)
        .map_err(|message| ReconcileError::ItemCreate {
            block_id: block.id.clone(),
            message,
        })?;
    info!("Created timetable item {} for block {}", item.id, block.id);
    Ok(CreatedBlock {
        block_id: block.id.clone(),
        item_id: item.id,
    })
}

async fn update_item(
    store: &dyn TimetableStore,
    block: &ScheduleBlock,
    request: &UpdateTimetableItemRequest,
) -> ReconcileResult<String> {
    debug!("Updating timetable item {}", block.id);
    store
        .update_timetable_item(&block.id, request)
        .await
        .into_result(UPDATE_ITEM_FALLBACK)
        .map_err(|message| ReconcileError::ItemUpdate {
            block_id: block.id.clone(),
            message,
        })?;
    info!("Updated timetable item {}", block.id);
    Ok(block.id.clone())
}

async fn delete_item(store: &dyn TimetableStore, block: &ScheduleBlock) -> ReconcileResult<String> {
    debug!("Deleting timetable item {}", block.id);
    store
        .delete_timetable_item(&block.id)
        .await
        .into_unit(DELETE_ITEM_FALLBACK)
        .map_err(|message| ReconcileError::ItemDelete {
            block_id: block.id.clone(),
            message,
        })?;
    info!("Deleted timetable item {}", block.id);
    Ok(block.id.clone())
}

/// Collect the outcome of a concurrent phase. Every failure is logged; the
/// first one in list order is returned.
fn settle<T>(phase: &str, results: Vec<ReconcileResult<T>>) -> ReconcileResult<Vec<T>> {
    let mut done = Vec::with_capacity(results.len());
    let mut first_error = None;
    for result in results {
        match result {
            Ok(value) => done.push(value),
            Err(e) => {
                error!("Timetable {} failed: {}", phase, e);
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(done),
    }
}
