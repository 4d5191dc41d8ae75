#[cfg(test)]
mod workflow_tests {
    use std::sync::Arc;

    use crate::models::common::Field;
    use crate::models::schedule::{BlockPatch, DayOfWeek};
    use crate::models::timetable::TimetableItem;
    use crate::services::reconciler::{ApplyMode, ReconcilerOptions, TimetableReconciler};
    use crate::store::MemoryTimetableStore;
    use crate::tests::common::fixtures::{block, context, item, slot, time, TIMETABLE_ID};

    fn school_store() -> Arc<MemoryTimetableStore> {
        let mut other = item("other_1", DayOfWeek::Monday, "slot_1");
        other.timetable_id = "timetable_2".to_string();

        Arc::new(MemoryTimetableStore::with_data(
            vec![
                item("item_a", DayOfWeek::Monday, "slot_1"),
                item("item_b", DayOfWeek::Tuesday, "slot_2"),
                other,
            ],
            vec![
                slot("slot_1", "09:00", "10:00"),
                slot("slot_2", "10:00", "11:00"),
            ],
        ))
    }

    fn items_of(store: &MemoryTimetableStore, timetable_id: &str) -> Vec<TimetableItem> {
        store
            .items()
            .into_iter()
            .filter(|item| item.timetable_id == timetable_id)
            .collect()
    }

    fn options(apply_mode: ApplyMode) -> ReconcilerOptions {
        ReconcilerOptions { apply_mode }
    }

    #[tokio::test]
    async fn test_two_editing_rounds_reuse_created_slot() {
        let store = school_store();
        let mut reconciler =
            TimetableReconciler::open(store.clone(), TIMETABLE_ID, ReconcilerOptions::default())
                .await
                .unwrap();

        // round one: a new afternoon block needs a new slot
        reconciler.add_block(block("draft_1", DayOfWeek::Wednesday, "14:00", "15:30"));
        reconciler.set_create_context("draft_1", context());
        let report = reconciler.save_changes().await.unwrap();
        assert_eq!(report.time_slots_created, 1);
        assert_eq!(report.created.len(), 1);
        let new_item_id = report.created[0].item_id.clone();

        reconciler.reload().await.unwrap();
        assert!(!reconciler.has_changes());
        assert!(reconciler.baseline().iter().any(|b| b.id == new_item_id));

        // round two: move an existing block into the slot created above
        assert!(reconciler.update_block(
            "item_b",
            &BlockPatch {
                day_of_week: Some(DayOfWeek::Thursday),
                start_time: Some(time("14:00")),
                end_time: Some(time("15:30")),
                notes: Field::Value("Moved".to_string()),
            },
        ));
        let report = reconciler.save_changes().await.unwrap();
        assert_eq!(report.time_slots_created, 0);
        assert_eq!(report.updated, vec!["item_b".to_string()]);

        let created_slot = store.item(&new_item_id).unwrap().time_slot_id;
        let moved = store.item("item_b").unwrap();
        assert_eq!(moved.time_slot_id, created_slot);
        assert_eq!(moved.day_of_week, DayOfWeek::Thursday);
        assert_eq!(moved.notes.as_deref(), Some("Moved"));
        assert_eq!(store.time_slots().len(), 3);
    }

    #[tokio::test]
    async fn test_saving_leaves_other_timetables_untouched() {
        let store = school_store();
        let mut reconciler =
            TimetableReconciler::open(store.clone(), TIMETABLE_ID, ReconcilerOptions::default())
                .await
                .unwrap();
        assert_eq!(reconciler.baseline().len(), 2);

        reconciler.delete_block("item_a");
        reconciler.delete_block("item_b");
        let report = reconciler.save_changes().await.unwrap();
        assert_eq!(report.deleted.len(), 2);

        assert!(items_of(&store, TIMETABLE_ID).is_empty());
        let others = items_of(&store, "timetable_2");
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].id, "other_1");
    }

    #[tokio::test]
    async fn test_apply_modes_reach_the_same_state() {
        let mut results = Vec::new();

        for mode in [ApplyMode::Sequential, ApplyMode::Concurrent] {
            let store = school_store();
            let mut reconciler =
                TimetableReconciler::open(store.clone(), TIMETABLE_ID, options(mode))
                    .await
                    .unwrap();

            reconciler.add_block(block("draft_1", DayOfWeek::Friday, "13:00", "14:00"));
            reconciler.add_block(block("draft_2", DayOfWeek::Friday, "13:00", "14:00"));
            reconciler.set_create_context("draft_1", context());
            reconciler.set_create_context("draft_2", context().with_room("r2"));
            reconciler.update_block(
                "item_a",
                &BlockPatch {
                    end_time: Some(time("10:30")),
                    ..Default::default()
                },
            );
            reconciler.delete_block("item_b");

            let report = reconciler.save_changes().await.unwrap();
            assert_eq!(report.created.len(), 2, "mode {}", mode);
            assert_eq!(report.deleted, vec!["item_b".to_string()]);
            // two distinct time pairs were missing: 13:00-14:00 and 09:00-10:30
            assert_eq!(report.time_slots_created, 2, "mode {}", mode);

            reconciler.reload().await.unwrap();
            let mut shape: Vec<String> = reconciler
                .baseline()
                .iter()
                .map(|b| format!("{} {}-{}", b.day_of_week, b.start_time, b.end_time))
                .collect();
            shape.sort();
            results.push(shape);
        }

        assert_eq!(results[0], results[1]);
        assert_eq!(
            results[0],
            vec![
                "friday 13:00-14:00".to_string(),
                "friday 13:00-14:00".to_string(),
                "monday 09:00-10:30".to_string(),
            ]
        );
    }
}
