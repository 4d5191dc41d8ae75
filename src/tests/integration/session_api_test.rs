#[cfg(test)]
mod session_api_tests {
    use axum::http::StatusCode;
    use axum_test::{TestServer, TestServerConfig};
    use serde_json::{json, Value};
    use std::sync::Arc;

    use crate::handlers::api::{AppState, ChangesView, SessionView};
    use crate::models::common::StoreResponse;
    use crate::models::schedule::DayOfWeek;
    use crate::routes::create_router;
    use crate::services::reconciler::ReconcilerOptions;
    use crate::store::{MemoryTimetableStore, MockTimetableStore, TimetableStore};
    use crate::tests::common::fixtures::{item, slot, time, TIMETABLE_ID};

    fn seeded_store() -> Arc<MemoryTimetableStore> {
        Arc::new(MemoryTimetableStore::with_data(
            vec![
                item("item_a", DayOfWeek::Monday, "slot_1"),
                item("item_b", DayOfWeek::Tuesday, "slot_2"),
            ],
            vec![
                slot("slot_1", "09:00", "10:00"),
                slot("slot_2", "10:00", "11:00"),
            ],
        ))
    }

    fn setup_test_server(store: Arc<dyn TimetableStore>, refresh_after_save: bool) -> TestServer {
        let app_state = Arc::new(AppState::new(
            store,
            ReconcilerOptions::default(),
            refresh_after_save,
        ));
        let config = TestServerConfig::builder().mock_transport().build();
        TestServer::new_with_config(create_router(app_state), config).unwrap()
    }

    async fn open_session(server: &TestServer) -> String {
        let response = server
            .post("/sessions")
            .json(&json!({ "timetableId": TIMETABLE_ID }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<SessionView>().session_id
    }

    fn block_ids(view: &SessionView) -> Vec<&str> {
        view.blocks.iter().map(|b| b.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = setup_test_server(seeded_store(), true);
        let response = server.get("/health").await;
        response.assert_status_ok();
        response.assert_text("OK");
    }

    #[tokio::test]
    async fn test_open_session_loads_baseline() {
        let server = setup_test_server(seeded_store(), true);

        let response = server
            .post("/sessions")
            .json(&json!({ "timetableId": TIMETABLE_ID }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let view = response.json::<SessionView>();
        assert!(!view.session_id.is_empty());
        assert_eq!(view.timetable_id, TIMETABLE_ID);
        assert_eq!(block_ids(&view), vec!["item_a", "item_b"]);
        assert_eq!(view.blocks[1].start_time, time("10:00"));
        assert!(!view.has_changes);

        let fetched = server
            .get(&format!("/sessions/{}", view.session_id))
            .await
            .json::<SessionView>();
        assert_eq!(block_ids(&fetched), vec!["item_a", "item_b"]);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let server = setup_test_server(seeded_store(), true);

        let response = server.get("/sessions/session-missing").await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body = response.json::<Value>();
        assert_eq!(body["code"], "NOT_FOUND");

        server
            .post("/sessions/session-missing/save")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_open_session_storage_failure_is_bad_gateway() {
        let mut mock_store = MockTimetableStore::new();
        mock_store
            .expect_get_all_time_slots()
            .returning(|| StoreResponse::failure("storage offline"));
        let server = setup_test_server(Arc::new(mock_store), true);

        let response = server
            .post("/sessions")
            .json(&json!({ "timetableId": TIMETABLE_ID }))
            .await;
        response.assert_status(StatusCode::BAD_GATEWAY);
        let body = response.json::<Value>();
        assert_eq!(body["code"], "TIME_SLOT_LOAD_FAILED");
        assert!(body["message"].as_str().unwrap().contains("storage offline"));
    }

    #[tokio::test]
    async fn test_draft_edits_and_changes() {
        let server = setup_test_server(seeded_store(), true);
        let session_id = open_session(&server).await;

        let added = server
            .post(&format!("/sessions/{}/blocks", session_id))
            .json(&json!({
                "id": "draft_1",
                "dayOfWeek": "wednesday",
                "startTime": "14:00",
                "endTime": "15:30",
                "notes": "Lab"
            }))
            .await;
        added.assert_status(StatusCode::CREATED);
        assert!(added.json::<SessionView>().has_changes);

        let patched = server
            .patch(&format!("/sessions/{}/blocks/item_a", session_id))
            .json(&json!({ "startTime": "10:00", "endTime": "11:00" }))
            .await;
        patched.assert_status_ok();
        let view = patched.json::<SessionView>();
        assert_eq!(view.blocks[0].start_time, time("10:00"));

        server
            .delete(&format!("/sessions/{}/blocks/item_b", session_id))
            .await
            .assert_status_ok();

        let changes = server
            .get(&format!("/sessions/{}/changes", session_id))
            .await
            .json::<ChangesView>();
        assert!(changes.has_changes);
        assert_eq!(changes.to_create, vec!["draft_1"]);
        assert_eq!(changes.to_update, vec!["item_a"]);
        assert_eq!(changes.to_delete, vec!["item_b"]);
    }

    #[tokio::test]
    async fn test_unknown_block_edits_are_ignored() {
        let server = setup_test_server(seeded_store(), true);
        let session_id = open_session(&server).await;

        let patched = server
            .patch(&format!("/sessions/{}/blocks/ghost", session_id))
            .json(&json!({ "dayOfWeek": "friday" }))
            .await;
        patched.assert_status_ok();
        assert!(!patched.json::<SessionView>().has_changes);

        let deleted = server
            .delete(&format!("/sessions/{}/blocks/ghost", session_id))
            .await;
        deleted.assert_status_ok();
        let view = deleted.json::<SessionView>();
        assert!(!view.has_changes);
        assert_eq!(view.blocks.len(), 2);
    }

    #[tokio::test]
    async fn test_save_without_context_is_rejected_before_storage() {
        let store = seeded_store();
        let server = setup_test_server(store.clone(), true);
        let session_id = open_session(&server).await;

        server
            .post(&format!("/sessions/{}/blocks", session_id))
            .json(&json!({
                "id": "draft_1",
                "dayOfWeek": "friday",
                "startTime": "08:00",
                "endTime": "08:45"
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.post(&format!("/sessions/{}/save", session_id)).await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body = response.json::<Value>();
        assert_eq!(body["code"], "MISSING_CREATE_CONTEXT");

        // nothing reached storage
        assert_eq!(store.items().len(), 2);
        assert_eq!(store.time_slots().len(), 2);

        // supplying the context afterwards lets the save through
        server
            .put(&format!("/sessions/{}/blocks/draft_1/context", session_id))
            .json(&json!({
                "classId": "c1",
                "teacherId": "t1",
                "startDate": "2024-03-01"
            }))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .post(&format!("/sessions/{}/save", session_id))
            .await
            .assert_status_ok();
        assert_eq!(store.items().len(), 3);
    }

    #[tokio::test]
    async fn test_save_with_inverted_time_range_is_rejected() {
        let store = seeded_store();
        let server = setup_test_server(store.clone(), true);
        let session_id = open_session(&server).await;

        server
            .patch(&format!("/sessions/{}/blocks/item_a", session_id))
            .json(&json!({ "startTime": "12:00", "endTime": "11:00" }))
            .await
            .assert_status_ok();

        let response = server.post(&format!("/sessions/{}/save", session_id)).await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<Value>()["code"], "INVALID_TIME_RANGE");
        assert_eq!(store.item("item_a").unwrap().time_slot_id, "slot_1");
    }

    #[tokio::test]
    async fn test_save_applies_changes_and_refreshes() {
        let store = seeded_store();
        let server = setup_test_server(store.clone(), true);
        let session_id = open_session(&server).await;

        server
            .post(&format!("/sessions/{}/blocks", session_id))
            .json(&json!({
                "id": "draft_1",
                "dayOfWeek": "wednesday",
                "startTime": "14:00",
                "endTime": "15:30",
                "context": {
                    "classId": "c1",
                    "teacherId": "t1",
                    "roomId": "r7",
                    "startDate": "2024-03-01"
                }
            }))
            .await
            .assert_status(StatusCode::CREATED);
        server
            .patch(&format!("/sessions/{}/blocks/item_a", session_id))
            .json(&json!({ "startTime": "10:00", "endTime": "11:00" }))
            .await
            .assert_status_ok();
        server
            .delete(&format!("/sessions/{}/blocks/item_b", session_id))
            .await
            .assert_status_ok();

        let response = server.post(&format!("/sessions/{}/save", session_id)).await;
        response.assert_status_ok();
        let body = response.json::<Value>();

        // the new slot takes the first generated id, the item the second
        assert_eq!(
            body["report"]["created"],
            json!([{ "blockId": "draft_1", "itemId": "item-2" }])
        );
        assert_eq!(body["report"]["updated"], json!(["item_a"]));
        assert_eq!(body["report"]["deleted"], json!(["item_b"]));
        assert_eq!(body["report"]["timeSlotsCreated"], 1);
        assert_eq!(body["refreshed"], true);
        assert_eq!(body["session"]["hasChanges"], false);
        let ids: Vec<&str> = body["session"]["blocks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["item_a", "item-2"]);

        assert_eq!(store.item("item_a").unwrap().time_slot_id, "slot_2");
        assert!(store.item("item_b").is_none());
        let created = store.item("item-2").unwrap();
        assert_eq!(created.room_id.as_deref(), Some("r7"));
        assert_eq!(created.time_slot_id, "slot-1");
        let new_slot = store
            .time_slots()
            .into_iter()
            .find(|s| s.id == "slot-1")
            .unwrap();
        assert_eq!(new_slot.duration, 90);
    }

    #[tokio::test]
    async fn test_empty_save_does_not_refresh() {
        let server = setup_test_server(seeded_store(), true);
        let session_id = open_session(&server).await;

        let response = server.post(&format!("/sessions/{}/save", session_id)).await;
        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["refreshed"], false);
        assert_eq!(body["report"]["created"], json!([]));
        assert_eq!(body["report"]["timeSlotsCreated"], 0);
    }

    #[tokio::test]
    async fn test_save_without_refresh_keeps_stale_baseline_until_reload() {
        let store = seeded_store();
        let server = setup_test_server(store.clone(), false);
        let session_id = open_session(&server).await;

        server
            .post(&format!("/sessions/{}/blocks", session_id))
            .json(&json!({
                "id": "draft_1",
                "dayOfWeek": "thursday",
                "startTime": "09:00",
                "endTime": "10:00",
                "context": { "classId": "c1", "teacherId": "t1", "startDate": "2024-03-01" }
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let body = server
            .post(&format!("/sessions/{}/save", session_id))
            .await
            .json::<Value>();
        assert_eq!(body["refreshed"], false);
        assert_eq!(body["report"]["timeSlotsCreated"], 0);
        // baseline was not refreshed, so the saved block still shows as new
        assert_eq!(body["session"]["hasChanges"], true);

        let reloaded = server
            .post(&format!("/sessions/{}/reload", session_id))
            .await;
        reloaded.assert_status_ok();
        let view = reloaded.json::<SessionView>();
        assert!(!view.has_changes);
        assert_eq!(block_ids(&view), vec!["item_a", "item_b", "item-1"]);
        assert_eq!(store.items().len(), 3);
    }

    #[tokio::test]
    async fn test_close_session() {
        let store = seeded_store();
        let app_state = Arc::new(AppState::new(
            store,
            ReconcilerOptions::default(),
            true,
        ));
        let config = TestServerConfig::builder().mock_transport().build();
        let server =
            TestServer::new_with_config(create_router(Arc::clone(&app_state)), config).unwrap();

        let session_id = open_session(&server).await;
        assert_eq!(app_state.session_count().await, 1);

        server
            .delete(&format!("/sessions/{}", session_id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        assert_eq!(app_state.session_count().await, 0);

        server
            .get(&format!("/sessions/{}", session_id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .delete(&format!("/sessions/{}", session_id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
