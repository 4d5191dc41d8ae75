use axum::{
    extract::{Json as ExtractJson, Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::handlers::error::AppError;
use crate::models::schedule::{BlockPatch, ClockTime, CreationContext, DayOfWeek, ScheduleBlock};
use crate::services::reconciler::{ReconcilerOptions, SaveReport, TimetableReconciler};
use crate::store::TimetableStore;

type Session = Arc<Mutex<TimetableReconciler>>;

struct SessionEntry {
    session: Session,
    last_touched: Instant,
}

// AppState struct containing shared resources
pub struct AppState {
    pub store: Arc<dyn TimetableStore>,
    pub options: ReconcilerOptions,
    pub refresh_after_save: bool,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn TimetableStore>,
        options: ReconcilerOptions,
        refresh_after_save: bool,
    ) -> Self {
        Self {
            store,
            options,
            refresh_after_save,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Look up a session and mark it as used
    async fn session(&self, session_id: &str) -> Result<Session, AppError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", session_id)))?;
        entry.last_touched = Instant::now();
        Ok(Arc::clone(&entry.session))
    }

    /// Drop sessions nobody has touched for at least `ttl`. Sessions with a
    /// request in progress are kept. Returns how many were removed.
    pub async fn evict_idle_sessions(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|session_id, entry| {
            let idle = entry.last_touched.elapsed() >= ttl;
            let in_use = entry.session.try_lock().is_err();
            if idle && !in_use {
                info!("Evicting idle session {}", session_id);
                return false;
            }
            true
        });
        before - sessions.len()
    }

    /// Periodically evict sessions idle for longer than `ttl`
    pub fn spawn_session_sweeper(
        self: &Arc<Self>,
        ttl: Duration,
        every: Duration,
    ) -> JoinHandle<()> {
        let state = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let evicted = state.evict_idle_sessions(ttl).await;
                if evicted > 0 {
                    debug!("Session sweep removed {} idle sessions", evicted);
                }
            }
        })
    }

    async fn insert_session(&self, reconciler: TimetableReconciler) -> String {
        let mut sessions = self.sessions.write().await;
        let mut session_id = new_id("session");
        while sessions.contains_key(&session_id) {
            session_id = new_id("session");
        }
        sessions.insert(
            session_id.clone(),
            SessionEntry {
                session: Arc::new(Mutex::new(reconciler)),
                last_touched: Instant::now(),
            },
        );
        session_id
    }
}

fn new_id(prefix: &str) -> String {
    format!("{}-{:08x}", prefix, rand::random::<u32>())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    pub timetable_id: String,
}

/// Block added from the editor; the id is generated when left out
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlockRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub day_of_week: DayOfWeek,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub context: Option<CreationContext>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub timetable_id: String,
    pub blocks: Vec<ScheduleBlock>,
    pub has_changes: bool,
}

impl SessionView {
    fn of(session_id: &str, reconciler: &TimetableReconciler) -> Self {
        Self {
            session_id: session_id.to_string(),
            timetable_id: reconciler.timetable_id().to_string(),
            blocks: reconciler.draft().to_vec(),
            has_changes: reconciler.has_changes(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesView {
    pub has_changes: bool,
    pub to_create: Vec<String>,
    pub to_update: Vec<String>,
    pub to_delete: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveView {
    pub report: SaveReport,
    /// Whether the baseline was reloaded from storage after the save
    pub refreshed: bool,
    pub session: SessionView,
}

// Open an editing session endpoint
pub async fn open_session(
    State(state): State<Arc<AppState>>,
    ExtractJson(request): ExtractJson<OpenSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    info!(
        "Received request to open editing session for timetable {}",
        request.timetable_id
    );

    let reconciler =
        TimetableReconciler::open(Arc::clone(&state.store), &request.timetable_id, state.options)
            .await
            .map_err(|err| {
                error!("Failed to open timetable {}: {}", request.timetable_id, err);
                AppError::from(err)
            })?;

    let view = SessionView::of("", &reconciler);
    let session_id = state.insert_session(reconciler).await;
    info!(
        "Opened session {} for timetable {} with {} blocks",
        session_id,
        request.timetable_id,
        view.blocks.len()
    );

    Ok((StatusCode::CREATED, Json(SessionView { session_id, ..view })))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.session(&session_id).await?;
    let reconciler = session.lock().await;
    Ok(Json(SessionView::of(&session_id, &reconciler)))
}

pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    match state.sessions.write().await.remove(&session_id) {
        Some(_) => {
            info!("Closed session {}", session_id);
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(AppError::NotFound(format!("Session {} not found", session_id))),
    }
}

// Add a block to the draft endpoint
pub async fn add_block(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    ExtractJson(request): ExtractJson<NewBlockRequest>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let session = state.session(&session_id).await?;
    let mut reconciler = session.lock().await;

    let block_id = request.id.unwrap_or_else(|| new_id("draft"));
    info!("Adding block {} to session {}", block_id, session_id);

    reconciler.add_block(ScheduleBlock {
        id: block_id.clone(),
        day_of_week: request.day_of_week,
        start_time: request.start_time,
        end_time: request.end_time,
        notes: request.notes,
    });
    if let Some(context) = request.context {
        reconciler.set_create_context(block_id, context);
    }

    Ok((
        StatusCode::CREATED,
        Json(SessionView::of(&session_id, &reconciler)),
    ))
}

// Update a draft block endpoint; unknown blocks are ignored
pub async fn update_block(
    State(state): State<Arc<AppState>>,
    Path((session_id, block_id)): Path<(String, String)>,
    ExtractJson(patch): ExtractJson<BlockPatch>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.session(&session_id).await?;
    let mut reconciler = session.lock().await;

    if !reconciler.update_block(&block_id, &patch) {
        warn!(
            "Session {}: update for unknown block {} ignored",
            session_id, block_id
        );
    }
    Ok(Json(SessionView::of(&session_id, &reconciler)))
}

// Delete a draft block endpoint; unknown blocks are ignored
pub async fn delete_block(
    State(state): State<Arc<AppState>>,
    Path((session_id, block_id)): Path<(String, String)>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.session(&session_id).await?;
    let mut reconciler = session.lock().await;

    if !reconciler.delete_block(&block_id) {
        warn!(
            "Session {}: delete for unknown block {} ignored",
            session_id, block_id
        );
    }
    Ok(Json(SessionView::of(&session_id, &reconciler)))
}

pub async fn set_block_context(
    State(state): State<Arc<AppState>>,
    Path((session_id, block_id)): Path<(String, String)>,
    ExtractJson(context): ExtractJson<CreationContext>,
) -> Result<StatusCode, AppError> {
    let session = state.session(&session_id).await?;
    session.lock().await.set_create_context(block_id, context);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_changes(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ChangesView>, AppError> {
    let session = state.session(&session_id).await?;
    let reconciler = session.lock().await;

    let changes = reconciler.diff();
    let ids = |blocks: &[ScheduleBlock]| -> Vec<String> {
        blocks.iter().map(|b| b.id.clone()).collect()
    };
    Ok(Json(ChangesView {
        has_changes: reconciler.has_changes(),
        to_create: ids(&changes.to_create),
        to_update: ids(&changes.to_update),
        to_delete: ids(&changes.to_delete),
    }))
}

// Save the draft endpoint.
//
// The save runs in its own task: once storage calls have started they finish
// even if the request is dropped, so the session never loses track of
// records storage already created.
pub async fn save_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SaveView>, AppError> {
    let session = state.session(&session_id).await?;
    info!("Received request to save session {}", session_id);

    let task_session_id = session_id.clone();
    let refresh_after_save = state.refresh_after_save;
    let task = tokio::spawn(async move {
        let mut reconciler = session.lock_owned().await;
        let session_id = task_session_id;

        let report = reconciler.save_changes().await.map_err(|err| {
            error!("Failed to save session {}: {}", session_id, err);
            AppError::from(err)
        })?;

        let mut refreshed = false;
        if refresh_after_save && !report.is_empty() {
            match reconciler.reload().await {
                Ok(()) => refreshed = true,
                // the save itself went through; the caller can retry the reload
                Err(err) => warn!(
                    "Session {} saved but baseline reload failed: {}",
                    session_id, err
                ),
            }
        }

        Ok(SaveView {
            report,
            refreshed,
            session: SessionView::of(&session_id, &reconciler),
        })
    });

    match task.await {
        Ok(result) => result.map(Json),
        Err(err) => {
            error!("Save task for session {} did not complete: {}", session_id, err);
            Err(AppError::Internal(format!(
                "Save of session {} did not complete",
                session_id
            )))
        }
    }
}

// Reload the baseline from storage endpoint
pub async fn reload_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.session(&session_id).await?;
    let mut reconciler = session.lock().await;

    reconciler.reload().await.map_err(|err| {
        error!("Failed to reload session {}: {}", session_id, err);
        AppError::from(err)
    })?;
    Ok(Json(SessionView::of(&session_id, &reconciler)))
}
