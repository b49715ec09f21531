use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::models::{DispatchRequest, ErrorBody, JobView, ListJobsQuery, StatsResponse};
use crate::jobs::{dispatch_raw, JobRegistry, JobState, JobStore, StoreError};

pub mod models;

const DEFAULT_LIST_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn JobStore>,
    pub registry: Arc<JobRegistry>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/jobs", get(list_jobs).post(dispatch_job))
        .route("/jobs/:id", get(get_job))
        .route("/stats", get(stats))
        .route("/health", get(health))
        .with_state(state)
}

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorBody>)>;

fn err(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: error.into(),
        }),
    )
}

fn internal_err(e: StoreError) -> (StatusCode, Json<ErrorBody>) {
    tracing::error!(error = %e, "admin api store error");
    err(StatusCode::INTERNAL_SERVER_ERROR, format!("internal error: {e}"))
}

pub async fn list_jobs(
    State(state): State<ApiState>,
    Query(q): Query<ListJobsQuery>,
) -> ApiResult<Json<Vec<JobView>>> {
    let job_state = match q.state.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => Some(
            raw.parse::<JobState>()
                .map_err(|e| err(StatusCode::BAD_REQUEST, e.to_string()))?,
        ),
        None => None,
    };
    let limit = q.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 500);

    let rows = state
        .store
        .list(job_state, limit)
        .await
        .map_err(internal_err)?;

    Ok(Json(rows.into_iter().map(JobView::from).collect()))
}

pub async fn get_job(State(state): State<ApiState>, Path(id): Path<Uuid>) -> ApiResult<Json<JobView>> {
    match state.store.get(id).await.map_err(internal_err)? {
        Some(job) => Ok(Json(job.into())),
        None => Err(err(StatusCode::NOT_FOUND, "job not found")),
    }
}

pub async fn dispatch_job(
    State(state): State<ApiState>,
    Json(body): Json<DispatchRequest>,
) -> ApiResult<Response> {
    let job_type = body.job_type.trim();
    if job_type.is_empty() {
        return Err(err(StatusCode::BAD_REQUEST, "job_type is required"));
    }
    if !state.registry.contains(job_type) {
        return Err(err(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("job type '{job_type}' not registered"),
        ));
    }

    let payload = serde_json::to_vec(&body.payload)
        .map_err(|e| err(StatusCode::BAD_REQUEST, e.to_string()))?;

    let job = dispatch_raw(state.store.as_ref(), job_type, payload)
        .await
        .map_err(|e| err(StatusCode::INTERNAL_SERVER_ERROR, format!("internal error: {e}")))?;

    Ok((StatusCode::CREATED, Json(JobView::from(job))).into_response())
}

pub async fn stats(State(state): State<ApiState>) -> ApiResult<Json<StatsResponse>> {
    let counts = state.store.counts().await.map_err(internal_err)?;
    Ok(Json(counts.into()))
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{boxed, BoxFuture, JobError, JobHandler, MemoryJobStore, NewJob};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    #[derive(Clone)]
    struct Email;

    impl JobHandler for Email {
        fn job_type(&self) -> &'static str {
            "email"
        }

        fn handle<'a>(&'a self, _payload: &'a [u8]) -> BoxFuture<'a, Result<(), JobError>> {
            boxed(async { Ok(()) })
        }
    }

    fn app(store: &MemoryJobStore) -> Router {
        let mut registry = JobRegistry::new();
        registry.register(Email);
        router(ApiState {
            store: Arc::new(store.clone()),
            registry: Arc::new(registry),
        })
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let store = MemoryJobStore::new();
        let res = app(&store)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn post_creates_pending_job() {
        let store = MemoryJobStore::new();
        let (status, body) = send(
            app(&store),
            post_json("/jobs", json!({"job_type": "email", "payload": {"to": "a@b.com"}})),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["state"], "pending");
        assert_eq!(body["attempts"], 0);
        assert_eq!(body["payload"]["to"], "a@b.com");
        assert_eq!(store.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn post_rejects_empty_and_unknown_types() {
        let store = MemoryJobStore::new();

        let (status, _) = send(app(&store), post_json("/jobs", json!({"job_type": " "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(app(&store), post_json("/jobs", json!({"job_type": "sms"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("sms"));

        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn get_job_and_missing_job() {
        let store = MemoryJobStore::new();
        let job = store
            .insert(NewJob::now("email", b"not json".to_vec()))
            .await
            .unwrap();

        let (status, body) = send(
            app(&store),
            Request::get(format!("/jobs/{}", job.id)).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["payload"], "not json");

        let (status, _) = send(
            app(&store),
            Request::get(format!("/jobs/{}", Uuid::new_v4())).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_filters_by_state_and_stats_count() {
        let store = MemoryJobStore::new();
        let a = store.insert(NewJob::now("email", b"{}".to_vec())).await.unwrap();
        store.insert(NewJob::now("email", b"{}".to_vec())).await.unwrap();
        store.claim(a.id, chrono::Utc::now()).await.unwrap();

        let (status, body) = send(
            app(&store),
            Request::get("/jobs?state=started").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["id"], a.id.to_string());

        let (status, _) = send(
            app(&store),
            Request::get("/jobs?state=dlq").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(app(&store), Request::get("/stats").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"pending": 1, "started": 1, "finished": 0, "failed": 0, "total": 2}));
    }

    #[tokio::test]
    async fn store_outage_is_a_server_error() {
        let store = MemoryJobStore::new();
        store.set_unavailable(true);
        let (status, _) = send(app(&store), Request::get("/stats").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
