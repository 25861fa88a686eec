#![forbid(unsafe_code)]

//! Axum backend exposing the four dashboard modes (collect, migrate and
//! analyze, delete from the document store, delete from the relational store)
//! as a small JSON API.
//!
//! Stores are opened per request and dropped when the handler returns. The
//! harvester is shared; its HTTP calls run on the blocking pool.

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::signal;
use tracing::{info, warn};
use tubeharvest::{
    analytics::{self, AnalysisOptions, ChartHint, QueryTable, Question},
    config::{RuntimeOverrides, resolve_runtime_config},
    document_store::DocumentSummary,
    error::HarvestError,
    harvest::ChannelHarvester,
    logging,
    metadata::ChannelAggregate,
    pipeline::{self, DataPaths, HarvestSummary, MigrationReport},
    projection::ProjectionOptions,
    relational_store::DeleteReport,
    youtube::{VideoPlatform, YouTubeClient},
};

#[derive(Debug, Parser)]
#[command(about = "JSON backend for channel harvesting and analysis")]
struct BackendArgs {
    /// Directory holding documents.db and relational.db (overrides DATA_ROOT).
    #[arg(long)]
    data_root: Option<PathBuf>,
    /// Listen address (overrides HARVEST_HOST).
    #[arg(long)]
    host: Option<String>,
    /// Listen port (overrides HARVEST_PORT).
    #[arg(long)]
    port: Option<u16>,
    /// Alternate `.env` file.
    #[arg(long)]
    env_file: Option<PathBuf>,
}

impl BackendArgs {
    fn overrides(self) -> RuntimeOverrides {
        RuntimeOverrides {
            data_root: self.data_root,
            harvest_host: self.host,
            harvest_port: self.port,
            env_path: self.env_file,
            ..RuntimeOverrides::default()
        }
    }
}

/// Shared state injected into every handler. `harvester` is `None` when no
/// API key is configured; only the collect route needs it.
struct AppState<P> {
    harvester: Option<Arc<ChannelHarvester<P>>>,
    paths: Arc<DataPaths>,
    projection: ProjectionOptions,
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            harvester: self.harvester.clone(),
            paths: Arc::clone(&self.paths),
            projection: self.projection,
        }
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "bad_request",
            message: message.into(),
        }
    }
}

impl From<HarvestError> for ApiError {
    fn from(err: HarvestError) -> Self {
        let status = match &err {
            HarvestError::NotFound(_) => StatusCode::NOT_FOUND,
            HarvestError::UpstreamUnavailable(_) | HarvestError::LocalizedFetchFailure(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            HarvestError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %err, "request failed");
        }
        Self {
            status,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.kind,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init()?;
    let config = resolve_runtime_config(BackendArgs::parse().overrides())?;
    let harvester = match config.require_api_key() {
        Ok(api_key) => {
            let client = YouTubeClient::new(api_key, &config.youtube_api_base);
            Some(Arc::new(ChannelHarvester::new(client)))
        }
        Err(err) => {
            warn!(error = %err, "collect route disabled");
            None
        }
    };

    let state = AppState {
        harvester,
        paths: Arc::new(config.data_paths()),
        projection: config.projection_options(),
    };

    let host: IpAddr = config
        .harvest_host
        .parse()
        .context("expected a valid IPv4 or IPv6 address for --host/HARVEST_HOST")?;
    let addr = SocketAddr::new(host, config.harvest_port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!(%addr, data_root = %config.data_root.display(), "API server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

fn build_router<P>(state: AppState<P>) -> Router
where
    P: VideoPlatform + Send + Sync + 'static,
{
    Router::new()
        .route("/api/harvest/{channel_id}", post(harvest_channel::<P>))
        .route("/api/documents", get(list_documents::<P>))
        .route(
            "/api/documents/{channel_id}",
            get(get_document::<P>).delete(delete_document::<P>),
        )
        .route("/api/migrate/{channel_id}", post(migrate_channel::<P>))
        .route("/api/relational/channels", get(relational_channels::<P>))
        .route(
            "/api/relational/{channel_id}",
            delete(delete_relational::<P>),
        )
        .route("/api/questions", get(list_questions))
        .route("/api/questions/{index}", get(run_question::<P>))
        .fallback(|| async {
            ApiError {
                status: StatusCode::NOT_FOUND,
                kind: "not_found",
                message: "endpoint not found".into(),
            }
        })
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        warn!(error = %err, "failed to install Ctrl+C handler");
    }
}

async fn harvest_channel<P>(
    State(state): State<AppState<P>>,
    AxumPath(channel_id): AxumPath<String>,
) -> ApiResult<Json<HarvestSummary>>
where
    P: VideoPlatform + Send + Sync + 'static,
{
    let harvester = state.harvester.clone().ok_or_else(|| {
        HarvestError::upstream("YOUTUBE_API_KEY is not configured on this server")
    })?;
    let summary = pipeline::harvest_and_store(harvester, &state.paths, &channel_id).await?;
    Ok(Json(summary))
}

async fn list_documents<P>(
    State(state): State<AppState<P>>,
) -> ApiResult<Json<Vec<DocumentSummary>>> {
    let documents = state.paths.documents().await?.list().await?;
    Ok(Json(documents))
}

async fn get_document<P>(
    State(state): State<AppState<P>>,
    AxumPath(channel_id): AxumPath<String>,
) -> ApiResult<Json<ChannelAggregate>> {
    let aggregate = state
        .paths
        .documents()
        .await?
        .find_one(&channel_id)
        .await?
        .ok_or_else(|| HarvestError::document_not_found(&channel_id))?;
    Ok(Json(aggregate))
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct DeletedDocument {
    channel_id: String,
    deleted: u64,
}

async fn delete_document<P>(
    State(state): State<AppState<P>>,
    AxumPath(channel_id): AxumPath<String>,
) -> ApiResult<Json<DeletedDocument>> {
    let deleted = pipeline::delete_aggregate(&state.paths, &channel_id).await?;
    Ok(Json(DeletedDocument {
        channel_id,
        deleted,
    }))
}

async fn migrate_channel<P>(
    State(state): State<AppState<P>>,
    AxumPath(channel_id): AxumPath<String>,
) -> ApiResult<Json<MigrationReport>> {
    let report = pipeline::migrate(&state.paths, &channel_id, state.projection).await?;
    Ok(Json(report))
}

async fn relational_channels<P>(State(state): State<AppState<P>>) -> ApiResult<Json<Vec<String>>> {
    let names = state.paths.relational().await?.channel_names().await?;
    Ok(Json(names))
}

async fn delete_relational<P>(
    State(state): State<AppState<P>>,
    AxumPath(channel_id): AxumPath<String>,
) -> ApiResult<Json<DeleteReport>> {
    let report = pipeline::delete_relational_by_channel(&state.paths, &channel_id).await?;
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
struct QuestionInfo {
    index: usize,
    title: &'static str,
    chart: Option<ChartHint>,
}

async fn list_questions() -> Json<Vec<QuestionInfo>> {
    Json(
        Question::ALL
            .iter()
            .map(|question| QuestionInfo {
                index: question.index(),
                title: question.title(),
                chart: question.chart(),
            })
            .collect(),
    )
}

#[derive(Debug, Default, Deserialize)]
struct QuestionParams {
    year: Option<i32>,
}

async fn run_question<P>(
    State(state): State<AppState<P>>,
    AxumPath(index): AxumPath<String>,
    Query(params): Query<QuestionParams>,
) -> ApiResult<Json<QueryTable>> {
    let question = index
        .parse::<usize>()
        .ok()
        .and_then(Question::from_index)
        .ok_or_else(|| {
            ApiError::bad_request(format!(
                "question index must be between 1 and {}, got {index:?}",
                Question::ALL.len()
            ))
        })?;
    let options = params
        .year
        .map(|year| AnalysisOptions { year })
        .unwrap_or_default();

    let store = state.paths.relational().await?;
    let table = analytics::run_question(&store, question, &options).await?;
    Ok(Json(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;
    use tempfile::tempdir;
    use tubeharvest::error::HarvestResult;
    use tubeharvest::metadata::{ChannelSummary, CommentRecord};
    use tubeharvest::pagination::Page;
    use tubeharvest::projection::Cell;
    use tubeharvest::youtube::VideoDetail;

    /// One channel with three videos; `UCdown` simulates an outage.
    struct FixturePlatform;

    impl VideoPlatform for FixturePlatform {
        fn channel(&self, channel_id: &str) -> HarvestResult<Option<ChannelSummary>> {
            match channel_id {
                "UCdown" => Err(HarvestError::upstream("quota exceeded")),
                "UCfixture" => Ok(Some(ChannelSummary {
                    channel_id: "UCfixture".into(),
                    channel_name: "Fixture".into(),
                    subscriber_count: Some(42),
                    view_count: Some(600),
                    video_count: Some(3),
                    playlist_id: "UUfixture".into(),
                    description: "fixture channel".into(),
                })),
                _ => Ok(None),
            }
        }

        fn playlist_items(
            &self,
            _playlist_id: &str,
            _cursor: Option<&str>,
            _max_results: usize,
        ) -> HarvestResult<Page<String>> {
            Ok(Page::last(vec!["v1".into(), "v2".into(), "v3".into()]))
        }

        fn videos(&self, video_ids: &[String]) -> HarvestResult<Vec<VideoDetail>> {
            Ok(video_ids
                .iter()
                .enumerate()
                .map(|(position, id)| VideoDetail {
                    video_id: id.clone(),
                    title: format!("Video {id}"),
                    published_at: "2022-05-01T12:00:00Z".into(),
                    description: String::new(),
                    view_count: Some(100 * (position as i64 + 1)),
                    like_count: Some(position as i64),
                    favorite_count: Some(0),
                    comment_count: Some(1),
                    duration: "PT4M".into(),
                    caption_available: false,
                })
                .collect())
        }

        fn comment_threads(
            &self,
            video_id: &str,
            _max_results: usize,
        ) -> HarvestResult<Vec<CommentRecord>> {
            if video_id == "v2" {
                return Err(HarvestError::LocalizedFetchFailure(
                    "comments disabled".into(),
                ));
            }
            Ok(vec![CommentRecord {
                comment_id: format!("c-{video_id}"),
                video_id: video_id.into(),
                text: "nice".into(),
                author: "viewer".into(),
                published_at: "2022-05-02T00:00:00Z".into(),
            }])
        }
    }

    struct TestContext {
        _temp: tempfile::TempDir,
        state: AppState<FixturePlatform>,
    }

    impl TestContext {
        fn new() -> Self {
            let temp = tempdir().unwrap();
            let state = AppState {
                harvester: Some(Arc::new(ChannelHarvester::new(FixturePlatform))),
                paths: Arc::new(DataPaths::from_root(temp.path())),
                projection: ProjectionOptions::default(),
            };
            Self { _temp: temp, state }
        }

        fn state(&self) -> State<AppState<FixturePlatform>> {
            State(self.state.clone())
        }
    }

    async fn error_body(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn collect_migrate_ask_and_delete() {
        let ctx = TestContext::new();

        let Json(summary) = harvest_channel(ctx.state(), AxumPath("UCfixture".into()))
            .await
            .unwrap();
        assert_eq!(summary.channel_name, "Fixture");
        assert_eq!(summary.videos, 3);
        assert_eq!(summary.comments, 2);

        let Json(documents) = list_documents(ctx.state()).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].channel_id, "UCfixture");

        let Json(document) = get_document(ctx.state(), AxumPath("UCfixture".into()))
            .await
            .unwrap();
        assert_eq!(document.videos[1].comments, None);
        assert_eq!(document.videos[0].duration, "00:04:00");

        let Json(report) = migrate_channel(ctx.state(), AxumPath("UCfixture".into()))
            .await
            .unwrap();
        assert_eq!(report.rows.video, 3);
        assert_eq!(report.rows.comments, 2);

        let Json(names) = relational_channels(ctx.state()).await.unwrap();
        assert_eq!(names, vec!["Fixture".to_string()]);

        let Json(table) = run_question(
            ctx.state(),
            AxumPath("3".into()),
            Query(QuestionParams::default()),
        )
        .await
        .unwrap();
        assert_eq!(table.rows[0][2], Cell::Integer(300));
        assert!(table.chart.is_some());

        let Json(in_2022) = run_question(
            ctx.state(),
            AxumPath("8".into()),
            Query(QuestionParams { year: Some(2022) }),
        )
        .await
        .unwrap();
        assert_eq!(in_2022.rows[0][1], Cell::Integer(3));

        let Json(deleted) = delete_relational(ctx.state(), AxumPath("UCfixture".into()))
            .await
            .unwrap();
        assert_eq!(deleted.total(), 3 + 2 + 1 + 1);

        let Json(removed) = delete_document(ctx.state(), AxumPath("UCfixture".into()))
            .await
            .unwrap();
        assert_eq!(removed.deleted, 1);
        let Json(again) = delete_document(ctx.state(), AxumPath("UCfixture".into()))
            .await
            .unwrap();
        assert_eq!(again.deleted, 0);
    }

    #[tokio::test]
    async fn unknown_channel_maps_to_404_with_json_body() {
        let ctx = TestContext::new();
        let err = harvest_channel(ctx.state(), AxumPath("UCnobody".into()))
            .await
            .unwrap_err();
        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
        assert!(body["message"].as_str().unwrap().contains("UC"));
    }

    #[tokio::test]
    async fn upstream_outage_maps_to_503() {
        let ctx = TestContext::new();
        let err = harvest_channel(ctx.state(), AxumPath("UCdown".into()))
            .await
            .unwrap_err();
        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "upstream_unavailable");
    }

    #[tokio::test]
    async fn without_api_key_only_collect_is_unavailable() {
        let mut ctx = TestContext::new();
        ctx.state.harvester = None;

        let err = harvest_channel(ctx.state(), AxumPath("UCfixture".into()))
            .await
            .unwrap_err();
        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["message"].as_str().unwrap().contains("YOUTUBE_API_KEY"));

        let Json(documents) = list_documents(ctx.state()).await.unwrap();
        assert!(documents.is_empty());
        let Json(deleted) = delete_relational(ctx.state(), AxumPath("UCfixture".into()))
            .await
            .unwrap();
        assert_eq!(deleted.total(), 0);
        let Json(table) = run_question(
            ctx.state(),
            AxumPath("1".into()),
            Query(QuestionParams::default()),
        )
        .await
        .unwrap();
        assert!(table.rows.is_empty());
    }

    #[tokio::test]
    async fn missing_document_and_migration_are_404() {
        let ctx = TestContext::new();
        let err = get_document(ctx.state(), AxumPath("UCmissing".into()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = migrate_channel(ctx.state(), AxumPath("UCmissing".into()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_question_index_is_bad_request() {
        let ctx = TestContext::new();
        for index in ["0", "11", "abc"] {
            let err = run_question(
                ctx.state(),
                AxumPath(index.into()),
                Query(QuestionParams::default()),
            )
            .await
            .unwrap_err();
            let (status, body) = error_body(err).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "index {index}");
            assert_eq!(body["error"], "bad_request");
        }
    }

    #[tokio::test]
    async fn question_list_has_ten_entries() {
        let Json(questions) = list_questions().await;
        assert_eq!(questions.len(), 10);
        assert_eq!(questions[0].index, 1);
        assert!(questions[6].chart.is_some());
    }

    #[test]
    fn router_builds_for_any_platform() {
        let ctx = TestContext::new();
        let _router = build_router(ctx.state.clone());
    }
}
