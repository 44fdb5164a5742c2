use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use vidseek_catalog::SqliteCatalog;
use vidseek_cli::{router, AppState};
use vidseek_core::data_processor::DataProcessor;
use vidseek_core::traits::{Catalog, Embedder, VectorIndex};
use vidseek_core::types::{IndexVector, SearchHit, SegmentId};
use vidseek_embed::FakeEmbedder;
use vidseek_hybrid::{IngestOptions, IngestionCoordinator, PlaybackUrls, RetrievalAggregator};
use vidseek_transcribe::SidecarSegmenter;
use vidseek_vector::FlatVectorIndex;

const DIM: usize = 64;

const RIVER_SRT: &str = "1
00:00:01,000 --> 00:00:04,000
boil river water before drinking

2
00:00:05,500 --> 00:00:09,000
a cloth filter removes the silt
";

struct Fixture {
    tmp: TempDir,
    catalog: Arc<SqliteCatalog>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl Fixture {
    fn videos(&self) -> &Path {
        self.tmp.path()
    }

    fn app(&self) -> Router {
        self.app_with_index(self.index.clone())
    }

    fn app_with_index(&self, index: Arc<dyn VectorIndex>) -> Router {
        let aggregator = RetrievalAggregator::new(
            self.embedder.clone(),
            index,
            self.catalog.clone(),
            PlaybackUrls::default(),
        );
        router(AppState { aggregator: Arc::new(aggregator), top_k: 20 }, Some(self.videos()))
    }
}

async fn fixture() -> Fixture {
    let tmp = TempDir::new().expect("tmp");
    std::fs::write(tmp.path().join("river.mp4"), b"not really a video").expect("video");
    std::fs::write(tmp.path().join("river.srt"), RIVER_SRT).expect("srt");

    let catalog = Arc::new(SqliteCatalog::connect_path(&tmp.path().join("catalog.db")).await.expect("catalog"));
    let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder::new(DIM));
    let index: Arc<dyn VectorIndex> = Arc::new(FlatVectorIndex::new(DIM));
    let coordinator = IngestionCoordinator::new(
        Arc::new(SidecarSegmenter::new()),
        embedder.clone(),
        catalog.clone(),
        index.clone(),
        IngestOptions::default(),
    );
    let report = coordinator.ingest_files(&[tmp.path().join("river.mp4")]).await;
    assert_eq!(report.segments(), 2, "failures: {:?}", report.failures);
    Fixture { tmp, catalog, embedder, index }
}

fn post_search(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/search")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn search_returns_grouped_videos() {
    let fx = fixture().await;
    let response = fx.app().oneshot(post_search(r#"{"query": "boil river water before drinking"}"#)).await.expect("call");
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let videos = json.as_array().expect("array");
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0]["filename"], "river.mp4");
    assert_eq!(videos[0]["video_url"], "/static/videos/river.mp4");
    assert_eq!(videos[0]["author"], "unknown");
    let children = videos[0]["children"].as_array().expect("children");
    assert_eq!(children.len(), 2);
    assert_eq!(children[0]["text"], "boil river water before drinking");
    assert_eq!(children[0]["start_seconds"], 1.0);
    assert_eq!(children[1]["start_seconds"], 5.5);
    assert_eq!(children[0]["custom"]["original_index"], 0);
}

#[tokio::test]
async fn malformed_or_incomplete_bodies_are_bad_requests() {
    let fx = fixture().await;
    for body in ["{not json", "{}", r#"{"query": 7}"#] {
        let response = fx.app().oneshot(post_search(body)).await.expect("call");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
        let json = body_json(response).await;
        assert!(!json["error"].as_str().expect("error message").is_empty(), "body {body}");
    }

    let response = fx
        .app()
        .oneshot(Request::post("/search").body(Body::from(r#"{"query": "water"}"#)).expect("request"))
        .await
        .expect("call");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn blank_query_is_a_bad_request() {
    let fx = fixture().await;
    let response = fx.app().oneshot(post_search(r#"{"query": "   "}"#)).await.expect("call");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().expect("error message").contains("empty"));
}

struct DownIndex;

#[async_trait]
impl VectorIndex for DownIndex {
    fn dim(&self) -> usize {
        DIM
    }

    async fn upsert(&self, _vectors: &[IndexVector]) -> anyhow::Result<()> {
        anyhow::bail!("index offline")
    }

    async fn search(&self, _query: &[f32], _k: usize) -> anyhow::Result<Vec<SearchHit>> {
        anyhow::bail!("index offline")
    }

    async fn existing_ids(&self, _ids: &[SegmentId]) -> anyhow::Result<HashSet<SegmentId>> {
        anyhow::bail!("index offline")
    }

    async fn delete(&self, _ids: &[SegmentId]) -> anyhow::Result<()> {
        anyhow::bail!("index offline")
    }

    async fn count(&self) -> anyhow::Result<usize> {
        anyhow::bail!("index offline")
    }
}

#[tokio::test]
async fn upstream_failure_is_a_server_error() {
    let fx = fixture().await;
    let response = fx.app_with_index(Arc::new(DownIndex)).oneshot(post_search(r#"{"query": "water"}"#)).await.expect("call");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert!(json["error"].as_str().expect("error message").contains("index offline"));
}

#[tokio::test]
async fn health_and_static_videos() {
    let fx = fixture().await;

    let response = fx.app().oneshot(Request::get("/health").body(Body::empty()).expect("request")).await.expect("call");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    assert_eq!(&bytes[..], b"ok");

    let response = fx
        .app()
        .oneshot(Request::get("/static/videos/river.mp4").body(Body::empty()).expect("request"))
        .await
        .expect("call");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    assert_eq!(&bytes[..], b"not really a video");
}

#[tokio::test]
async fn every_listed_video_is_playable() {
    let fx = fixture().await;
    let season = fx.videos().join("season1");
    std::fs::create_dir_all(&season).expect("dir");
    std::fs::write(season.join("ep1.mp4"), b"episode").expect("video");
    std::fs::write(season.join("ep1.srt"), RIVER_SRT).expect("srt");

    let listed = DataProcessor::new().list_video_files(fx.videos());
    assert_eq!(listed, vec![fx.videos().join("river.mp4")]);

    let coordinator = IngestionCoordinator::new(
        Arc::new(SidecarSegmenter::new()),
        fx.embedder.clone(),
        fx.catalog.clone(),
        fx.index.clone(),
        IngestOptions::default(),
    );
    coordinator.ingest_files(&listed).await;

    let response = fx.app().oneshot(post_search(r#"{"query": "river water"}"#)).await.expect("call");
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let urls: Vec<String> = json
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v["video_url"].as_str().expect("video_url").to_string())
        .collect();
    assert!(!urls.is_empty());
    for url in urls {
        let response = fx.app().oneshot(Request::get(url.as_str()).body(Body::empty()).expect("request")).await.expect("call");
        assert_eq!(response.status(), StatusCode::OK, "{url}");
    }
}

#[tokio::test]
async fn catalog_holds_what_the_server_returns() {
    let fx = fixture().await;
    let files = fx.catalog.list_source_files().await.expect("files");
    assert_eq!(files.len(), 1);
    assert_eq!(fx.index.count().await.expect("count"), 2);
}
