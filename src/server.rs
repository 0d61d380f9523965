// Sales Dashboard - HTTP API
// Upload endpoint plus the read endpoints the dashboard page calls

use std::path::PathBuf;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{AppError, PersistenceFailure};
use crate::filter::{filter_records, FilterSelection};
use crate::ingest::{ingest_batch, TempUpload};
use crate::record::SalesRecord;
use crate::store::SalesStore;
use crate::view::{render, DashboardView};

/// Multipart field carrying uploaded files
pub const UPLOAD_FIELD: &str = "files";

pub const UPLOAD_SUCCESS: &str = "Data successfully uploaded and processed";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: SalesStore,
    pub upload_dir: PathBuf,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct DashboardRequest {
    #[serde(default)]
    categories: FilterSelection,
}

// ============================================================================
// Upload
// ============================================================================

/// POST /upload - Parse every uploaded CSV and store all rows in one transaction
async fn upload_files(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let (files, records) = process_upload(&state, multipart).await.map_err(|e| {
        error!(error = %e, "upload failed");
        e
    })?;

    info!(files, records, "upload processed");

    Ok(Json(UploadResponse {
        message: UPLOAD_SUCCESS.to_string(),
    }))
}

async fn process_upload(state: &AppState, mut multipart: Multipart) -> Result<(usize, usize), AppError> {
    let mut uploads = Vec::new();

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("unnamed").to_string();
        let upload = TempUpload::new_in(&state.upload_dir);
        let mut file = tokio::fs::File::create(upload.path()).await?;

        while let Some(chunk) = field.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        debug!(file_name = %file_name, path = %upload.path().display(), "received upload");
        uploads.push(upload);
    }

    let files = uploads.len();
    let store = state.store.clone();

    // All files are parsed before the transaction starts
    let records = tokio::task::spawn_blocking(move || -> Result<usize, AppError> {
        let records = ingest_batch(uploads)?;
        Ok(store.persist_batch(&records)?)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok((files, records))
}

// ============================================================================
// Read API
// ============================================================================

/// Run a store read on the blocking pool
async fn read_store<T, F>(state: &AppState, f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&SalesStore) -> Result<T, PersistenceFailure> + Send + 'static,
{
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(|e| {
            error!(error = %e, "store read failed");
            AppError::from(e)
        })
}

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/sales - Every stored record
async fn get_sales(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let sales: Vec<SalesRecord> = read_store(&state, SalesStore::all_sales).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(sales))))
}

/// GET /api/categories - Distinct categories for the filter menu
async fn get_categories(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let categories = read_store(&state, SalesStore::categories).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(categories))))
}

/// POST /api/dashboard - Charts and cards for the selected categories
async fn post_dashboard(
    State(state): State<AppState>,
    Json(request): Json<DashboardRequest>,
) -> Result<Json<ApiResponse<DashboardView>>, AppError> {
    let dataset = read_store(&state, SalesStore::all_sales).await?;
    let view = filter_records(&dataset, &request.categories);

    Ok(Json(ApiResponse::ok(render(&view))))
}

/// GET / - Serve index.html
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState, config: &Config) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/sales", get(get_sales))
        .route("/categories", get(get_categories))
        .route("/dashboard", post(post_dashboard));

    Router::new()
        .route("/", get(serve_index))
        .route("/upload", post(upload_files))
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, Response};
    use std::path::Path;
    use tower::ServiceExt;

    const BOUNDARY: &str = "sales-test-boundary";
    const HEADER: &str = "ItemName,Category,Sales,Revenue\n";

    struct Harness {
        _dir: tempfile::TempDir,
        upload_dir: PathBuf,
        store: SalesStore,
        config: Config,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let upload_dir = dir.path().join("uploads");
            std::fs::create_dir_all(&upload_dir).unwrap();
            let config = Config::from_lookup(|_| None).unwrap();

            Self {
                _dir: dir,
                upload_dir,
                store: SalesStore::open_in_memory().unwrap(),
                config,
            }
        }

        fn app(&self) -> Router {
            let state = AppState {
                store: self.store.clone(),
                upload_dir: self.upload_dir.clone(),
            };
            router(state, &self.config)
        }

        fn leftover_uploads(&self) -> usize {
            count_files(&self.upload_dir)
        }
    }

    fn count_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    /// Multipart body with one `files` part per entry, plus a text field
    fn multipart_request(files: &[(&str, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (name, contents) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                 Content-Type: text/csv\r\n\r\n\
                 {contents}\r\n"
            ));
        }
        body.push_str(&format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"note\"\r\n\r\n\
             weekly upload\r\n\
             --{BOUNDARY}--\r\n"
        ));

        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: Response<Body>) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_upload_single_file() {
        let harness = Harness::new();
        let csv = format!("{HEADER}Spicy Tuna Roll,Sushi Rolls,12,180\n");

        let response = harness
            .app()
            .oneshot(multipart_request(&[("menu.csv", &csv)]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "message": UPLOAD_SUCCESS })
        );
        assert_eq!(
            harness.store.all_sales().unwrap(),
            vec![SalesRecord::new("Spicy Tuna Roll", "Sushi Rolls", 12, 180.0)]
        );
        assert_eq!(harness.leftover_uploads(), 0);
    }

    #[tokio::test]
    async fn test_upload_counts_rows_across_files() {
        let harness = Harness::new();
        let first = format!("{HEADER}House Red,Wine,3,45\nIPA,Beer,4,28\n");
        let second = format!("{HEADER}Junmai,Sake,5,60\n");

        let response = harness
            .app()
            .oneshot(multipart_request(&[("a.csv", &first), ("b.csv", &second)]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(harness.store.count().unwrap(), 3);
        assert_eq!(harness.leftover_uploads(), 0);
    }

    #[tokio::test]
    async fn test_upload_without_files_succeeds() {
        let harness = Harness::new();

        let response = harness.app().oneshot(multipart_request(&[])).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(harness.store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_rolls_back_batch() {
        let harness = Harness::new();
        harness.store.with_connection(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER reject_sake BEFORE INSERT ON sales
                 WHEN NEW.category = 'Sake'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();
        });
        let first = format!("{HEADER}House Red,Wine,3,45\n");
        let second = format!("{HEADER}Junmai,Sake,5,60\n");

        let response = harness
            .app()
            .oneshot(multipart_request(&[("a.csv", &first), ("b.csv", &second)]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Failed to persist uploaded data");
        assert_eq!(harness.store.count().unwrap(), 0);
        assert_eq!(harness.leftover_uploads(), 0);
    }

    #[tokio::test]
    async fn test_malformed_number_is_bad_request() {
        let harness = Harness::new();
        let csv = format!("{HEADER}Edamame,Appetizers,lots,20\n");

        let response = harness
            .app()
            .oneshot(multipart_request(&[("bad.csv", &csv)]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(harness.store.count().unwrap(), 0);
        assert_eq!(harness.leftover_uploads(), 0);
    }

    #[tokio::test]
    async fn test_non_finite_revenue_is_bad_request() {
        for revenue in ["NaN", "inf"] {
            let harness = Harness::new();
            let csv = format!("{HEADER}House Red,Wine,3,45\nProsecco,Wine,1,{revenue}\n");

            let response = harness
                .app()
                .oneshot(multipart_request(&[("odd.csv", &csv)]))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "revenue {revenue}");
            assert!(body_text(response).await.contains("Revenue"));
            assert_eq!(harness.store.count().unwrap(), 0);
            assert_eq!(harness.leftover_uploads(), 0);
        }
    }

    #[tokio::test]
    async fn test_stalled_upload_times_out_and_removes_file() {
        use std::time::Duration;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let mut harness = Harness::new();
        harness.config.request_timeout = Duration::from_secs(1);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = harness.app();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        // Announce a large body, send one partial file part, then go quiet
        let head = format!(
            "POST /upload HTTP/1.1\r\n\
             Host: {addr}\r\n\
             Content-Type: multipart/form-data; boundary={BOUNDARY}\r\n\
             Content-Length: 100000\r\n\r\n"
        );
        let part = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"files\"; filename=\"slow.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n\
             {HEADER}Spicy Tuna Roll,Sushi Rolls,12,180\n"
        );
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(head.as_bytes()).await.unwrap();
        stream.write_all(part.as_bytes()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(harness.leftover_uploads(), 1, "file exists while the body is pending");

        let mut buf = vec![0u8; 1024];
        let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
            .await
            .expect("no response before the request deadline")
            .unwrap();
        let response = String::from_utf8_lossy(&buf[..read]);

        assert!(response.starts_with("HTTP/1.1 408"), "unexpected response: {response}");
        assert_eq!(harness.leftover_uploads(), 0);
        assert_eq!(harness.store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let mut harness = Harness::new();
        harness.config.max_upload_bytes = 64;
        let csv = format!("{HEADER}{}", "Spicy Tuna Roll,Sushi Rolls,12,180\n".repeat(20));

        let response = harness
            .app()
            .oneshot(multipart_request(&[("big.csv", &csv)]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(harness.store.count().unwrap(), 0);
        assert_eq!(harness.leftover_uploads(), 0);
    }

    #[tokio::test]
    async fn test_read_endpoints() {
        let harness = Harness::new();
        harness
            .store
            .persist_batch(&[
                SalesRecord::new("House Red", "Wine", 3, 45.0),
                SalesRecord::new("Junmai", "Sake", 5, 60.0),
                SalesRecord::new("IPA", "Beer", 4, 28.0),
            ])
            .unwrap();

        let sales = harness
            .app()
            .oneshot(Request::get("/api/sales").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let sales = body_json(sales).await;
        assert_eq!(sales["success"], true);
        assert_eq!(sales["data"].as_array().unwrap().len(), 3);
        assert_eq!(sales["data"][0]["itemName"], "House Red");

        let categories = harness
            .app()
            .oneshot(Request::get("/api/categories").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            body_json(categories).await["data"],
            serde_json::json!(["Beer", "Sake", "Wine"])
        );
    }

    #[tokio::test]
    async fn test_dashboard_filters_by_category() {
        let harness = Harness::new();
        harness
            .store
            .persist_batch(&[
                SalesRecord::new("House Red", "Wine", 3, 45.0),
                SalesRecord::new("Junmai", "Sake", 5, 60.0),
                SalesRecord::new("IPA", "Beer", 4, 28.0),
            ])
            .unwrap();

        let request = Request::post("/api/dashboard")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"categories":["Wine","Beer"]}"#))
            .unwrap();
        let response = harness.app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let labels: Vec<&str> = json["data"]["unitsChart"]["bars"]
            .as_array()
            .unwrap()
            .iter()
            .map(|bar| bar["label"].as_str().unwrap())
            .collect();
        assert_eq!(labels, vec!["House Red", "IPA"]);
        assert_eq!(json["data"]["revenueChart"]["bars"][1]["value"], 28.0);
    }

    #[tokio::test]
    async fn test_dashboard_with_empty_selection_is_empty() {
        let harness = Harness::new();
        harness
            .store
            .persist_batch(&[SalesRecord::new("House Red", "Wine", 3, 45.0)])
            .unwrap();

        let request = Request::post("/api/dashboard")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"categories":[]}"#))
            .unwrap();
        let json = body_json(harness.app().oneshot(request).await.unwrap()).await;

        assert!(json["data"]["cards"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_health_and_index() {
        let harness = Harness::new();

        let health = harness
            .app()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            body_json(health).await,
            serde_json::json!({ "success": true, "data": "OK" })
        );

        let index = harness
            .app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(index.status(), StatusCode::OK);
        assert!(body_text(index).await.contains("Sales Dashboard"));
    }
}
