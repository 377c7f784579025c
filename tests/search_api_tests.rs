use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sirene_area_search::data::DatasetCache;
use sirene_area_search::search::SearchService;
use sirene_area_search::server::router;
use sirene_area_search::store::{IndexedEngine, MemoryStore};
use sirene_area_search::types::{EstablishmentPoint, Fields};
use std::io::Write;
use std::sync::Arc;
use tower::ServiceExt;

const GEO: &str = "Géolocalisation de l'établissement";

fn cities_csv() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(
        file,
        "SIRET,Dénomination,{GEO},Commune\n\
         11111111100011,Boulangerie du Marais,\"48.86,2.35\",PARIS\n\
         22222222200022,Bouchon Lyonnais,\"45.76,4.83\",LYON\n\
         33333333300033,Savonnerie,\"43.30,5.37\",MARSEILLE\n\
         44444444400044,Sans adresse,,PARIS\n"
    )
    .expect("write csv");
    file.flush().expect("flush csv");
    file
}

fn sample_app(file: &tempfile::NamedTempFile) -> Router {
    let service = SearchService::sample(DatasetCache::new(file.path(), GEO, b','), 5000);
    router(Arc::new(service), None)
}

fn paris_box() -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[[2.0, 48.5], [2.0, 49.0], [2.7, 49.0], [2.7, 48.5], [2.0, 48.5]]]
    })
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("router should respond");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_search(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/search")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

#[tokio::test]
async fn paris_box_returns_only_paris() {
    let file = cities_csv();
    let request = post_search(json!({ "geometry": paris_box() }));
    let (status, body) = call(sample_app(&file), request).await;

    assert_eq!(status, StatusCode::OK);
    let points = body["points"].as_array().expect("points array");
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["fields"]["SIRET"], "11111111100011");
    assert_eq!(points[0]["fields"]["Commune"], "PARIS");
    assert_eq!(points[0]["latitude"], 48.86);
    assert_eq!(points[0]["longitude"], 2.35);
    assert!(points[0]["fields"].get(GEO).is_none());

    assert_eq!(body["columns"], json!(["SIRET", "Dénomination", "Commune"]));
    assert_eq!(body["isSampleSource"], true);
}

#[tokio::test]
async fn null_geometry_clears_results_but_keeps_columns() {
    let file = cities_csv();
    let (status, body) = call(sample_app(&file), post_search(json!({ "geometry": null }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points"], json!([]));
    assert_eq!(body["columns"], json!(["SIRET", "Dénomination", "Commune"]));
    assert_eq!(body["isSampleSource"], true);
}

#[tokio::test]
async fn malformed_geometry_is_bad_request() {
    let file = cities_csv();
    let (status, body) = call(
        sample_app(&file),
        post_search(json!({ "geometry": { "coordinates": "not-an-array" } })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body.get("points").is_none());
}

#[tokio::test]
async fn unparsable_body_is_bad_request() {
    let file = cities_csv();
    let request = Request::builder()
        .method("POST")
        .uri("/api/search")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("request");
    let (status, body) = call(sample_app(&file), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn columns_endpoint_works_before_any_search() {
    let file = cities_csv();
    let (status, body) = call(sample_app(&file), get("/api/columns")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["columns"], json!(["SIRET", "Dénomination", "Commune"]));
    assert_eq!(body["isSampleSource"], true);
}

#[tokio::test]
async fn missing_sample_file_is_a_generic_server_error() {
    let cache = DatasetCache::new("/nonexistent/sample.csv", GEO, b',');
    let service = SearchService::sample(cache, 10);
    let app = router(Arc::new(service), None);
    let (status, body) = call(app, post_search(json!({ "geometry": paris_box() }))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "internal");
    let message = body["error"]["message"].as_str().unwrap_or_default();
    assert!(!message.contains("nonexistent"));
}

#[tokio::test]
async fn presets_and_health_are_listed() {
    let file = cities_csv();
    let (status, body) = call(sample_app(&file), get("/api/presets")).await;
    assert_eq!(status, StatusCode::OK);
    let presets = body.as_array().expect("preset array");
    assert!(presets.iter().any(|p| p["id"] == "active" && p["group"] == "Status"));
    assert!(presets.iter().all(|p| p.get("rule").is_none()));

    let (status, body) = call(sample_app(&file), get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "sample");
}

#[tokio::test]
async fn indexed_backend_caps_and_reports_production_source() {
    let keys: Arc<[String]> = vec!["SIRET".to_string(), "Commune".to_string()].into();
    let points: Vec<EstablishmentPoint> = (0..6_000)
        .map(|i| EstablishmentPoint {
            latitude: 48.8 + (i % 100) as f64 * 0.001,
            longitude: 2.3,
            fields: Fields::new(keys.clone(), vec![format!("{i:014}"), "PARIS".to_string()]),
        })
        .collect();
    let engine = IndexedEngine::new(Arc::new(MemoryStore::new(points)), 5000);
    let app = router(Arc::new(SearchService::indexed(engine)), None);

    let (status, body) = call(app, post_search(json!({ "geometry": paris_box() }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points"].as_array().map(Vec::len), Some(5000));
    assert_eq!(body["columns"], json!(["SIRET", "Commune"]));
    assert_eq!(body["isSampleSource"], false);
}
