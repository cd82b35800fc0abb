//! Data export/import endpoints against a mock HTTP server.

use backoffice_core::domains::core::ApiClient;
use backoffice_core::domains::data_export::{
    ApiDataExportService, DataExportService, ExportFormat, HistoryQuery, JobStatus, StartExportRequest,
};
use backoffice_core::{ClientConfig, EntityType, Language, ServiceError, UploadFile};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service(server: &MockServer) -> ApiDataExportService {
    let config = ClientConfig::new(&format!("{}/api/v1", server.uri()))
        .with_token("test-token")
        .with_language(Language::Ar)
        .with_retry_attempts(1);
    ApiDataExportService::new(ApiClient::new(&config).unwrap())
}

fn export_job(status: &str) -> serde_json::Value {
    serde_json::json!({
        "_id": "exp-42",
        "entityType": "clients",
        "format": "csv",
        "status": status,
        "totalRecords": 0
    })
}

#[tokio::test]
async fn test_start_export_sends_auth_and_omits_columns_for_all() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/exports"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("accept-language", "ar"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "success": true,
            "data": export_job("pending")
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = StartExportRequest {
        entity_type: EntityType::Clients,
        format: ExportFormat::Csv,
        columns: None,
        include_related: false,
        language: Language::Ar,
    };
    let job = service(&server).start_export(&request).await.unwrap();
    assert_eq!(job.id, "exp-42");
    assert_eq!(job.status, JobStatus::Pending);

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["entityType"], "clients");
    assert_eq!(body["format"], "csv");
    assert_eq!(body["language"], "ar");
    assert!(body.get("columns").is_none());
}

#[tokio::test]
async fn test_start_export_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/exports"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let request = StartExportRequest {
        entity_type: EntityType::Invoices,
        format: ExportFormat::Xlsx,
        columns: Some(vec!["invoiceNumber".to_string()]),
        include_related: true,
        language: Language::En,
    };
    let err = service(&server).start_export(&request).await.unwrap_err();
    assert_eq!(err.code(), "SERVER_ERROR");
}

#[tokio::test]
async fn test_preview_upload_is_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/imports/preview"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": {
                "columns": ["Name", "Email"],
                "totalRows": 2,
                "suggestedMapping": {"Name": "fullName", "Email": "email"},
                "sampleRows": [["Ali", "ali@example.com"]]
            }
        })))
        .mount(&server)
        .await;

    let file = UploadFile::new("clients.csv", b"Name,Email\nAli,ali@example.com\n".to_vec());
    let preview = service(&server).preview_import(&file, EntityType::Clients).await.unwrap();
    assert_eq!(preview.columns, vec!["Name", "Email"]);
    assert_eq!(preview.total_rows, 2);

    let received = server.received_requests().await.unwrap();
    let content_type = received[0]
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&received[0].body);
    assert!(body.contains("name=\"entityType\""));
    assert!(body.contains("clients"));
    assert!(body.contains("filename=\"clients.csv\""));
    assert!(body.contains("text/csv"));
}

#[tokio::test]
async fn test_import_status_unwraps_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/imports/imp-7/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": {
                "_id": "imp-7",
                "entityType": "cases",
                "status": "processing",
                "totalRecords": 10,
                "successCount": 4,
                "errorCount": 1,
                "skippedCount": 0,
                "progress": 50
            }
        })))
        .mount(&server)
        .await;

    let job = service(&server).import_status("imp-7").await.unwrap();
    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.processed_count(), 5);
    assert_eq!(job.progress, 50.0);
}

#[tokio::test]
async fn test_download_passes_file_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/exports/exp-42/download"))
        .and(query_param("fileName", "clients.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"id,name\n".to_vec()))
        .mount(&server)
        .await;

    let bytes = service(&server).download_export("exp-42", "clients.csv").await.unwrap();
    assert_eq!(bytes, b"id,name\n");
}

#[tokio::test]
async fn test_history_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/exports/history"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/exports/history"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
            "_id": "exp-41",
            "entityType": "clients",
            "format": "csv",
            "status": "completed",
            "totalRecords": 3,
            "fileSize": 2048,
            "fileName": "clients.csv"
        }])))
        .mount(&server)
        .await;

    let jobs = service(&server)
        .export_history(HistoryQuery { limit: Some(20), page: None })
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0].can_download());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_rate_limit_reads_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/imports/history"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .expect(1)
        .mount(&server)
        .await;

    let err = service(&server).import_history(HistoryQuery::default()).await.unwrap_err();
    assert_eq!(err, ServiceError::RateLimited { retry_after: 7 });
}

#[tokio::test]
async fn test_error_body_is_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/export-templates"))
        .and(query_param("entityType", "staff"))
        .and(query_param("format", "xlsx"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": true,
            "message": "Template not found",
            "messageAr": "القالب غير موجود",
            "requestId": "req-9"
        })))
        .mount(&server)
        .await;

    let err = service(&server)
        .download_template(EntityType::Staff, ExportFormat::Xlsx)
        .await
        .unwrap_err();
    match err {
        ServiceError::Api(api) => {
            assert_eq!(api.status, 404);
            assert_eq!(api.message, "Template not found");
            assert_eq!(api.message_ar.as_deref(), Some("القالب غير موجود"));
            assert_eq!(api.request_id.as_deref(), Some("req-9"));
        }
        other => panic!("expected API error, got {:?}", other),
    }
}
