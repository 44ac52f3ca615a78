use quartzbio_client::{
    md5sum, NoAuth, ObjectRecord, QuartzBioClient, QuartzBioResult, RetryPolicy, UploadOptions,
    UploadPhase,
};
use serde_json::{json, Value};
use std::io::Write;
use tempfile::NamedTempFile;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use std::path::PathBuf;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const CONTENTS: &[u8] = b"0123456789";

/// Helper to create a test client that never retries
fn create_test_client(server: &MockServer) -> QuartzBioResult<QuartzBioClient> {
    Ok(QuartzBioClient::new(server.uri(), NoAuth)?.with_retry(RetryPolicy::none()))
}

/// Helper to write a local file to upload
fn create_test_file(contents: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents).unwrap();
    file.flush().unwrap();
    file
}

/// 10 bytes in parts of 4: three parts of 4, 4 and 2 bytes
fn multipart_options() -> UploadOptions {
    UploadOptions {
        multipart_threshold: Some(8),
        multipart_chunksize: 4,
        ..Default::default()
    }
}

async fn mount_create_object(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v2/objects"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 7,
            "filename": "reads.txt",
            "object_type": "file",
            "upload_url": format!("{}/upload/single", server.uri()),
        })))
        .mount(server)
        .await;
}

async fn mount_initiate(server: &MockServer, parts: u64) {
    let part_urls: Vec<String> = (1..=parts)
        .map(|n| format!("{}/upload/parts/{}", server.uri(), n))
        .collect();
    Mock::given(method("POST"))
        .and(path("/v2/objects/7/multipart-upload"))
        .and(body_partial_json(json!({ "parts": parts })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "upload_id": "up-1",
            "part_urls": part_urls,
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_part(server: &MockServer, n: u64, status: u16, expected: u64) {
    Mock::given(method("PUT"))
        .and(path(format!("/upload/parts/{}", n)))
        .respond_with(
            ResponseTemplate::new(status)
                .insert_header("ETag", format!("\"etag-{}\"", n).as_str())
                .set_body_string(if status == 200 { "" } else { "storage unavailable" }),
        )
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_cleanup(server: &MockServer, expected: u64) {
    Mock::given(method("DELETE"))
        .and(path("/v2/objects/7/multipart-upload"))
        .and(body_partial_json(json!({"upload_id": "up-1"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(expected)
        .mount(server)
        .await;
    mount_force_delete(server, expected).await;
}

async fn mount_force_delete(server: &MockServer, expected: u64) {
    Mock::given(method("DELETE"))
        .and(path("/v2/objects/7"))
        .and(query_param("force", "true"))
        .respond_with(ResponseTemplate::new(204))
        .expect(expected)
        .mount(server)
        .await;
}

async fn received(server: &MockServer, http_method: &str, url_path: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == http_method && r.url.path() == url_path)
        .map(|r| serde_json::from_slice(&r.body).unwrap_or(Value::Null))
        .collect()
}

/// Test a small file going up in one PUT
#[tokio::test]
async fn test_single_part_upload() {
    let _ = env_logger::try_init();
    let server = MockServer::start().await;
    let file = create_test_file(CONTENTS);
    let digest = md5sum(file.path(), 4).await.unwrap();

    mount_create_object(&server).await;
    Mock::given(method("PUT"))
        .and(path("/upload/single"))
        .and(header("content-md5", "eB5eJF1ptWaXm4bijSPyxw=="))
        .and(header("content-type", "text/plain"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/objects/7/multipart-upload"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let client = create_test_client(&server).unwrap();
    let options = UploadOptions {
        content_type: Some("text/plain".to_string()),
        ..Default::default()
    };
    let object = client
        .objects()
        .upload_file(file.path(), "vault-1", "/reads", &options)
        .await
        .unwrap();
    assert_eq!(object.id, "7");

    let created = received(&server, "POST", "/v2/objects").await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0]["vault_id"], json!("vault-1"));
    assert_eq!(created[0]["parent_path"], json!("/reads"));
    assert_eq!(created[0]["object_type"], json!("file"));
    assert_eq!(created[0]["size"], json!(10));
    assert_eq!(created[0]["md5"], json!(digest.md5));
    assert_eq!(created[0]["mimetype"], json!("text/plain"));
}

/// Test a failed single-part PUT removing the object again
#[tokio::test]
async fn test_single_part_failure_deletes_object() {
    let _ = env_logger::try_init();
    let server = MockServer::start().await;
    let file = create_test_file(CONTENTS);

    mount_create_object(&server).await;
    Mock::given(method("PUT"))
        .and(path("/upload/single"))
        .respond_with(ResponseTemplate::new(403).set_body_string("AccessDenied"))
        .mount(&server)
        .await;
    mount_force_delete(&server, 1).await;

    let client = create_test_client(&server).unwrap();
    let err = client
        .objects()
        .upload_file(file.path(), "vault-1", "/", &UploadOptions::default())
        .await
        .unwrap_err();

    let failure = err.upload_failure().unwrap();
    assert_eq!(failure.phase, UploadPhase::SinglePart);
    assert!(failure.message.contains("AccessDenied"));
}

/// Test a large file going up in parts, in order
#[tokio::test]
async fn test_multipart_upload() {
    let _ = env_logger::try_init();
    let server = MockServer::start().await;
    let file = create_test_file(CONTENTS);
    let digest = md5sum(file.path(), 4).await.unwrap();

    mount_create_object(&server).await;
    mount_initiate(&server, 3).await;
    for n in 1..=3 {
        mount_part(&server, n, 200, 1).await;
    }
    Mock::given(method("POST"))
        .and(path("/v2/objects/7/multipart-upload/complete"))
        .and(body_partial_json(json!({
            "upload_id": "up-1",
            "md5": digest.md5,
            "parts": [
                {"part_number": 1, "etag": "\"etag-1\""},
                {"part_number": 2, "etag": "\"etag-2\""},
                {"part_number": 3, "etag": "\"etag-3\""},
            ],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "completed"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_cleanup(&server, 0).await;

    let client = create_test_client(&server).unwrap();
    let object = client
        .objects()
        .upload_file(file.path(), "vault-1", "/", &multipart_options())
        .await
        .unwrap();
    assert_eq!(object.id, "7");

    let requests = server.received_requests().await.unwrap();
    let parts: Vec<(String, Vec<u8>)> = requests
        .iter()
        .filter(|r| r.method.as_str() == "PUT")
        .map(|r| (r.url.path().to_string(), r.body.clone()))
        .collect();
    assert_eq!(
        parts,
        vec![
            ("/upload/parts/1".to_string(), b"0123".to_vec()),
            ("/upload/parts/2".to_string(), b"4567".to_vec()),
            ("/upload/parts/3".to_string(), b"89".to_vec()),
        ]
    );

    let part_md5 = requests
        .iter()
        .find(|r| r.url.path() == "/upload/parts/3")
        .and_then(|r| r.headers.get("content-md5"))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    assert_eq!(part_md5.as_deref(), Some("dkeWa3NDwpBIZzJS5JD3Ng=="));
}

/// Test that a failed part aborts the upload and removes the object
#[tokio::test]
async fn test_failed_part_cleans_up() {
    let _ = env_logger::try_init();
    let server = MockServer::start().await;
    let file = create_test_file(CONTENTS);

    mount_create_object(&server).await;
    mount_initiate(&server, 3).await;
    mount_part(&server, 1, 200, 1).await;
    mount_part(&server, 2, 500, 1).await;
    mount_part(&server, 3, 200, 0).await;
    Mock::given(method("POST"))
        .and(path("/v2/objects/7/multipart-upload/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "completed"})))
        .expect(0)
        .mount(&server)
        .await;
    mount_cleanup(&server, 1).await;

    let client = create_test_client(&server).unwrap();
    let err = client
        .objects()
        .upload_file(file.path(), "vault-1", "/", &multipart_options())
        .await
        .unwrap_err();

    let failure = err.upload_failure().unwrap();
    assert_eq!(failure.phase, UploadPhase::UploadPart);
    assert_eq!(failure.part, Some(2));
    assert!(err.to_string().contains("Failed to upload part 2"));
    assert!(err.to_string().contains("storage unavailable"));
}

/// Test that a rejected complete aborts the upload and removes the object
#[tokio::test]
async fn test_failed_complete_cleans_up() {
    let _ = env_logger::try_init();
    let server = MockServer::start().await;
    let file = create_test_file(CONTENTS);

    mount_create_object(&server).await;
    mount_initiate(&server, 3).await;
    for n in 1..=3 {
        mount_part(&server, n, 200, 1).await;
    }
    Mock::given(method("POST"))
        .and(path("/v2/objects/7/multipart-upload/complete"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "failed", "error": "MD5 mismatch"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_cleanup(&server, 1).await;

    let client = create_test_client(&server).unwrap();
    let err = client
        .objects()
        .upload_file(file.path(), "vault-1", "/", &multipart_options())
        .await
        .unwrap_err();

    let failure = err.upload_failure().unwrap();
    assert_eq!(failure.phase, UploadPhase::Complete);
    assert!(err.to_string().contains("Failed to complete multipart upload"));
    assert!(err.to_string().contains("MD5 mismatch"));
}

/// Test falling back to one PUT when no upload id is handed out
#[tokio::test]
async fn test_missing_upload_id_falls_back() {
    let _ = env_logger::try_init();
    let server = MockServer::start().await;
    let file = create_test_file(CONTENTS);

    Mock::given(method("POST"))
        .and(path("/v2/objects"))
        .and(body_partial_json(json!({
            "description": "sequencing run 12",
            "tags": ["raw", "run-12"],
            "archive_folder": "/archive",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 7,
            "upload_url": format!("{}/upload/single", server.uri()),
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/objects/7/multipart-upload"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"upload_id": ""})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/single"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    mount_cleanup(&server, 0).await;

    let client = create_test_client(&server).unwrap();
    let options = UploadOptions {
        description: Some("sequencing run 12".to_string()),
        tags: vec!["raw".to_string(), "run-12".to_string()],
        archive_folder: Some("/archive".to_string()),
        ..multipart_options()
    };
    let object = client
        .objects()
        .upload_file(file.path(), "vault-1", "/", &options)
        .await
        .unwrap();
    assert_eq!(object.id, "7");

    let puts = received(&server, "PUT", "/upload/single").await;
    assert_eq!(puts.len(), 1);
}

/// Test falling back to one PUT when multipart upload is not supported
#[tokio::test]
async fn test_unsupported_multipart_falls_back() {
    let _ = env_logger::try_init();
    let server = MockServer::start().await;
    let file = create_test_file(CONTENTS);

    mount_create_object(&server).await;
    Mock::given(method("POST"))
        .and(path("/v2/objects/7/multipart-upload"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/single"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    mount_cleanup(&server, 0).await;

    let client = create_test_client(&server).unwrap();
    client
        .objects()
        .upload_file(file.path(), "vault-1", "/", &multipart_options())
        .await
        .unwrap();
}

/// Test that other initiate errors are fatal and leave nothing to abort
#[tokio::test]
async fn test_initiate_error() {
    let _ = env_logger::try_init();
    let server = MockServer::start().await;
    let file = create_test_file(CONTENTS);

    mount_create_object(&server).await;
    Mock::given(method("POST"))
        .and(path("/v2/objects/7/multipart-upload"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "boom"})))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    mount_force_delete(&server, 1).await;

    let client = create_test_client(&server).unwrap();
    let err = client
        .objects()
        .upload_file(file.path(), "vault-1", "/", &multipart_options())
        .await
        .unwrap_err();
    assert_eq!(err.upload_failure().unwrap().phase, UploadPhase::Initiate);
}

/// Test that a part URL count that does not match the file aborts
#[tokio::test]
async fn test_part_url_count_mismatch() {
    let _ = env_logger::try_init();
    let server = MockServer::start().await;
    let file = create_test_file(CONTENTS);

    mount_create_object(&server).await;
    Mock::given(method("POST"))
        .and(path("/v2/objects/7/multipart-upload"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "upload_id": "up-1",
            "part_urls": [format!("{}/upload/parts/1", server.uri())],
        })))
        .mount(&server)
        .await;
    mount_part(&server, 1, 200, 0).await;
    mount_cleanup(&server, 1).await;

    let client = create_test_client(&server).unwrap();
    let err = client
        .objects()
        .upload_file(file.path(), "vault-1", "/", &multipart_options())
        .await
        .unwrap_err();
    assert_eq!(err.upload_failure().unwrap().phase, UploadPhase::Initiate);
}

/// Test that an empty file completes with no parts
#[tokio::test]
async fn test_zero_byte_multipart() {
    let _ = env_logger::try_init();
    let server = MockServer::start().await;
    let file = create_test_file(b"");

    mount_initiate(&server, 0).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/objects/7/multipart-upload/complete"))
        .and(body_partial_json(json!({
            "upload_id": "up-1",
            "md5": "d41d8cd98f00b204e9800998ecf8427e",
            "parts": [],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "completed"})))
        .expect(1)
        .mount(&server)
        .await;

    let object: ObjectRecord = serde_json::from_value(json!({
        "id": 7,
        "upload_url": format!("{}/upload/single", server.uri()),
    }))
    .unwrap();

    let client = create_test_client(&server).unwrap();
    client
        .objects()
        .upload_multipart(&object, file.path(), &multipart_options())
        .await
        .unwrap();

    let completed = received(&server, "POST", "/v2/objects/7/multipart-upload/complete").await;
    assert_eq!(completed[0]["parts"], json!([]));
}

/// Test retrying a part after a transient server error
#[tokio::test]
async fn test_part_retry() {
    let _ = env_logger::try_init();
    let server = MockServer::start().await;
    let file = create_test_file(CONTENTS);

    mount_create_object(&server).await;
    mount_initiate(&server, 3).await;
    mount_part(&server, 1, 200, 1).await;
    Mock::given(method("PUT"))
        .and(path("/upload/parts/2"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_part(&server, 2, 200, 1).await;
    mount_part(&server, 3, 200, 1).await;
    Mock::given(method("POST"))
        .and(path("/v2/objects/7/multipart-upload/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "completed"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_cleanup(&server, 0).await;

    let client = QuartzBioClient::new(server.uri(), NoAuth)
        .unwrap()
        .with_retry(RetryPolicy {
            max_retries: 2,
            backoff: std::time::Duration::from_millis(1),
        });
    client
        .objects()
        .upload_file(file.path(), "vault-1", "/", &multipart_options())
        .await
        .unwrap();
}

/// Test the plain object record calls
#[tokio::test]
async fn test_object_records() {
    let _ = env_logger::try_init();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/objects"))
        .and(body_partial_json(json!({
            "vault_id": "vault-1",
            "parent_path": "/",
            "filename": "notes",
            "object_type": "folder",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 9,
            "filename": "notes",
            "object_type": "folder",
            "full_path": "acme:vault-1:/notes",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/objects/9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "9",
            "filename": "notes",
            "tags": ["shared"],
            "created_at": "2024-01-02T03:04:05Z",
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v2/objects/9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_test_client(&server).unwrap();
    let request = quartzbio_client::ObjectCreateRequest {
        vault_id: "vault-1".to_string(),
        parent_path: "/".to_string(),
        filename: "notes".to_string(),
        object_type: "folder".to_string(),
        size: None,
        md5: None,
        mimetype: None,
        description: None,
        tags: Vec::new(),
        archive_folder: None,
        storage_class: None,
    };
    let created = client.objects().create(&request).await.unwrap();
    assert_eq!(created.full_path.as_deref(), Some("acme:vault-1:/notes"));

    let fetched = client.objects().get("9").await.unwrap();
    assert_eq!(fetched.tags, vec!["shared".to_string()]);
    assert!(fetched.created_at.is_some());

    client.objects().delete("9", false).await.unwrap();
    let deletes = server.received_requests().await.unwrap();
    let delete = deletes.iter().find(|r| r.method.as_str() == "DELETE").unwrap();
    assert_eq!(delete.url.query(), None);
}

/// Accepts a part, then empties the file being uploaded
struct TruncateSource {
    path: PathBuf,
}

impl Respond for TruncateSource {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        std::fs::OpenOptions::new()
            .write(true)
            .open(&self.path)
            .and_then(|file| file.set_len(0))
            .unwrap();
        ResponseTemplate::new(200).insert_header("ETag", "\"etag-1\"")
    }
}

/// Test that a local read failure mid-upload aborts and removes the object
#[tokio::test]
async fn test_read_failure_cleans_up() {
    let _ = env_logger::try_init();
    let server = MockServer::start().await;
    let file = create_test_file(CONTENTS);

    mount_create_object(&server).await;
    mount_initiate(&server, 3).await;
    Mock::given(method("PUT"))
        .and(path("/upload/parts/1"))
        .respond_with(TruncateSource {
            path: file.path().to_path_buf(),
        })
        .expect(1)
        .mount(&server)
        .await;
    mount_part(&server, 2, 200, 0).await;
    mount_part(&server, 3, 200, 0).await;
    Mock::given(method("POST"))
        .and(path("/v2/objects/7/multipart-upload/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "completed"})))
        .expect(0)
        .mount(&server)
        .await;
    mount_cleanup(&server, 1).await;

    let client = create_test_client(&server).unwrap();
    let err = client
        .objects()
        .upload_file(file.path(), "vault-1", "/", &multipart_options())
        .await
        .unwrap_err();

    let failure = err.upload_failure().unwrap();
    assert_eq!(failure.phase, UploadPhase::UploadPart);
    assert_eq!(failure.part, Some(2));
    assert!(err.to_string().contains("Failed to upload part 2"));
}
