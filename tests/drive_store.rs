//! Google Drive object store and token exchange against a mock server.

use notion_attachments::{
    AccessTokenSource, AppError, DriveConfig, GoogleDriveStore, MediaCategory, ObjectStore,
    ServiceAccountKey,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{
    body_partial_json, body_string_contains, header, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_PRIVATE_KEY: &str = include_str!("fixtures/test_rsa_key.pem");

fn store(server: &MockServer, root_folder: Option<&str>) -> GoogleDriveStore {
    let config = DriveConfig::new()
        .unwrap()
        .with_base_url(&server.uri())
        .unwrap()
        .with_root_folder(root_folder.map(str::to_string));
    GoogleDriveStore::new(config, AccessTokenSource::fixed("ya29.test")).unwrap()
}

async fn mount_upload(server: &MockServer, file_id: &str) {
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "media"))
        .and(header("Authorization", "Bearer ya29.test"))
        .and(header("Content-Type", "image/png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": file_id, "parents": ["drive-root"] })),
        )
        .mount(server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("/drive/v3/files/{}", file_id)))
        .and(body_partial_json(json!({ "name": "photo.png" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": file_id })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn upload_names_shares_and_returns_embed_url() {
    let server = MockServer::start().await;
    mount_upload(&server, "file1").await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files/file1/permissions"))
        .and(body_partial_json(json!({ "type": "anyone", "role": "reader" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "anyoneWithLink" })))
        .expect(1)
        .mount(&server)
        .await;

    let stored = store(&server, None)
        .upload(b"png".to_vec(), "photo.png", "image/png", MediaCategory::Image)
        .await
        .unwrap();

    assert_eq!(stored.object_id, "file1");
    assert_eq!(
        stored.embed_url,
        "https://drive.google.com/uc?export=view&id=file1"
    );
}

#[tokio::test]
async fn uploads_are_moved_into_a_category_folder_created_once() {
    let server = MockServer::start().await;
    mount_upload(&server, "file1").await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files/file1/permissions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .and(body_partial_json(json!({
            "name": "images",
            "mimeType": "application/vnd.google-apps.folder",
            "parents": ["root-folder"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "images-folder" })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&server, Some("root-folder"));
    for _ in 0..2 {
        store
            .upload(b"png".to_vec(), "photo.png", "image/png", MediaCategory::Image)
            .await
            .unwrap();
    }

    let patches: Vec<_> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "PATCH")
        .collect();
    assert_eq!(patches.len(), 2);
    for patch in patches {
        let params: Vec<(String, String)> = patch.url.query_pairs().into_owned().collect();
        assert!(params.contains(&("addParents".to_string(), "images-folder".to_string())));
        assert!(params.contains(&("removeParents".to_string(), "drive-root".to_string())));
    }
}

#[tokio::test]
async fn uploads_without_root_folder_stay_where_they_land() {
    let server = MockServer::start().await;
    mount_upload(&server, "file1").await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files/file1/permissions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    store(&server, None)
        .upload(b"png".to_vec(), "photo.png", "image/png", MediaCategory::Image)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let patch = requests
        .iter()
        .find(|r| r.method.as_str() == "PATCH")
        .unwrap();
    assert_eq!(patch.url.query(), None);
}

#[tokio::test]
async fn failed_share_removes_the_uploaded_file() {
    let server = MockServer::start().await;
    mount_upload(&server, "file1").await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files/file1/permissions"))
        .respond_with(ResponseTemplate::new(403).set_body_string("sharing disabled"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/drive/v3/files/file1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let err = store(&server, None)
        .upload(b"png".to_vec(), "photo.png", "image/png", MediaCategory::Image)
        .await
        .unwrap_err();

    match err {
        AppError::ObjectStore { status, message } => {
            assert_eq!(status.as_u16(), 403);
            assert_eq!(message, "sharing disabled");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn service_account_tokens_are_exchanged_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.minted",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let key_json = json!({
        "type": "service_account",
        "client_email": "uploader@project.iam.gserviceaccount.com",
        "private_key": TEST_PRIVATE_KEY,
        "token_uri": format!("{}/token", server.uri()),
    })
    .to_string();
    let key = ServiceAccountKey::from_json(&key_json).unwrap();
    let source = AccessTokenSource::service_account(key, reqwest::Client::new());

    assert_eq!(source.token().await.unwrap(), "ya29.minted");
    assert_eq!(source.token().await.unwrap(), "ya29.minted");

    let requests = server.received_requests().await.unwrap();
    let form = String::from_utf8(requests[0].body.clone()).unwrap();
    let assertion = form
        .split('&')
        .find_map(|pair| pair.strip_prefix("assertion="))
        .unwrap();
    assert_eq!(assertion.split('.').count(), 3);
}

#[tokio::test]
async fn rejected_token_requests_are_authentication_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
        .mount(&server)
        .await;

    let key_json: Value = json!({
        "client_email": "uploader@project.iam.gserviceaccount.com",
        "private_key": TEST_PRIVATE_KEY,
        "token_uri": format!("{}/token", server.uri()),
    });
    let key = ServiceAccountKey::from_json(&key_json.to_string()).unwrap();
    let source = AccessTokenSource::service_account(key, reqwest::Client::new());

    assert!(matches!(
        source.token().await.unwrap_err(),
        AppError::Authentication(_)
    ));
}
