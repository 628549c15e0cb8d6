//! Account upload integration tests using wiremock

use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use xero_coa::{Account, UploadError, UploadOutcome, UploadSummary, Uploader};

const ACCOUNTS_PATH: &str = "/api.xro/2.0/Accounts";

fn account(code: &str) -> Account {
    Account {
        code: code.to_string(),
        name: format!("Test{code}"),
        account_type: "EXPENSE".to_string(),
        description: "An expenditure that has been paid for in advance.".to_string(),
    }
}

fn uploader(server: &MockServer) -> Uploader {
    Uploader::new(reqwest::Client::new(), &server.uri(), "abc123", "tenant-1")
}

#[tokio::test]
async fn test_upload_sends_account_with_tenant_headers() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(ACCOUNTS_PATH))
        .and(header("authorization", "Bearer abc123"))
        .and(header("xero-tenant-id", "tenant-1"))
        .and(body_json(serde_json::json!({
            "Code": "1001",
            "Name": "Test1001",
            "Type": "EXPENSE",
            "Description": "An expenditure that has been paid for in advance."
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = uploader(&server).upload_account(&account("1001")).await.unwrap();

    assert_eq!(outcome, UploadOutcome::Created);
}

#[tokio::test]
async fn test_duplicate_account_counts_as_existing() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(ACCOUNTS_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string(
            r#"{"Elements":[{"ValidationErrors":[{"Message":"Please enter a unique Code."}]}]}"#,
        ))
        .mount(&server)
        .await;

    let outcome = uploader(&server).upload_account(&account("1001")).await.unwrap();

    assert_eq!(outcome, UploadOutcome::AlreadyExists);
}

#[tokio::test]
async fn test_rejected_account_reports_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(ACCOUNTS_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("AuthenticationUnsuccessful"))
        .mount(&server)
        .await;

    let err = uploader(&server)
        .upload_account(&account("1001"))
        .await
        .unwrap_err();

    match err {
        UploadError::Rejected { code, status, body } => {
            assert_eq!(code, "1001");
            assert_eq!(status, 401);
            assert_eq!(body, "AuthenticationUnsuccessful");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_upload_all_tallies_each_account_once() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(ACCOUNTS_PATH))
        .and(body_json(serde_json::to_value(account("1")).unwrap()))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(ACCOUNTS_PATH))
        .and(body_json(serde_json::to_value(account("2")).unwrap()))
        .respond_with(ResponseTemplate::new(400).set_body_string("Please enter a unique Name."))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(ACCOUNTS_PATH))
        .and(body_json(serde_json::to_value(account("3")).unwrap()))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(ACCOUNTS_PATH))
        .and(body_json(serde_json::to_value(account("4")).unwrap()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let accounts = vec![account("1"), account("2"), account("3"), account("4")];
    let summary = uploader(&server).upload_all(accounts, 2).await;

    assert_eq!(
        summary,
        UploadSummary {
            created: 2,
            already_exists: 1,
            failed: 1,
        }
    );
}

#[tokio::test]
async fn test_upload_all_with_no_accounts_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let summary = uploader(&server).upload_all(Vec::new(), 0).await;

    assert_eq!(summary, UploadSummary::default());
}
