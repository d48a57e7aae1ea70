use chrono::NaiveDate;
use httptest::matchers::{all_of, contains, eq, json_decoded, request, url_decoded};
use httptest::responders::{json_encoded, status_code};
use httptest::{Expectation, Server};
use secrecy::SecretString;
use serde_json::json;
use tempfile::{tempdir, TempDir};

use complaint_dashboard::api::{
    ComplaintQuery, NewNotice, StatisticsQuery, VehicleStatus, LOGIN_ROUTE,
};
use complaint_dashboard::{
    storage_path, ApiClient, AppConfig, AppError, ComplaintStatus, LocalStore, SessionStore,
    TelemetryClient,
};

fn client(server: &Server, dir: &TempDir) -> ApiClient {
    let config = AppConfig {
        api_base_url: server.url("/api").to_string(),
        ..AppConfig::default()
    };
    let store = LocalStore::open(storage_path(dir.path(), "storage.json")).unwrap();
    ApiClient::new(&config, SessionStore::new(store)).unwrap()
}

fn signed_in(server: &Server, dir: &TempDir) -> ApiClient {
    let client = client(server, dir);
    client
        .session()
        .set_token(&SecretString::from("jwt-token".to_string()))
        .unwrap();
    client
}

#[tokio::test]
async fn unauthorized_response_ends_the_session() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/api/notices"),
            request::headers(contains(("authorization", "Bearer jwt-token"))),
        ])
        .respond_with(status_code(401)),
    );

    let dir = tempdir().unwrap();
    let config = AppConfig {
        telemetry_batch_size: 1,
        ..AppConfig::default()
    };
    let telemetry = TelemetryClient::new(dir.path(), &config).unwrap();
    let api = signed_in(&server, &dir).with_telemetry(telemetry.clone());

    let err = api.list_notices().await.unwrap_err();

    assert!(matches!(err, AppError::Unauthorized { redirect } if redirect == LOGIN_ROUTE));
    assert_eq!(err.status(), Some(401));
    assert!(!api.session().has_token());
    let buffer = std::fs::read_to_string(telemetry.buffer_path()).unwrap();
    assert!(buffer.contains("session_expired"));

    // The token is gone from disk too.
    let reopened = LocalStore::open(storage_path(dir.path(), "storage.json")).unwrap();
    assert!(!SessionStore::new(reopened).has_token());
}

#[tokio::test]
async fn lists_complaints_with_filters() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/api/complaints"),
            request::query(url_decoded(contains(("status", "RECEIVED")))),
            request::query(url_decoded(contains(("from", "2024-05-01")))),
            request::query(url_decoded(contains(("page", "2")))),
        ])
        .respond_with(json_encoded(json!([
            {
                "id": 3,
                "category": "일반쓰레기",
                "datetime": "2024-05-03T07:00:00",
                "status": "RECEIVED",
                "address": "서울 도봉구 도봉로 552"
            }
        ]))),
    );

    let dir = tempdir().unwrap();
    let api = signed_in(&server, &dir);
    let query = ComplaintQuery {
        status: Some(ComplaintStatus::Received),
        from: NaiveDate::from_ymd_opt(2024, 5, 1),
        page: Some(2),
        ..ComplaintQuery::default()
    };

    let complaints = api.list_complaints(&query).await.unwrap();

    assert_eq!(complaints.len(), 1);
    assert_eq!(complaints[0].id, 3);
    assert!(complaints[0].latitude.is_none());
}

#[tokio::test]
async fn updates_complaint_status() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("PATCH", "/api/complaints/3/status"),
            request::body(json_decoded(eq(json!({ "status": "COMPLETED" })))),
        ])
        .respond_with(json_encoded(json!({
            "data": {
                "id": 3,
                "category": "일반쓰레기",
                "datetime": "2024-05-03T07:00:00",
                "status": "COMPLETED",
                "address": "서울 도봉구 도봉로 552"
            }
        }))),
    );

    let dir = tempdir().unwrap();
    let api = signed_in(&server, &dir);

    let updated = api
        .update_complaint_status(3, ComplaintStatus::Completed)
        .await
        .unwrap();

    assert_eq!(updated.status, ComplaintStatus::Completed);
}

#[tokio::test]
async fn surfaces_backend_error_messages() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/api/complaints/404"))
            .respond_with(
                status_code(404).body(r#"{"message":"민원을 찾을 수 없습니다."}"#),
            ),
    );

    let dir = tempdir().unwrap();
    let api = signed_in(&server, &dir);

    let err = api.get_complaint(404).await.unwrap_err();

    match err {
        AppError::Status { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "민원을 찾을 수 없습니다.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(api.session().has_token());
}

#[tokio::test]
async fn manages_notices_vehicles_and_statistics() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/api/notices"),
            request::body(json_decoded(eq(json!({
                "title": "수거 일정 변경",
                "content": "설 연휴 기간 수거가 중단됩니다.",
                "pinned": true
            })))),
        ])
        .respond_with(json_encoded(json!({
            "id": 21,
            "title": "수거 일정 변경",
            "content": "설 연휴 기간 수거가 중단됩니다.",
            "pinned": true
        }))),
    );
    server.expect(
        Expectation::matching(request::method_path("DELETE", "/api/notices/21"))
            .respond_with(status_code(204)),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/api/vehicles")).respond_with(
            json_encoded(json!([
                { "id": 1, "plateNumber": "서울12가3456", "vehicleType": "압축진개차", "status": "OPERATING" },
                { "id": 2, "plateNumber": "서울34나7890", "status": "RETIRED" }
            ])),
        ),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/api/statistics/summary"),
            request::query(url_decoded(contains(("from", "2024-05-01")))),
            request::query(url_decoded(contains(("to", "2024-05-31")))),
        ])
        .respond_with(json_encoded(json!({
            "data": {
                "total": 10,
                "repeatCount": 2,
                "byCategory": [{ "category": "음식물", "count": 6 }],
                "byStatus": [{ "status": "COMPLETED", "count": 5 }],
                "daily": []
            }
        }))),
    );

    let dir = tempdir().unwrap();
    let api = signed_in(&server, &dir);

    let notice = api
        .create_notice(&NewNotice {
            title: "수거 일정 변경".into(),
            content: "설 연휴 기간 수거가 중단됩니다.".into(),
            pinned: true,
        })
        .await
        .unwrap();
    assert_eq!(notice.id, 21);
    api.delete_notice(notice.id).await.unwrap();

    let vehicles = api.list_vehicles().await.unwrap();
    assert_eq!(vehicles[0].status, VehicleStatus::Operating);
    assert_eq!(vehicles[1].status, VehicleStatus::Unknown);

    let summary = api
        .statistics_summary(&StatisticsQuery {
            from: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
        })
        .await
        .unwrap();
    assert_eq!(summary.repeat_count, 2);
    assert_eq!(summary.completion_rate(), 0.5);
}

#[tokio::test]
async fn login_stores_token_and_logout_clears_it() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/api/auth/login"),
            request::body(json_decoded(eq(json!({
                "username": "admin",
                "password": "pw"
            })))),
        ])
        .respond_with(json_encoded(json!({ "accessToken": "fresh-token" }))),
    );

    let dir = tempdir().unwrap();
    let api = client(&server, &dir);

    api.login("admin", "pw").await.unwrap();
    assert!(api.session().has_token());

    api.logout().unwrap();
    assert!(!api.session().has_token());
}
