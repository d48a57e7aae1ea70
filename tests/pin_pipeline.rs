use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use httptest::matchers::{all_of, contains, request, url_decoded};
use httptest::responders::{delay_and_then, json_encoded, status_code};
use httptest::{Expectation, Server};
use secrecy::SecretString;
use serde_json::json;
use tempfile::tempdir;

use complaint_dashboard::api::ComplaintQuery;
use complaint_dashboard::geocode::{
    AddressSearch, BatchResolver, CachedGeocoder, GeocodeCache, GeocodingClient,
    KakaoLocalClient, SearchError, SearchOutcome,
};
use complaint_dashboard::map::{
    MarkerLayer, PinManager, PinPhase, PinUpdate, RecordingMarkerLayer, SdkBootstrap,
};
use complaint_dashboard::{
    AppConfig, AppResult, ComplaintStatus, Coordinate, Dashboard, PinData,
};

const ADDRESS_PATH: &str = "/v2/local/search/address.json";
const DOBONG: &str = "서울 도봉구 방학로 101";
const NOWHERE: &str = "서울 도봉구 존재하지않는길 999";

fn kakao_config(server: &Server) -> AppConfig {
    AppConfig {
        kakao_rest_api_key: Some(SecretString::from("test-key".to_string())),
        kakao_local_base_url: server.url("/").to_string(),
        ..AppConfig::default()
    }
}

fn dobong_document() -> serde_json::Value {
    json!({
        "meta": { "total_count": 1, "pageable_count": 1, "is_end": true },
        "documents": [{
            "address_name": DOBONG,
            "address_type": "ROAD_ADDR",
            "x": "127.0342",
            "y": "37.6652",
            "address": {
                "address_name": "서울 도봉구 방학동 720",
                "main_address_no": "720",
                "sub_address_no": ""
            },
            "road_address": {
                "address_name": DOBONG,
                "road_name": "방학로",
                "main_building_no": "101",
                "sub_building_no": "",
                "building_name": "",
                "zone_no": "01331"
            }
        }]
    })
}

fn expect_address(server: &Server, address: &'static str, body: serde_json::Value) {
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", ADDRESS_PATH),
            request::headers(contains(("authorization", "KakaoAK test-key"))),
            request::query(url_decoded(contains(("query", address)))),
        ])
        .respond_with(json_encoded(body)),
    );
}

fn pin(id: i64, address: &str, coordinate: Coordinate) -> PinData {
    PinData {
        id: format!("pin-{id}"),
        complaint_id: id,
        category: "대형폐기물".into(),
        is_repeat: id % 2 == 0,
        content: "수거 요청".into(),
        datetime: "2024-05-02T10:00:00".into(),
        status: ComplaintStatus::Processing,
        address: address.into(),
        coordinate,
    }
}

struct InstantBootstrap;

#[async_trait]
impl SdkBootstrap for InstantBootstrap {
    async fn load(&self) -> AppResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn resolves_pins_through_kakao_once_per_address() {
    let mut server = Server::run();
    expect_address(&server, DOBONG, dobong_document());
    expect_address(&server, NOWHERE, json!({ "meta": {}, "documents": [] }));

    let config = kakao_config(&server);
    let kakao = Arc::new(KakaoLocalClient::new(&config, SecretString::from("test-key".to_string())).unwrap());
    let geocoder = CachedGeocoder::new(
        GeocodingClient::from_lookup(kakao),
        Arc::new(GeocodeCache::new()),
    );
    let layer = Arc::new(RecordingMarkerLayer::new());
    let manager = PinManager::new(BatchResolver::new(geocoder), layer.clone());
    manager.set_map_ready(true).await;

    let update = manager
        .set_pins(vec![
            pin(1, "서울 도봉구 마들로 656", Coordinate::new(37.6687, 127.0471)),
            pin(2, DOBONG, Coordinate::UNRESOLVED),
            pin(3, NOWHERE, Coordinate::UNRESOLVED),
            pin(4, DOBONG, Coordinate::UNRESOLVED),
        ])
        .await;

    assert_eq!(
        update,
        PinUpdate::Published {
            rendered: 3,
            dropped: 1
        }
    );
    let markers = layer.markers();
    assert_eq!(markers.len(), 3);
    assert_eq!(markers[1].position, Coordinate::new(37.6652, 127.0342));
    assert_eq!(markers[1].position, markers[2].position);

    // Warm cache: the repeat run must not reach the server again for DOBONG.
    server.verify_and_clear();
    expect_address(&server, NOWHERE, json!({ "documents": [] }));
    let again = manager.update_pins().await;
    assert_eq!(
        again,
        PinUpdate::Published {
            rendered: 3,
            dropped: 1
        }
    );
    assert_eq!(manager.phase(), PinPhase::Ready);
}

#[tokio::test]
async fn upstream_failure_drops_only_the_failed_pin() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", ADDRESS_PATH))
            .respond_with(status_code(500)),
    );

    let config = kakao_config(&server);
    let layer = Arc::new(RecordingMarkerLayer::new());
    let geocoder = CachedGeocoder::new(
        GeocodingClient::new(&config).unwrap(),
        Arc::new(GeocodeCache::new()),
    );
    let manager = PinManager::new(BatchResolver::new(geocoder), layer.clone());
    manager.set_map_ready(true).await;

    let update = manager
        .set_pins(vec![
            pin(1, "서울 도봉구 마들로 656", Coordinate::new(37.6687, 127.0471)),
            pin(2, DOBONG, Coordinate::UNRESOLVED),
        ])
        .await;

    assert_eq!(
        update,
        PinUpdate::Published {
            rendered: 1,
            dropped: 1
        }
    );
    assert_eq!(layer.markers()[0].complaint_id, 1);
}

#[tokio::test]
async fn address_search_distinguishes_empty_from_failed() {
    let server = Server::run();
    expect_address(&server, DOBONG, dobong_document());
    expect_address(&server, NOWHERE, json!({ "documents": [] }));
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", ADDRESS_PATH),
            request::query(url_decoded(contains(("query", "rate limited")))),
        ])
        .respond_with(status_code(429)),
    );

    let config = kakao_config(&server);
    let kakao = Arc::new(KakaoLocalClient::new(&config, SecretString::from("test-key".to_string())).unwrap());
    let search = AddressSearch::new(Some(kakao), &config);

    let found = search.search(DOBONG).await.unwrap();
    let SearchOutcome::Found(candidates) = found else {
        panic!("expected candidates");
    };
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].display_label(), DOBONG);
    assert_eq!(
        candidates[0].jibun.as_ref().unwrap().address_name,
        "서울 도봉구 방학동 720"
    );

    let empty = search.search(NOWHERE).await.unwrap();
    assert!(matches!(empty, SearchOutcome::NoResults));
    assert!(empty.candidates().is_empty());

    let failed = search.search("rate limited").await.unwrap_err();
    assert_eq!(failed, SearchError::Status(429));
    assert!(failed.is_retryable());
}

#[tokio::test]
async fn address_search_times_out() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", ADDRESS_PATH)).respond_with(
            delay_and_then(
                Duration::from_millis(500),
                json_encoded(json!({ "documents": [] })),
            ),
        ),
    );

    let config = AppConfig {
        address_search_timeout_ms: 50,
        ..kakao_config(&server)
    };
    let kakao = Arc::new(KakaoLocalClient::new(&config, SecretString::from("test-key".to_string())).unwrap());
    let search = AddressSearch::new(Some(kakao), &config);

    let err = search.search(DOBONG).await.unwrap_err();
    assert_eq!(err, SearchError::Timeout);
    assert_eq!(
        err.user_message(),
        "검색 시간이 초과되었습니다. 다시 시도해주세요."
    );
}

#[tokio::test]
async fn dashboard_renders_backend_complaints() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/api/auth/login"),
        ])
        .respond_with(json_encoded(json!({ "data": { "accessToken": "jwt-token" } }))),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/api/complaints"),
            request::headers(contains(("authorization", "Bearer jwt-token"))),
            request::query(url_decoded(contains(("status", "PROCESSING")))),
        ])
        .respond_with(json_encoded(json!({
            "content": [
                {
                    "id": 11,
                    "category": "음식물",
                    "isRepeat": true,
                    "content": "수거 누락",
                    "datetime": "2024-05-02T08:10:00",
                    "status": "PROCESSING",
                    "address": "서울 도봉구 마들로 656",
                    "latitude": 37.6687,
                    "longitude": 127.0471
                },
                {
                    "id": 12,
                    "category": "재활용",
                    "content": "분리배출 위반",
                    "datetime": "2024-05-02T09:45:00",
                    "status": "PROCESSING",
                    "address": DOBONG
                }
            ],
            "totalElements": 2
        }))),
    );
    expect_address(&server, DOBONG, dobong_document());

    let dir = tempdir().unwrap();
    let config = AppConfig {
        api_base_url: server.url("/api").to_string(),
        ..kakao_config(&server)
    };
    let layer = Arc::new(RecordingMarkerLayer::new());
    let dashboard = Dashboard::initialize_with_cache(
        dir.path(),
        config,
        layer.clone() as Arc<dyn MarkerLayer>,
        Arc::new(GeocodeCache::new()),
    )
    .unwrap()
    .with_sdk_bootstrap(Arc::new(InstantBootstrap));

    dashboard.api().login("admin", "secret").await.unwrap();
    let query = ComplaintQuery {
        status: Some(ComplaintStatus::Processing),
        ..ComplaintQuery::default()
    };

    // Pins arrive before the map is ready and wait for it.
    let pending = dashboard.refresh_complaint_pins(&query).await.unwrap();
    assert_eq!(pending, PinUpdate::MapNotReady);
    let update = dashboard.load_map().await.unwrap();
    assert_eq!(
        update,
        PinUpdate::Published {
            rendered: 2,
            dropped: 0
        }
    );

    let markers = layer.markers();
    assert_eq!(markers.len(), 2);
    assert!(markers[0].is_repeat);
    assert_eq!(markers[1].position, Coordinate::new(37.6652, 127.0342));

    let health = dashboard.health();
    assert!(health.has_session);
    assert_eq!(health.geocode_cache_entries, 1);
    assert_eq!(health.rendered_pins, 2);
    dashboard.shutdown();
    assert!(layer.markers().is_empty());
}
