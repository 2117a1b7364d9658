//! Integration tests for the HTTP clients using wiremock.
//!
//! These tests verify request shape, status classification and cancellation
//! against a mock upstream.

use std::{sync::Arc, time::Duration};

use weather_core::{
    CancellationToken, ControllerOptions, FetchController, FetchError, MemoryPreferenceStore,
    OpenWeatherClient, ProxyClient, ResolveOutcome, ResponseCache, RetryPolicy, UnitSystem,
    WeatherClient,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a provider payload
fn current_weather(name: &str, temp: f64) -> serde_json::Value {
    serde_json::json!({
        "coord": {"lon": -0.1257, "lat": 51.5085},
        "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}],
        "main": {"temp": temp, "feels_like": temp - 1.0, "humidity": 50, "pressure": 1000},
        "wind": {"speed": 3.2},
        "dt": 1700000000,
        "sys": {"country": "GB"},
        "name": name
    })
}

fn openweather(server: &MockServer) -> OpenWeatherClient {
    OpenWeatherClient::new("TEST_KEY".to_string(), Duration::from_secs(5))
        .unwrap()
        .with_base_url(&server.uri())
}

#[tokio::test]
async fn test_openweather_success_sends_expected_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", "London"))
        .and(query_param("appid", "TEST_KEY"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather("London", 20.0)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = openweather(&mock_server);
    let weather = client
        .fetch_current_conditions(" London ", UnitSystem::Metric, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(weather.city, "London");
    assert_eq!(weather.country, "GB");
    assert_eq!(weather.temperature, 20.0);
    assert_eq!(weather.condition, "clear sky");
    assert_eq!(weather.condition_code, 800);
}

#[tokio::test]
async fn test_openweather_imperial_units() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("units", "imperial"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather("Boston", 68.0)))
        .mount(&mock_server)
        .await;

    let client = openweather(&mock_server);
    let weather = client
        .fetch_current_conditions("Boston", UnitSystem::Imperial, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(weather.temperature, 68.0);
}

#[tokio::test]
async fn test_openweather_status_classification() {
    let cases = [
        (401, FetchError::Unauthorized),
        (404, FetchError::NotFound),
        (429, FetchError::RateLimited),
    ];

    for (status, expected) in cases {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_json(serde_json::json!({"cod": status, "message": "nope"})),
            )
            .mount(&mock_server)
            .await;

        let err = openweather(&mock_server)
            .fetch_current_conditions("Paris", UnitSystem::Metric, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, expected, "status {status}");
    }
}

#[tokio::test]
async fn test_openweather_server_error_is_transient() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let err = openweather(&mock_server)
        .fetch_current_conditions("Paris", UnitSystem::Metric, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_transient());
}

#[tokio::test]
async fn test_openweather_malformed_body_is_unknown() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let err = openweather(&mock_server)
        .fetch_current_conditions("Paris", UnitSystem::Metric, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Unknown(_)));
}

#[tokio::test]
async fn test_openweather_cancellation_settles_promptly() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(current_weather("Paris", 12.0))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let client = openweather(&mock_server);
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = client
        .fetch_current_conditions("Paris", UnitSystem::Metric, token)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_fetch_raw_passes_body_through() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"cod":"404","message":"city not found"}"#))
        .mount(&mock_server)
        .await;

    let raw = openweather(&mock_server)
        .fetch_raw("Atlantis", UnitSystem::Metric)
        .await
        .unwrap();

    assert_eq!(raw.status, 404);
    assert!(!raw.is_success());
    assert!(raw.body.contains("city not found"));
}

#[tokio::test]
async fn test_proxy_client_success() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .and(query_param("city", "Tokyo"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather("Tokyo", 25.0)))
        .mount(&mock_server)
        .await;

    let client = ProxyClient::new(&mock_server.uri(), Duration::from_secs(5)).unwrap();
    let weather = client
        .fetch_current_conditions("Tokyo", UnitSystem::Metric, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(weather.city, "Tokyo");
    assert_eq!(weather.temperature, 25.0);
}

#[tokio::test]
async fn test_proxy_client_maps_error_statuses() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("city", "Atlantis"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({"message": "City not found — check spelling"})),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("city", "Offline"))
        .respond_with(
            ResponseTemplate::new(502)
                .set_body_json(serde_json::json!({"message": "Network error — check connection"})),
        )
        .mount(&mock_server)
        .await;

    let client = ProxyClient::new(&mock_server.uri(), Duration::from_secs(5)).unwrap();

    let not_found = client
        .fetch_current_conditions("Atlantis", UnitSystem::Metric, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(not_found, FetchError::NotFound);

    let offline = client
        .fetch_current_conditions("Offline", UnitSystem::Metric, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(offline.is_transient());
}

#[tokio::test]
async fn test_controller_retries_flaky_upstream() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather("London", 20.0)))
        .mount(&mock_server)
        .await;

    let controller = FetchController::new(
        Arc::new(openweather(&mock_server)),
        ResponseCache::new(),
        Arc::new(MemoryPreferenceStore::default()),
        ControllerOptions {
            debounce: Duration::from_millis(10),
            retry: RetryPolicy::new(2, 10),
        },
    );

    let outcome = controller.resolve("London", UnitSystem::Metric).await;

    assert_eq!(outcome, ResolveOutcome::Fetched);
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
    let state = controller.state();
    assert!(state.error.is_none());
    assert_eq!(state.data.map(|d| d.temperature), Some(20.0));

    // Second lookup is answered from the cache.
    assert_eq!(controller.resolve("london", UnitSystem::Metric).await, ResolveOutcome::CacheHit);
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}
