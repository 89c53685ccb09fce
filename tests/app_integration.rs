use async_trait::async_trait;
use currency_indicator::core::config::{AppConfig, SinkKind};
use currency_indicator::core::currency::{CurrencyPair, FetchError, RateFetcher};
use currency_indicator::sinks::stdout::LineSink;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::info;

mod test_utils {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_rate_server(pair: &str, response: ResponseTemplate) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v3/convert"))
            .and(query_param("q", pair))
            .respond_with(response)
            .mount(&mock_server)
            .await;

        mock_server
    }

    pub async fn create_label_server(indicator_id: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("/{indicator_id}")))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        mock_server
    }

    pub async fn posted_labels(server: &MockServer) -> Vec<String> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect()
    }
}

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    fs::write(config_file.path(), content).expect("Failed to write config file");
    config_file
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_http_sink() {
    let rate_server = test_utils::create_rate_server(
        "EUR_USD",
        wiremock::ResponseTemplate::new(200).set_body_string(r#"{"EUR_USD": 1.0821}"#),
    )
    .await;
    let label_server =
        test_utils::create_label_server("indicator-currency-converter-EUR-USD").await;

    let config_file = write_config(&format!(
        r#"
        from: "EUR"
        to: "USD"
        provider:
          base_url: {}
        sink:
          kind: http
          port: {}
    "#,
        rate_server.uri(),
        label_server.address().port()
    ));

    let config = AppConfig::load_from_path(config_file.path()).expect("Failed to load config");
    let settings = config.into_settings().expect("Invalid settings");

    let shutdown = async {
        while test_utils::posted_labels(&label_server).await.len() < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };

    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        currency_indicator::run_until(settings, shutdown),
    )
    .await
    .expect("Indicator did not shut down")
    .expect("Indicator failed");
    info!(?summary, "Indicator stopped");

    assert_eq!(
        test_utils::posted_labels(&label_server).await,
        vec!["€/USD: N/A", "€/USD: 1.08"]
    );
    assert_eq!(summary.feed.attempts, 1);
    assert_eq!(summary.feed.successes, 1);
    assert_eq!(summary.display.last_label.as_deref(), Some("€/USD: 1.08"));
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_shepherd_sink() {
    let rate_server = test_utils::create_rate_server(
        "GBP_JPY",
        wiremock::ResponseTemplate::new(503),
    )
    .await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let shepherd = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let (reader, mut writer) = stream.split();
        let mut line = String::new();
        BufReader::new(reader).read_line(&mut line).await.unwrap();
        let request: serde_json::Value = serde_json::from_str(&line).unwrap();
        let reply = format!(r#"{{"id":{},"result":true,"error":null}}"#, request["id"]);
        writer.write_all(reply.as_bytes()).await.unwrap();
        writer.write_all(b"\n").await.unwrap();
        request
    });

    let mut config = AppConfig {
        from: Some("gbp".to_string()),
        to: Some("jpy".to_string()),
        ..AppConfig::default()
    };
    config.decimals = 3;
    config.provider.base_url = rate_server.uri();
    config.sink.kind = SinkKind::Shepherd;
    config.sink.port = port;
    config.sink.icon = Some("/icons/yen.png".to_string());
    let settings = config.into_settings().expect("Invalid settings");

    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
    let run = tokio::spawn(currency_indicator::run_until(settings, async {
        let _ = done_rx.await;
    }));

    let request = tokio::time::timeout(Duration::from_secs(10), shepherd)
        .await
        .expect("Shepherd never received an update")
        .unwrap();
    // Wait for the startup fetch to be handled before stopping.
    while rate_server
        .received_requests()
        .await
        .unwrap_or_default()
        .is_empty()
    {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    done_tx.send(()).unwrap();
    let summary = run.await.unwrap().expect("Indicator failed");

    assert_eq!(request["method"], "Shepherd.Update");
    let update = &request["params"][0];
    assert_eq!(update["id"], "indicator-currency-converter-GBP-JPY");
    assert_eq!(update["label"], "£/¥: N/A");
    assert_eq!(update["guide"], "£/¥: 0000.000");
    assert_eq!(update["icon"], "/icons/yen.png");
    assert_eq!(update["active"], true);

    assert_eq!(summary.display.published, 1);
    assert_eq!(summary.feed.successes, 0);
}

struct BrokenFetcher;

#[async_trait]
impl RateFetcher for BrokenFetcher {
    async fn fetch_rate(&self, pair: &CurrencyPair) -> Result<f64, FetchError> {
        panic!("no rate source for {pair}");
    }
}

#[test_log::test(tokio::test)]
async fn test_run_returns_when_feed_dies_without_shutdown() {
    let config = AppConfig {
        from: Some("EUR".to_string()),
        to: Some("USD".to_string()),
        ..AppConfig::default()
    };
    let settings = config.into_settings().expect("Invalid settings");
    let sink = Arc::new(LineSink::new(Vec::new(), Duration::from_secs(5)));

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        currency_indicator::run_with(&settings, BrokenFetcher, sink, std::future::pending()),
    )
    .await
    .expect("Indicator kept waiting for a shutdown signal");

    assert!(
        result
            .unwrap_err()
            .to_string()
            .starts_with("Feed task failed")
    );
}

#[test_log::test]
fn test_config_file_overrides_defaults() {
    let config_file = write_config(
        r#"
        from: "USD"
        to: "EUR"
        schedule:
          steady_secs: 1800
        provider:
          zero_on_missing_pair: true
    "#,
    );

    let settings = AppConfig::load_from_path(config_file.path())
        .expect("Failed to load config")
        .into_settings()
        .expect("Invalid settings");

    assert_eq!(settings.pair.id(), "USD_EUR");
    assert_eq!(settings.schedule.steady_interval(), Duration::from_secs(1800));
    assert_eq!(settings.schedule.retry_interval(), Duration::from_secs(30));
    assert!(settings.provider.zero_on_missing_pair);
    assert_eq!(settings.sink.kind, SinkKind::Stdout);
}

#[test_log::test]
fn test_unreadable_config_file() {
    let result = AppConfig::load_from_path("/nonexistent/currency-indicator.yaml");
    assert!(
        result
            .unwrap_err()
            .to_string()
            .starts_with("Failed to read config file")
    );
}
