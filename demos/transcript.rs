//! Drives one exchange through the worker with a canned response and prints what a consumer
//! would see. No network access is involved.
use http::Method;
use http_exchange::config::{ExchangeConfig, LogLevel};
use http_exchange::{DriverHandle, ExchangeEvent, RequestMetadata, TransportEvent};
use url::Url;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ExchangeConfig::builder().log_level(LogLevel::Debug).build()?;

    env_logger::Builder::new()
        .filter_level(config.log_level.into())
        .init();

    let driver = DriverHandle::spawn(&config)?;
    let mut events = driver.subscribe();
    let exchange = driver.exchange().clone();

    let printer = tokio::spawn(async move {
        while let Ok(ev) = events.recv().await {
            println!("event: {:?}", ev);
            if matches!(ev, ExchangeEvent::Finished { .. } | ExchangeEvent::Misuse { .. }) {
                break;
            }
        }
    });

    let url = Url::parse("https://api.example.com/v1/status")?;
    driver.send(TransportEvent::Request(RequestMetadata::new(Method::GET, url))).await?;
    driver.send(TransportEvent::Opened).await?;

    let body = r#"{"service":"ok","uptime":1234}"#;
    let response: reqwest::Response = http::Response::builder()
        .status(200)
        .header("content-type", "application/json; charset=utf-8")
        .header("content-length", body.len().to_string())
        .header("connection", "keep-alive")
        .body(body)?
        .into();
    driver.feed_response(response).await?;

    driver.join().await?;
    printer.await?;

    println!("snapshot: {}", serde_json::to_string_pretty(&exchange.snapshot())?);
    println!("dictionary: {:?}", exchange.response_dictionary()?);

    Ok(())
}
