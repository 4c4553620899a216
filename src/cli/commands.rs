//! CLI command handlers.

use std::time::Duration;

use crate::client::CineClient;
use crate::error::{CineError, Result};
use crate::heartbeat::KEEP_ALIVE_PATH;
use crate::readiness::HealthStatus;
use crate::request::RequestDescriptor;

/// Handle `cineverse health`.
pub async fn handle_health(client: &CineClient) -> Result<()> {
    let report = client.readiness().check_health().await;
    println!("status: {}", report.status);
    if let Some(done) = report.initialization_complete {
        println!("initialization complete: {done}");
    }
    if let Some(detail) = &report.detail {
        println!("detail: {detail}");
    }
    match (report.status, report.http_status) {
        (HealthStatus::Healthy, _) => Ok(()),
        (HealthStatus::Unhealthy, Some(status)) => Err(CineError::Server {
            status,
            message: report.detail.unwrap_or_else(|| "backend is unhealthy".into()),
        }),
        _ => Err(CineError::Network(
            "backend did not answer the health check; it may be cold-starting".into(),
        )),
    }
}

/// Handle `cineverse wait`.
pub async fn handle_wait(client: &CineClient, max_wait_secs: u64) -> Result<()> {
    eprintln!("Waiting up to {max_wait_secs}s for the backend to wake up...");
    client
        .readiness()
        .wait_for_backend(Duration::from_secs(max_wait_secs))
        .await?;
    println!("Backend is ready");
    Ok(())
}

/// Handle `cineverse ping`.
pub async fn handle_ping(client: &CineClient) -> Result<()> {
    let response = client
        .executor()
        .execute(&RequestDescriptor::get(KEEP_ALIVE_PATH), 1)
        .await?;
    println!("{response}");
    Ok(())
}

/// Handle `cineverse get <path>`.
pub async fn handle_get(
    client: &CineClient,
    path: &str,
    query: &[String],
    retries: Option<u32>,
) -> Result<()> {
    let mut request = RequestDescriptor::get(path);
    for pair in query {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            CineError::InvalidArgument(format!("query parameter '{pair}' is not KEY=VALUE"))
        })?;
        request = request.query(key, value);
    }

    let payload = match retries {
        Some(budget) => client.executor().execute(&request, budget).await?,
        None => client.read(request).await?,
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
