use std::time::Instant;

use super::DatabaseClient;

/// Health check status for Cosmos DB
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the database is reachable and authorized
    pub healthy: bool,
    /// Error details when unhealthy
    pub message: Option<String>,
    /// Response time in milliseconds
    pub response_time_ms: u64,
}

/// Check Cosmos DB health by reading the database resource
///
/// # Example
/// ```ignore
/// use database::cosmos::{CosmosClient, check_health};
///
/// let database = CosmosClient::from_config(&config)?.database(config.database());
/// let healthy = check_health(&database).await;
/// ```
pub async fn check_health(database: &DatabaseClient) -> bool {
    database.read().await.is_ok()
}

/// Check Cosmos DB health with timing and error details
pub async fn check_health_detailed(database: &DatabaseClient) -> HealthStatus {
    let start = Instant::now();
    let result = database.read().await;
    let response_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(_) => HealthStatus {
            healthy: true,
            message: None,
            response_time_ms,
        },
        Err(e) => HealthStatus {
            healthy: false,
            message: Some(e.to_string()),
            response_time_ms,
        },
    }
}
