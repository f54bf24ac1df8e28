//! Redis test infrastructure
//!
//! Provides a `TestRedis` helper that runs Redis in a container.

use crate::TestKeys;
use redis::Client;
use redis::aio::ConnectionManager;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

/// Redis container that lives as long as this value.
///
/// The container is stopped and removed on drop.
pub struct TestRedis {
    #[allow(dead_code)]
    container: ContainerAsync<Redis>,
    client: Client,
    url: String,
}

impl TestRedis {
    /// Start Redis 8 Alpine and wait until it accepts connections.
    pub async fn new() -> Self {
        let container = Redis::default()
            .with_tag("8-alpine")
            .start()
            .await
            .expect("Failed to start Redis container");

        let host_port = container
            .get_host_port_ipv4(6379)
            .await
            .expect("Failed to get Redis port");

        let url = format!("redis://127.0.0.1:{}", host_port);
        let client = Client::open(url.as_str()).expect("Failed to create Redis client");

        tracing::info!(port = host_port, "Test Redis ready (Redis 8-alpine)");

        Self {
            container,
            client,
            url,
        }
    }

    /// A fresh auto-reconnecting connection, the kind services hold.
    pub async fn connection_manager(&self) -> ConnectionManager {
        ConnectionManager::new(self.client.clone())
            .await
            .expect("Failed to connect to Redis")
    }

    /// URL for code that builds its own client from configuration.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Key namespace for one test.
    pub fn key_prefix(&self, test_name: &str) -> String {
        TestKeys::from_test_name(test_name).prefix("redis")
    }
}

impl Drop for TestRedis {
    fn drop(&mut self) {
        tracing::debug!("Cleaning up test Redis container");
    }
}
