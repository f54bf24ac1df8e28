//! Shared test utilities
//!
//! - `TestRedis`: Redis container with automatic cleanup (feature: "redis")
//! - `TestKeys`: deterministic, per-test key namespaces (always available)
//!
//! # Redis Testing
//!
//! Add `features = ["redis"]` to your dev-dependencies:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { workspace = true, features = ["redis"] }
//! ```
//!
//! Then in your tests:
//!
//! ```rust,ignore
//! use test_utils::TestRedis;
//!
//! #[tokio::test]
//! #[ignore]
//! async fn my_redis_test() {
//!     let redis = TestRedis::new().await;
//!     let conn = redis.connection_manager().await;
//!     let prefix = redis.key_prefix("my_redis_test");
//! }
//! ```

#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "redis")]
pub use self::redis::TestRedis;

/// Deterministic key namespaces, so tests sharing one Redis never collide.
pub struct TestKeys {
    seed: u64,
}

impl TestKeys {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed from the test name, so reruns use the same keys.
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// `test:<seed>:<scope>:`
    pub fn prefix(&self, scope: &str) -> String {
        format!("test:{}:{}:", self.seed, scope)
    }
}
