//! Service configuration from environment.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub database_max_connections: u32,
    /// Edges of the polygon approximating circle geometries
    pub polygon_to_circle_edges: usize,
    pub subscription_manager_url: String,
    pub subscription_manager_username: String,
    pub subscription_manager_password: String,
    pub subscription_manager_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "data/geofencing.db".to_string(),
            database_max_connections: 5,
            polygon_to_circle_edges: 20,
            subscription_manager_url: "http://localhost:8080/subscription-manager/api/1.0"
                .to_string(),
            subscription_manager_username: String::new(),
            subscription_manager_password: String::new(),
            subscription_manager_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_path: env::var("GEOFENCING_DATABASE_PATH")
                .unwrap_or(defaults.database_path),
            database_max_connections: env::var("GEOFENCING_DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.database_max_connections),
            polygon_to_circle_edges: env::var("POLYGON_TO_CIRCLE_EDGES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n >= 3)
                .unwrap_or(defaults.polygon_to_circle_edges),
            subscription_manager_url: env::var("SUBSCRIPTION_MANAGER_URL")
                .unwrap_or(defaults.subscription_manager_url),
            subscription_manager_username: env::var("SUBSCRIPTION_MANAGER_USERNAME")
                .unwrap_or_default(),
            subscription_manager_password: env::var("SUBSCRIPTION_MANAGER_PASSWORD")
                .unwrap_or_default(),
            subscription_manager_timeout: env::var("SUBSCRIPTION_MANAGER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.subscription_manager_timeout),
        }
    }
}
