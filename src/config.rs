// src/config.rs

use dotenvy::dotenv;
use std::env;

/// Default lifetime of an access token, in minutes.
pub const DEFAULT_ACCESS_MINUTES: i64 = 30;

/// Default lifetime of a refresh token, in days.
pub const DEFAULT_REFRESH_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_access_minutes: i64,
    pub jwt_refresh_days: i64,
    pub rust_log: String,
    pub port: u16,
    pub db_max_connections: u32,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_access_minutes = parse_or("JWT_ACCESS_MINUTES", DEFAULT_ACCESS_MINUTES);
        let jwt_refresh_days = parse_or("JWT_REFRESH_DAYS", DEFAULT_REFRESH_DAYS);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let port = parse_or("PORT", 3000);
        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", 5);

        Self {
            database_url,
            jwt_secret,
            jwt_access_minutes,
            jwt_refresh_days,
            rust_log,
            port,
            db_max_connections,
        }
    }
}

/// Reads `key` and parses it, falling back to `default` when unset or malformed.
fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_when_unset() {
        let value: i64 = parse_or("ZENITH_TEST_SURELY_UNSET_KEY", 42);
        assert_eq!(value, 42);
    }
}
