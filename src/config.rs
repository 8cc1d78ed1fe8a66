use std::{env, path::PathBuf, time::Duration};

use anyhow::{Context, bail};

const DEV_JWT_SECRET: &str = "dev-only-insecure-secret";
const MAX_JWT_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => bail!("unknown APP_ENV: {other}"),
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub environment: Environment,
    pub jwt_secret: String,
    pub jwt_expires_in: Duration,
    pub admin_secret: Option<String>,
    pub upload_dir: PathBuf,
    pub meeting_base_url: Option<String>,
    pub db_max_connections: u32,
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process env.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL").context("DATABASE_URL must be set")?;

        let environment = match get("APP_ENV") {
            Some(raw) => Environment::parse(&raw)?,
            None => Environment::Development,
        };

        let bind_addr = match get("BIND_ADDR") {
            Some(addr) => addr,
            None => {
                let port = match get("PORT") {
                    Some(p) => p.parse::<u16>().with_context(|| format!("invalid PORT: {p}"))?,
                    None => 3000,
                };
                format!("0.0.0.0:{port}")
            }
        };

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None if environment.is_production() => bail!("JWT_SECRET must be set in production"),
            None => {
                tracing::warn!("JWT_SECRET not set, using the development default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let jwt_expires_in = match get("JWT_EXPIRES_IN") {
            Some(raw) => humantime::parse_duration(&raw)
                .with_context(|| format!("invalid JWT_EXPIRES_IN: {raw}"))?,
            None => Duration::from_secs(24 * 60 * 60),
        };
        if jwt_expires_in.is_zero() {
            bail!("JWT_EXPIRES_IN must be greater than zero");
        }
        if jwt_expires_in > MAX_JWT_LIFETIME {
            bail!("JWT_EXPIRES_IN must not exceed 365 days");
        }

        let db_max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| format!("invalid DB_MAX_CONNECTIONS: {raw}"))?,
            None => 10,
        };

        let run_migrations = get("RUN_MIGRATIONS")
            .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            database_url,
            bind_addr,
            environment,
            jwt_secret,
            jwt_expires_in,
            admin_secret: get("ADMIN_SECRET"),
            upload_dir: PathBuf::from(get("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string())),
            meeting_base_url: get("MEETING_BASE_URL"),
            db_max_connections,
            run_migrations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_for_development() {
        let cfg = load(&[("DATABASE_URL", "postgres://localhost/medcare")]).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3000");
        assert_eq!(cfg.environment, Environment::Development);
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(cfg.jwt_expires_in, Duration::from_secs(86_400));
        assert_eq!(cfg.upload_dir, PathBuf::from("uploads"));
        assert!(cfg.admin_secret.is_none());
        assert!(!cfg.run_migrations);
    }

    #[test]
    fn port_and_lifetime_are_parsed() {
        let cfg = load(&[
            ("DATABASE_URL", "postgres://localhost/medcare"),
            ("PORT", "8081"),
            ("JWT_EXPIRES_IN", "2h 30m"),
            ("RUN_MIGRATIONS", "true"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8081");
        assert_eq!(cfg.jwt_expires_in, Duration::from_secs(9_000));
        assert!(cfg.run_migrations);
    }

    #[test]
    fn bind_addr_wins_over_port() {
        let cfg = load(&[
            ("DATABASE_URL", "postgres://localhost/medcare"),
            ("PORT", "9000"),
            ("BIND_ADDR", "127.0.0.1:7000"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:7000");
    }

    #[test]
    fn production_requires_jwt_secret() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/medcare"),
            ("APP_ENV", "production"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(load(&[]).is_err());
        assert!(load(&[("DATABASE_URL", "x"), ("PORT", "seventy")]).is_err());
        assert!(load(&[("DATABASE_URL", "x"), ("JWT_EXPIRES_IN", "soon")]).is_err());
        assert!(load(&[("DATABASE_URL", "x"), ("APP_ENV", "staging")]).is_err());
    }

    #[test]
    fn pool_size_must_be_a_positive_number() {
        let err = load(&[("DATABASE_URL", "x"), ("DB_MAX_CONNECTIONS", "lots")]).unwrap_err();
        assert!(err.to_string().contains("DB_MAX_CONNECTIONS"));
        assert!(load(&[("DATABASE_URL", "x"), ("DB_MAX_CONNECTIONS", "0")]).is_err());

        let cfg = load(&[("DATABASE_URL", "x"), ("DB_MAX_CONNECTIONS", "25")]).unwrap();
        assert_eq!(cfg.db_max_connections, 25);
    }

    #[test]
    fn token_lifetime_is_capped() {
        let err = load(&[("DATABASE_URL", "x"), ("JWT_EXPIRES_IN", "400days")]).unwrap_err();
        assert!(err.to_string().contains("365 days"));
        assert!(load(&[("DATABASE_URL", "x"), ("JWT_EXPIRES_IN", "30days")]).is_ok());
    }
}
