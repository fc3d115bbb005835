use thiserror::Error;

const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
const DEV_ORIGINS: [&str; 2] = ["http://localhost:8080", "http://localhost:3000"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("environment variable {0} must not be empty")]
    Empty(&'static str),
    #[error("environment variable {name} is invalid: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup so tests don't have to mutate the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            let value = lookup(name).ok_or(ConfigError::Missing(name))?;
            if value.trim().is_empty() {
                return Err(ConfigError::Empty(name));
            }
            Ok(value)
        };

        let database_url = required("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "portfolio".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "portfolio-admin".into()),
            ttl_minutes: parse_or("JWT_TTL_MINUTES", lookup("JWT_TTL_MINUTES"), 60 * 24 * 7)?,
        };
        if jwt.ttl_minutes <= 0 {
            return Err(ConfigError::Invalid {
                name: "JWT_TTL_MINUTES",
                value: jwt.ttl_minutes.to_string(),
            });
        }

        Ok(Self {
            database_url,
            jwt,
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or("APP_PORT", lookup("APP_PORT"), 5000)?,
            frontend_url: lookup("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.into()),
        })
    }

    /// Origins allowed by CORS: the configured frontend plus the local dev servers.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = vec![self.frontend_url.clone()];
        for dev in DEV_ORIGINS {
            if !origins.iter().any(|o| o == dev) {
                origins.push(dev.to_string());
            }
        }
        origins
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn loads_defaults_when_only_required_vars_are_set() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/portfolio"),
            ("JWT_SECRET", "s3cret"),
        ]))
        .expect("config should load");

        assert_eq!(cfg.jwt.ttl_minutes, 60 * 24 * 7);
        assert_eq!(cfg.jwt.issuer, "portfolio");
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.allowed_origins().len(), 3);
    }

    #[test]
    fn missing_secret_is_fatal() {
        let err = AppConfig::from_lookup(lookup_from(&[(
            "DATABASE_URL",
            "postgres://localhost/portfolio",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));
    }

    #[test]
    fn blank_secret_is_fatal() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/portfolio"),
            ("JWT_SECRET", "   "),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Empty("JWT_SECRET")));
    }

    #[test]
    fn missing_database_url_is_fatal() {
        let err = AppConfig::from_lookup(lookup_from(&[("JWT_SECRET", "x")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn rejects_unparsable_port() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/portfolio"),
            ("JWT_SECRET", "x"),
            ("APP_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "APP_PORT", .. }));
    }

    #[test]
    fn frontend_url_is_not_duplicated_in_origins() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/portfolio"),
            ("JWT_SECRET", "x"),
            ("FRONTEND_URL", "http://localhost:3000"),
        ]))
        .unwrap();
        assert_eq!(cfg.allowed_origins().len(), 2);
    }
}
