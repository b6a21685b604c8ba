// config.rs
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    // None selects the in-memory store
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    // Matching radii, meters
    pub service_match_radius_m: f64,
    pub emergency_radius_m: f64,
    pub emergency_map_radius_m: f64,
    pub nearby_activity_radius_m: f64,
    // Email service, disabled when SMTP_HOST is unset
    pub smtp: Option<SmtpConfig>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub log_level: String,
}

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let jwt_secret = var("JWT_SECRET_KEY").ok_or(ConfigError::Missing("JWT_SECRET_KEY"))?;
        let jwt_maxage = parse_or(&var, "JWT_MAXAGE", 60i64)?;
        if jwt_maxage <= 0 {
            return Err(ConfigError::Invalid {
                key: "JWT_MAXAGE",
                value: jwt_maxage.to_string(),
            });
        }

        let smtp = match var("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                port: parse_or(&var, "SMTP_PORT", 587u16)?,
                username: var("SMTP_USERNAME").unwrap_or_default(),
                password: var("SMTP_PASSWORD").unwrap_or_default(),
                from: var("MAIL_FROM").ok_or(ConfigError::Missing("MAIL_FROM"))?,
                host,
            }),
            None => None,
        };

        Ok(Config {
            database_url: var("DATABASE_URL"),
            jwt_secret,
            jwt_maxage,
            port: parse_or(&var, "PORT", 8000u16)?,
            service_match_radius_m: radius(&var, "SERVICE_MATCH_RADIUS_M", 30_000.0)?,
            emergency_radius_m: radius(&var, "EMERGENCY_RADIUS_M", 10_000.0)?,
            emergency_map_radius_m: radius(&var, "EMERGENCY_MAP_RADIUS_M", 100_000.0)?,
            nearby_activity_radius_m: radius(&var, "NEARBY_ACTIVITY_RADIUS_M", 50_000.0)?,
            smtp,
            admin_email: var("ADMIN_EMAIL"),
            admin_password: var("ADMIN_PASSWORD"),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "debug".to_string()),
        })
    }
}

fn parse_or<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn radius<F>(var: &F, key: &'static str, default: f64) -> Result<f64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(var, key, default)?;
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        });
    }
    Ok(value)
}
