use std::collections::BTreeSet;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use rolegate_application::AuthorizationSettings;
use rolegate_core::{AppError, UserId};
use rolegate_domain::PolicyId;
use tracing_subscriber::EnvFilter;

const DEFAULT_API_PORT: u16 = 3002;
const DEFAULT_CACHE_KEY_PREFIX: &str = "rolegate";
const DEFAULT_CACHE_TTL_SECONDS: u32 = 60;
const DEFAULT_AUTHORIZE_TIMEOUT_MS: u64 = 250;

/// What the binary was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiCommand {
    Serve,
    Migrate,
    BootstrapAdmin(UserId),
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub command: ApiCommand,
    pub database_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub redis_url: Option<String>,
    pub cache_key_prefix: String,
    pub authorization: AuthorizationSettings,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        Self::from_lookup(env::args().skip(1), |name| env::var(name).ok())
    }

    fn from_lookup(
        args: impl IntoIterator<Item = String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let command = parse_command(args)?;
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let database_url =
            optional("DATABASE_URL").ok_or_else(|| required_error("DATABASE_URL"))?;
        let api_host = optional("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = parse_or("API_PORT", optional("API_PORT"), DEFAULT_API_PORT)?;
        let redis_url = optional("REDIS_URL");
        let cache_key_prefix = optional("ROLEGATE_CACHE_KEY_PREFIX")
            .unwrap_or_else(|| DEFAULT_CACHE_KEY_PREFIX.to_owned());

        let cache_ttl_seconds = parse_or(
            "ROLEGATE_CACHE_TTL_SECONDS",
            optional("ROLEGATE_CACHE_TTL_SECONDS"),
            DEFAULT_CACHE_TTL_SECONDS,
        )?;
        let timeout_ms = parse_or(
            "ROLEGATE_AUTHORIZE_TIMEOUT_MS",
            optional("ROLEGATE_AUTHORIZE_TIMEOUT_MS"),
            DEFAULT_AUTHORIZE_TIMEOUT_MS,
        )?;
        if timeout_ms == 0 {
            return Err(AppError::Validation(
                "ROLEGATE_AUTHORIZE_TIMEOUT_MS must be greater than zero".to_owned(),
            ));
        }
        let sensitive_resources = optional("ROLEGATE_SENSITIVE_RESOURCES")
            .map(|value| parse_sensitive_resources(value.as_str()))
            .unwrap_or_default();
        let system_default_policy_id = optional("ROLEGATE_SYSTEM_DEFAULT_POLICY_ID")
            .map(|value| {
                PolicyId::from_str(value.trim()).map_err(|error| {
                    AppError::Validation(format!(
                        "invalid ROLEGATE_SYSTEM_DEFAULT_POLICY_ID: {error}"
                    ))
                })
            })
            .transpose()?;

        Ok(Self {
            command,
            database_url,
            api_host,
            api_port,
            redis_url,
            cache_key_prefix,
            authorization: AuthorizationSettings {
                cache_ttl_seconds,
                default_deadline: Duration::from_millis(timeout_ms),
                sensitive_resources,
                system_default_policy_id,
            },
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_command(args: impl IntoIterator<Item = String>) -> Result<ApiCommand, AppError> {
    let mut args = args.into_iter();
    match args.next().as_deref() {
        None => Ok(ApiCommand::Serve),
        Some("migrate") => Ok(ApiCommand::Migrate),
        Some("bootstrap-admin") => {
            let user_id = args.next().ok_or_else(|| {
                AppError::Validation("bootstrap-admin requires a user id".to_owned())
            })?;
            uuid::Uuid::parse_str(user_id.trim())
                .map(|value| ApiCommand::BootstrapAdmin(UserId::from_uuid(value)))
                .map_err(|error| {
                    AppError::Validation(format!("invalid bootstrap-admin user id: {error}"))
                })
        }
        Some(other) => Err(AppError::Validation(format!(
            "unknown command '{other}', expected 'migrate' or 'bootstrap-admin <user-id>'"
        ))),
    }
}

/// Comma-separated resource names, trimmed and lowercased like permission codes.
fn parse_sensitive_resources(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .map(|resource| resource.trim().to_ascii_lowercase())
        .filter(|resource| !resource.is_empty())
        .collect()
}

fn parse_or<T>(name: &str, value: Option<String>, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
        None => Ok(default),
    }
}

fn required_error(name: &str) -> AppError {
    AppError::Validation(format!("{name} is required"))
}
