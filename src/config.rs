use std::env;
use std::time::Duration;

use crate::engine::fleet::ActivityThresholds;
use crate::error::AppError;
use crate::geo::FeeSchedule;
use crate::nav::guard::GuardConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub static_dir: String,
    pub guard: GuardConfig,
    pub redirect_debounce: Duration,
    pub activity: ActivityThresholds,
    pub fees: FeeSchedule,
    pub admin: Option<AdminSeed>,
}

/// Admin account created at startup when `ADMIN_UID` is set. Admins cannot
/// self-register.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub uid: String,
    pub name: String,
    pub email: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
            guard: GuardConfig {
                max_attempts: parse_or_default("NAV_MAX_ATTEMPTS", 5)?,
                reset_window: Duration::from_millis(parse_or_default("NAV_RESET_WINDOW_MS", 3000)?),
                cooldown: Duration::from_millis(parse_or_default("NAV_COOLDOWN_MS", 3000)?),
                sweep_interval: Duration::from_secs(parse_or_default(
                    "NAV_SWEEP_INTERVAL_SECS",
                    30,
                )?),
            },
            redirect_debounce: Duration::from_millis(parse_or_default(
                "REDIRECT_DEBOUNCE_MS",
                1000,
            )?),
            activity: ActivityThresholds {
                active_within: Duration::from_secs(parse_or_default("VEHICLE_ACTIVE_SECS", 300)?),
                idle_within: Duration::from_secs(parse_or_default("VEHICLE_IDLE_SECS", 900)?),
            },
            fees: FeeSchedule {
                base: parse_or_default("DELIVERY_BASE_FEE", 30.0)?,
                per_km: parse_or_default("DELIVERY_FEE_PER_KM", 10.0)?,
            },
            admin: env::var("ADMIN_UID")
                .ok()
                .filter(|uid| !uid.trim().is_empty())
                .map(|uid| AdminSeed {
                    uid: uid.trim().to_string(),
                    name: env::var("ADMIN_NAME").unwrap_or_else(|_| "Administrator".to_string()),
                    email: env::var("ADMIN_EMAIL").unwrap_or_default(),
                }),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            static_dir: "static".to_string(),
            guard: GuardConfig::default(),
            redirect_debounce: Duration::from_millis(1000),
            activity: ActivityThresholds::default(),
            fees: FeeSchedule::default(),
            admin: None,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
