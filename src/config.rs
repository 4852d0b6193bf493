/*
Command line and environment configuration.
*/

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;

use crate::auth::MIN_SECRET_LEN;

#[derive(Parser, Debug, Clone)]
#[command(name = "task_rewards")]
#[command(about = "REST backend for the task rewards app")]
pub struct Args {
    #[arg(long, env = "LISTEN", default_value = "127.0.0.1:3000", help = "Address to listen on")]
    pub listen: SocketAddr,

    #[arg(long, env = "DATA_DIR", default_value = "data", help = "Directory holding user documents and the reward catalogue")]
    pub data_dir: PathBuf,

    #[arg(long, env = "STATIC_DIR", help = "Serve the built browser client from this directory")]
    pub static_dir: Option<PathBuf>,

    #[arg(long, env = "JWT_SECRET", help = "JWT secret for token signing (required unless --dev-mode)")]
    pub jwt_secret: Option<String>,

    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600", help = "JWT token expiry in seconds")]
    pub jwt_expiry_seconds: i64,

    #[arg(long, env = "LOCK_TIMEOUT_MS", default_value = "2000", help = "Longest wait for a per-user lock before answering 503")]
    pub lock_timeout_ms: u64,

    #[arg(long, env = "DEV_MODE", default_value = "false", help = "Development mode (built-in JWT secret)")]
    pub dev_mode: bool,

    #[arg(long, env = "SEED_CATALOG", default_value = "false", help = "Populate an empty reward catalogue with the starter rewards")]
    pub seed_catalog: bool,

    #[arg(long, env = "LOG_LEVEL", default_value = "info", help = "Log level (trace, debug, info, warn, error)")]
    pub log_level: String,
}

impl Args {
    pub fn validate(&self) -> Result<(), String> {
        match &self.jwt_secret {
            None if !self.dev_mode => {
                return Err("JWT_SECRET is required outside dev mode".into());
            }
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                return Err(format!("JWT_SECRET must be at least {MIN_SECRET_LEN} characters"));
            }
            _ => {}
        }
        if self.jwt_expiry_seconds <= 0 {
            return Err("JWT_EXPIRY_SECONDS must be positive".into());
        }
        if self.lock_timeout_ms == 0 {
            return Err("LOCK_TIMEOUT_MS must be positive".into());
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
