use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub auth_file: PathBuf,
    pub log_level: String,
    pub pool_size: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            data_dir: PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".into())),
            auth_file: PathBuf::from(
                std::env::var("AUTH_FILE").unwrap_or_else(|_| "./auth.json".into()),
            ),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            pool_size: std::env::var("POOL_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
        }
    }
}
