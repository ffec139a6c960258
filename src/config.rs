//! Process configuration from the environment

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram Bot API token.
    pub token: String,
    /// Sole administrator's user id; tickets and reports go here.
    pub admin_id: i64,
    /// SQLite database file path.
    pub db_path: String,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = std::env::var("BOT_TOKEN").map_err(|_| ConfigError::Missing("BOT_TOKEN"))?;

        let admin_raw = std::env::var("ADMIN_ID").map_err(|_| ConfigError::Missing("ADMIN_ID"))?;
        let admin_id = parse_admin_id(&admin_raw)?;

        let db_path = std::env::var("DESKBOT_DB_PATH").unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            format!("{home}/.deskbot/deskbot.db")
        });

        Ok(Self {
            token,
            admin_id,
            db_path,
        })
    }
}

fn parse_admin_id(raw: &str) -> Result<i64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name: "ADMIN_ID",
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_id_must_be_numeric() {
        assert_eq!(parse_admin_id("123456").unwrap(), 123_456);
        assert_eq!(parse_admin_id(" 42 ").unwrap(), 42);
        assert!(matches!(
            parse_admin_id("not-a-number"),
            Err(ConfigError::Invalid { name: "ADMIN_ID", .. })
        ));
    }
}
