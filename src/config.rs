//! Runtime configuration loaded from environment variables

use std::str::FromStr;
use std::time::Duration;

/// Tunables for the game rules and input bounds
#[derive(Debug, Clone)]
pub struct GameRules {
    /// Players needed before the admin can start
    pub min_players: usize,
    /// Unfinished games a single user may administer at once
    pub max_open_games: usize,
    /// Display names are truncated to this many characters
    pub max_name_length: usize,
    /// Max characters in a describe turn
    pub max_description_length: usize,
    /// Max drawing width/height
    pub max_image_size: u32,
    /// Max decoded size of a drawing's path data
    pub max_drawing_bytes: usize,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            min_players: 4,
            max_open_games: 10,
            max_name_length: 30,
            max_description_length: 100,
            max_image_size: 6000,
            max_drawing_bytes: 2_000_000,
        }
    }
}

impl GameRules {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_players: env_or("MIN_PLAYERS", defaults.min_players),
            max_open_games: env_or("MAX_OPEN_GAMES", defaults.max_open_games),
            max_name_length: env_or("MAX_NAME_LENGTH", defaults.max_name_length),
            max_description_length: env_or(
                "MAX_DESCRIPTION_LENGTH",
                defaults.max_description_length,
            ),
            max_image_size: env_or("MAX_IMAGE_SIZE", defaults.max_image_size),
            max_drawing_bytes: env_or("MAX_DRAWING_BYTES", defaults.max_drawing_bytes),
        }
    }
}

/// Server-level configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Required Origin header for mutating requests (None = not enforced)
    pub origin: Option<String>,
    /// How often sockets are pinged; silent peers are closed after one interval
    pub keepalive: Duration,
    /// Buffer size of the change notifier
    pub notifier_capacity: usize,
    pub rules: GameRules,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let origin = std::env::var("ORIGIN")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());

        if origin.is_none() {
            tracing::warn!("ORIGIN not set - same-origin checks DISABLED");
        }

        let keepalive_secs: u64 = env_or("KEEPALIVE_SECS", 30);

        Self {
            port: env_or("PORT", 8081),
            origin,
            keepalive: Duration::from_secs(keepalive_secs.max(1)),
            notifier_capacity: env_or::<usize>("NOTIFIER_CAPACITY", 256).max(1),
            rules: GameRules::from_env(),
        }
    }
}

/// Read and parse an env var, falling back to `default` when missing or invalid
fn env_or<T: FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Invalid value {:?} for {}, using {}", raw, key, default);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "PORT",
            "ORIGIN",
            "KEEPALIVE_SECS",
            "NOTIFIER_CAPACITY",
            "MIN_PLAYERS",
            "MAX_OPEN_GAMES",
            "MAX_NAME_LENGTH",
            "MAX_DESCRIPTION_LENGTH",
            "MAX_IMAGE_SIZE",
            "MAX_DRAWING_BYTES",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_when_unset() {
        clear_env();
        let config = ServerConfig::from_env();
        assert_eq!(config.port, 8081);
        assert!(config.origin.is_none());
        assert_eq!(config.keepalive, Duration::from_secs(30));
        assert_eq!(config.rules.min_players, 4);
        assert_eq!(config.rules.max_image_size, 6000);
    }

    #[test]
    #[serial]
    fn test_reads_overrides() {
        clear_env();
        std::env::set_var("PORT", "9000");
        std::env::set_var("ORIGIN", "https://draw.example.com/");
        std::env::set_var("MIN_PLAYERS", "3");
        std::env::set_var("KEEPALIVE_SECS", "5");

        let config = ServerConfig::from_env();
        assert_eq!(config.port, 9000);
        assert_eq!(config.origin.as_deref(), Some("https://draw.example.com"));
        assert_eq!(config.rules.min_players, 3);
        assert_eq!(config.keepalive, Duration::from_secs(5));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("MAX_OPEN_GAMES", "lots");
        std::env::set_var("ORIGIN", "   ");

        let config = ServerConfig::from_env();
        assert_eq!(config.rules.max_open_games, 10);
        assert!(config.origin.is_none());
        clear_env();
    }
}
