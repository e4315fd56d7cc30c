//! Service configuration: environment variables with defaults.

use anyhow::Context;
use derive_getters::Getters;
use std::env;
use std::str::FromStr;

const DEFAULT_ALPHABET: &str = "ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Runtime knobs for the room service.
///
/// Every field has a default; `from_env` overrides from the environment and
/// fails at boot on unparseable values rather than at first use.
#[derive(Debug, Clone, Getters)]
pub struct Settings {
    /// Characters per room code.
    room_code_length: usize,
    /// Seconds a disconnected player has to return before forfeiting.
    reconnection_grace_period_seconds: u64,
    /// Seconds a player has to move before forfeiting.
    turn_timeout_seconds: u64,
    /// Seconds after game over during which a rematch may be agreed.
    rematch_window_seconds: u64,
    /// Alphabet room codes are drawn from (no 0/O/1/I/L).
    room_code_alphabet: String,
    /// Seats per room.
    max_players_per_room: usize,
    /// Cells per board.
    board_size: usize,
    /// Seconds of inactivity before a never-started room is swept.
    idle_room_timeout_seconds: u64,
    /// Seconds between sweeper passes.
    room_sweep_interval_seconds: u64,
    /// TCP port to listen on.
    port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            room_code_length: 6,
            reconnection_grace_period_seconds: 30,
            turn_timeout_seconds: 30,
            rematch_window_seconds: 30,
            room_code_alphabet: DEFAULT_ALPHABET.to_string(),
            max_players_per_room: 2,
            board_size: 9,
            idle_room_timeout_seconds: 300,
            room_sweep_interval_seconds: 60,
            port: 8080,
        }
    }
}

impl Settings {
    /// Reads settings from the environment, falling back to defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            room_code_length: read_env_or("ROOM_CODE_LENGTH", defaults.room_code_length)?,
            reconnection_grace_period_seconds: read_env_or(
                "RECONNECTION_GRACE_PERIOD_SECONDS",
                defaults.reconnection_grace_period_seconds,
            )?,
            turn_timeout_seconds: read_env_or(
                "TURN_TIMEOUT_SECONDS",
                defaults.turn_timeout_seconds,
            )?,
            rematch_window_seconds: read_env_or(
                "REMATCH_WINDOW_SECONDS",
                defaults.rematch_window_seconds,
            )?,
            room_code_alphabet: env::var("ROOM_CODE_ALPHABET")
                .unwrap_or(defaults.room_code_alphabet),
            max_players_per_room: read_env_or(
                "MAX_PLAYERS_PER_ROOM",
                defaults.max_players_per_room,
            )?,
            board_size: read_env_or("BOARD_SIZE", defaults.board_size)?,
            idle_room_timeout_seconds: read_env_or(
                "IDLE_ROOM_TIMEOUT_SECONDS",
                defaults.idle_room_timeout_seconds,
            )?,
            room_sweep_interval_seconds: read_env_or(
                "ROOM_SWEEP_INTERVAL_SECONDS",
                defaults.room_sweep_interval_seconds,
            )?,
            port: read_env_or("PORT", defaults.port)?,
        })
    }

    /// Overrides the listen port (CLI flag beats environment).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

fn read_env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(*settings.room_code_length(), 6);
        assert_eq!(*settings.reconnection_grace_period_seconds(), 30);
        assert_eq!(*settings.turn_timeout_seconds(), 30);
        assert_eq!(*settings.rematch_window_seconds(), 30);
        assert_eq!(settings.room_code_alphabet(), DEFAULT_ALPHABET);
        assert_eq!(*settings.max_players_per_room(), 2);
        assert_eq!(*settings.board_size(), 9);
        assert_eq!(*settings.idle_room_timeout_seconds(), 300);
        assert_eq!(*settings.room_sweep_interval_seconds(), 60);
        assert_eq!(*settings.port(), 8080);
    }
}
