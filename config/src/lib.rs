pub mod paths;
pub mod settings;

pub use paths::PathManager;
pub use settings::{ConfigError, ParseMode, Settings, TurnConfig};

use directories::BaseDirs;

/// Load environment variables from .env files.
/// First loads from ~/.env (home directory), then from ./.env (working directory).
/// Working directory values take precedence over home directory values.
/// Call this before parsing CLI args so `env` fallbacks see the values.
pub fn load_env_file() {
    // dotenv never overwrites a variable that is already set, so the
    // higher-precedence file has to be read first.
    dotenv::dotenv().ok();

    if let Some(dirs) = BaseDirs::new() {
        dotenv::from_path(dirs.home_dir().join(".env")).ok();
    }
}
