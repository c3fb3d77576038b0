use std::path::PathBuf;

/// Environment variable naming the SQLite database file.
pub const DB_ENV: &str = "BOX_TRACKER_DB";

/// Environment variable holding the tracing filter.
pub const LOG_ENV: &str = "RUST_LOG";

/// Runtime configuration for the CLI.
///
/// Resolved from defaults, then environment variables, then command-line
/// flags (`--db=PATH`, `--log=FILTER`); later sources win.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,

    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("box_tracker.db"),
            log_filter: "box_tracker=info".to_string(),
        }
    }
}

impl Config {
    /// Build from the process environment and `args`, returning the
    /// positional arguments left after flags are consumed.
    pub fn load(args: &[String]) -> (Self, Vec<String>) {
        Self::from_sources(
            std::env::var(DB_ENV).ok(),
            std::env::var(LOG_ENV).ok(),
            args,
        )
    }

    pub fn from_sources(
        env_db: Option<String>,
        env_log: Option<String>,
        args: &[String],
    ) -> (Self, Vec<String>) {
        let mut config = Config::default();

        if let Some(path) = env_db.filter(|p| !p.is_empty()) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(filter) = env_log.filter(|f| !f.is_empty()) {
            config.log_filter = filter;
        }

        let mut positional = Vec::new();
        for arg in args {
            if let Some(val) = arg.strip_prefix("--db=") {
                config.db_path = PathBuf::from(val);
            } else if let Some(val) = arg.strip_prefix("--log=") {
                config.log_filter = val.to_string();
            } else {
                positional.push(arg.clone());
            }
        }

        (config, positional)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let (config, rest) = Config::from_sources(None, None, &[]);
        assert_eq!(config, Config::default());
        assert!(rest.is_empty());
    }

    #[test]
    fn test_env_then_flags() {
        let (config, rest) = Config::from_sources(
            Some("/var/lib/boxes.db".to_string()),
            Some("debug".to_string()),
            &args(&["list", "--db=/tmp/other.db", "boxes"]),
        );

        assert_eq!(config.db_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.log_filter, "debug");
        assert_eq!(rest, args(&["list", "boxes"]));
    }

    #[test]
    fn test_empty_env_ignored() {
        let (config, _) = Config::from_sources(Some(String::new()), None, &[]);
        assert_eq!(config.db_path, PathBuf::from("box_tracker.db"));
    }
}
