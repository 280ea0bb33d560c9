//! Configuration management CLI commands.
//!
//! Provides `config get`, `config set`, `config list`, and `config path`.

use clap::Subcommand;
use tilechanges::config::{ConfigFile, ConfigKey};

use super::common::GlobalOptions;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., store.backend)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., store.backend)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(options: &GlobalOptions, command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(options, &key),
        ConfigCommands::Set { key, value } => run_set(options, &key, &value),
        ConfigCommands::List => run_list(options),
        ConfigCommands::Path => {
            println!("{}", options.config_path().display());
            Ok(())
        }
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'tilechanges config list' to see available keys.",
            key
        ))
    })
}

fn run_get(options: &GlobalOptions, key: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let config = options.load_config()?;
    let value = config_key.get(&config);

    if value.is_empty() {
        println!("(not set)");
    } else {
        println!("{}", value);
    }
    Ok(())
}

fn run_set(options: &GlobalOptions, key: &str, value: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let mut config = options.load_config()?;
    config_key.set(&mut config, value)?;
    config.save_to(options.config_path())?;

    println!("Set {} = {}", config_key.name(), value);
    Ok(())
}

fn run_list(options: &GlobalOptions) -> Result<(), CliError> {
    let config = options.load_config()?;
    print!("{}", render_list(&config));
    Ok(())
}

/// Settings grouped by section, one `key = value` per line.
fn render_list(config: &ConfigFile) -> String {
    let mut out = String::new();
    let mut current_section = "";

    for key in ConfigKey::all() {
        let section = key.section();
        if section != current_section {
            if !current_section.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("[{}]\n", section));
            current_section = section;
        }

        let value = key.get(config);
        if value.is_empty() {
            out.push_str(&format!("  {} = (not set)\n", key.key_name()));
        } else {
            out.push_str(&format!("  {} = {}\n", key.key_name(), value));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_list_groups_sections() {
        let rendered = render_list(&ConfigFile::default());
        assert!(rendered.starts_with("[store]\n  backend = file\n"));
        assert!(rendered.contains("\n[logging]\n  level = info\n  directory = (not set)\n"));
        assert!(rendered.ends_with("[changes]\n  default_tile_matrix_set = WebMercatorQuad\n"));
    }

    #[test]
    fn test_set_writes_override_path() {
        let temp = TempDir::new().unwrap();
        let options = GlobalOptions {
            config_path: Some(temp.path().join("config.ini")),
        };
        run_set(&options, "store.backend", "memory").unwrap();
        let config = options.load_config().unwrap();
        assert_eq!(ConfigKey::StoreBackend.get(&config), "memory");
    }

    #[test]
    fn test_unknown_key() {
        assert!(matches!(parse_key("nope.nope"), Err(CliError::Config(_))));
    }
}
