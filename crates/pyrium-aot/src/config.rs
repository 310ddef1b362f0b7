//! Compiler configuration.
//!
//! Settings are layered: defaults, then `pyrium.toml`, then `PYRIUM_*`
//! environment variables. Command-line flags are applied on top by the
//! binary through [`Config::set`].

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::compiler::Lowerer;
use crate::compiler::lower::DEFAULT_ENTRY_POINT;
use crate::{Error, Result};

/// File name looked up in the working directory.
pub const CONFIG_FILE: &str = "pyrium.toml";

/// Prefix of environment overrides.
const ENV_PREFIX: &str = "PYRIUM_";

/// Configuration for a compilation run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Names of the functions to lower
    pub entry_points: Vec<String>,

    /// Directory for compiled modules; next to each input when unset
    pub out_dir: Option<PathBuf>,

    /// Lower every top-level function regardless of `entry_points`
    pub all_functions: bool,

    /// Worker threads for parallel compilation; rayon's default when unset
    pub threads: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            entry_points: vec![DEFAULT_ENTRY_POINT.to_string()],
            out_dir: None,
            all_functions: false,
            threads: None,
        }
    }
}

impl Config {
    /// Loads `pyrium.toml` from the working directory if present, then
    /// applies the environment.
    pub fn load_default() -> Result<Self> {
        let path = Path::new(CONFIG_FILE);
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        config.apply_env(std::env::vars())?;
        Ok(config)
    }

    /// Loads a config file, then applies the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path.as_ref())?;
        config.apply_env(std::env::vars())?;
        Ok(config)
    }

    /// Parses a config file without consulting the environment.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parses TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        check_entry_points(&config.entry_points)?;
        Ok(config)
    }

    /// Applies `PYRIUM_*` variables from `vars`. Other variables are
    /// ignored.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let key = match name {
                "ENTRY" => "entry_points",
                "OUT_DIR" => "out_dir",
                "ALL_FUNCTIONS" => "all_functions",
                "THREADS" => "threads",
                _ => continue,
            };
            self.set(key, &value).map_err(|e| match e {
                Error::Config(msg) => Error::Config(format!("{}{}: {}", ENV_PREFIX, name, msg)),
                other => other,
            })?;
        }
        Ok(())
    }

    /// Sets a configuration value from its string form.
    ///
    /// `entry_points` takes a comma-separated list with at least one name.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "entry_points" => {
                let names: Vec<String> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
                check_entry_points(&names)?;
                self.entry_points = names;
            }
            "out_dir" => self.out_dir = Some(PathBuf::from(value)),
            "all_functions" => self.all_functions = parse_bool(value)?,
            "threads" => {
                let n = value
                    .parse::<usize>()
                    .map_err(|_| Error::Config(format!("invalid thread count '{}'", value)))?;
                self.threads = (n > 0).then_some(n);
            }
            _ => return Err(Error::Config(format!("unknown key '{}'", key))),
        }
        Ok(())
    }

    /// Builds the lowerer these settings describe.
    pub fn lowerer(&self) -> Lowerer {
        if self.all_functions {
            Lowerer::all_functions()
        } else {
            Lowerer::with_entry_points(self.entry_points.iter().cloned())
        }
    }
}

// An empty list would silently lower every function.
fn check_entry_points(names: &[String]) -> Result<()> {
    if names.is_empty() {
        return Err(Error::Config(
            "entry_points must name at least one function; use all_functions to lower every function"
                .to_string(),
        ));
    }
    Ok(())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::Config(format!("invalid boolean '{}'", value))),
    }
}
