//! Runner settings and the line-oriented configuration files.
//!
//! Locations are fixed relative to the working directory:
//! - `Program Data/settings.toml`: optional [`RunnerSettings`]
//! - `Program Data/tickers.txt`: one ticker per line
//! - `Program Data/roles.txt`: `roleName,numericId`
//! - `Program Data/hooks.txt`: `sectorCategory,webhookUrl`
//!
//! The three `.txt` files are required. Blank lines are skipped and fields
//! are trimmed; anything else that does not parse is a [`ConfigError`]
//! naming the file and line.

use serde::{Deserialize, Serialize};
use sectorwatch_core::{Role, SectorCategory};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const PROGRAM_DIR: &str = "Program Data";
pub const SERIES_DIR: &str = "Ticker Data";
pub const SETTINGS_FILE: &str = "settings.toml";
pub const TICKERS_FILE: &str = "tickers.txt";
pub const ROLES_FILE: &str = "roles.txt";
pub const HOOKS_FILE: &str = "hooks.txt";
pub const LOG_FILE: &str = "program.log";

/// Errors from loading configuration. All of them abort the run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    Malformed {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("invalid settings in {}: {source}", path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Optional overrides read from `Program Data/settings.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Directory holding tickers, roles and hooks. The log and this settings
    /// file always stay in `Program Data/`.
    pub program_dir: PathBuf,
    /// Directory holding one CSV series per symbol.
    pub series_dir: PathBuf,
    /// Worker pool size. `None` uses the available parallelism.
    pub worker_threads: Option<usize>,
    pub http_timeout_secs: u64,
    /// Webhook used when a symbol's sector has no configured hook.
    pub fallback_webhook: Option<String>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            program_dir: PathBuf::from(PROGRAM_DIR),
            series_dir: PathBuf::from(SERIES_DIR),
            worker_threads: None,
            http_timeout_secs: 30,
            fallback_webhook: None,
        }
    }
}

impl RunnerSettings {
    /// Load settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_toml(&text).map_err(|source| ConfigError::Settings {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn tickers_path(&self) -> PathBuf {
        self.program_dir.join(TICKERS_FILE)
    }

    pub fn roles_path(&self) -> PathBuf {
        self.program_dir.join(ROLES_FILE)
    }

    pub fn hooks_path(&self) -> PathBuf {
        self.program_dir.join(HOOKS_FILE)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Read the ticker list, normalized to uppercase with duplicates removed
/// (first occurrence wins), so no two tasks ever own the same series file.
pub fn load_tickers(path: &Path) -> Result<Vec<String>, ConfigError> {
    let mut seen = HashSet::new();
    let mut tickers = Vec::new();
    for (line, fields) in read_records(path, 1)? {
        let ticker = fields[0].to_uppercase();
        if seen.insert(ticker.clone()) {
            tickers.push(ticker);
        } else {
            tracing::warn!(symbol = %ticker, line, "duplicate ticker ignored");
        }
    }
    Ok(tickers)
}

/// Role name → numeric mention ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleIds(HashMap<String, u64>);

impl RoleIds {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut ids = HashMap::new();
        for (line, fields) in read_records(path, 2)? {
            let id = fields[1].parse::<u64>().map_err(|_| ConfigError::Malformed {
                path: path.to_path_buf(),
                line,
                message: format!("role ID '{}' is not a number", fields[1]),
            })?;
            ids.insert(fields[0].clone(), id);
        }
        Ok(Self(ids))
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn get(&self, role: Role) -> Option<u64> {
        self.0.get(role.name()).copied()
    }

    /// `<@&{id}>` for each role with a configured ID, in role order.
    pub fn mentions(&self, roles: &[Role]) -> String {
        roles
            .iter()
            .filter_map(|role| self.get(*role))
            .map(|id| format!("<@&{id}>"))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Sector category → webhook URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectorHooks(HashMap<SectorCategory, String>);

impl SectorHooks {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut hooks = HashMap::new();
        for (line, mut fields) in read_records(path, 2)? {
            let category =
                fields[0]
                    .parse::<SectorCategory>()
                    .map_err(|e| ConfigError::Malformed {
                        path: path.to_path_buf(),
                        line,
                        message: e.to_string(),
                    })?;
            hooks.insert(category, fields.swap_remove(1));
        }
        Ok(Self(hooks))
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (SectorCategory, S)>,
        S: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k, v.into())).collect())
    }

    pub fn get(&self, category: SectorCategory) -> Option<&str> {
        self.0.get(&category).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Read a headerless CSV file of exactly `fields` columns.
///
/// Returns `(line, trimmed fields)` per non-blank record.
fn read_records(path: &Path, fields: usize) -> Result<Vec<(u64, Vec<String>)>, ConfigError> {
    let malformed = |line: u64, message: String| ConfigError::Malformed {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| match e.into_kind() {
            csv::ErrorKind::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            other => malformed(0, format!("{other:?}")),
        })?;

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| {
            let line = e.position().map_or(0, |p| p.line());
            malformed(line, e.to_string())
        })?;
        let line = record.position().map_or(0, |p| p.line());

        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.len() != fields {
            return Err(malformed(
                line,
                format!("expected {fields} field(s), found {}", record.len()),
            ));
        }
        records.push((line, record.iter().map(str::to_string).collect()));
    }
    Ok(records)
}
