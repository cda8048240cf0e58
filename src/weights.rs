//! Base score per nudge type, with override merging and optional hot-reload
//! from the ranking settings file.
//!
//! Built-in table:
//!
//! | type         | base |
//! |--------------|------|
//! | `follow_up`  | 60   |
//! | `stale_lead` | 50   |
//! | `engagement` | 40   |
//! | `reminder`   | 30   |
//! | `insight`    | 20   |
//! | anything else| 25   |
//!
//! Overrides never mutate a table in place; `merged` returns a new one with
//! the overridden keys replaced and every other entry kept.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
    time::SystemTime,
};

use crate::config::{read_settings_file, DEFAULT_SETTINGS_PATH};
use crate::nudge::NudgeType;

/// Base score for types missing from the table.
pub const DEFAULT_BASE_SCORE: f64 = 25.0;

const BUILTIN_WEIGHTS: [(&str, f64); 5] = [
    ("follow_up", 60.0),
    ("stale_lead", 50.0),
    ("engagement", 40.0),
    ("reminder", 30.0),
    ("insight", 20.0),
];

/// Immutable type → base score table.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeWeights {
    table: BTreeMap<String, f64>,
}

impl Default for TypeWeights {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TypeWeights {
    pub fn builtin() -> Self {
        Self {
            table: BUILTIN_WEIGHTS
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }

    /// New table with `overrides` applied. Non-finite values are ignored;
    /// keys are trimmed, empty keys skipped. When a padded key and an exact
    /// key name the same type the exact key wins, whatever the input order.
    pub fn merged<I, K>(&self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let mut pending: Vec<(bool, String, f64)> = overrides
            .into_iter()
            .map(|(k, v)| {
                let raw = k.as_ref();
                (raw == raw.trim(), raw.to_string(), v)
            })
            .collect();
        // Padded keys first (sorted for a stable outcome), exact keys last.
        pending.sort_by(|a, b| match (a.0, b.0) {
            (false, false) => a.1.cmp(&b.1),
            (ea, eb) => ea.cmp(&eb),
        });

        let mut table = self.table.clone();
        for (exact, raw, v) in pending {
            let key = raw.trim();
            if key.is_empty() {
                continue;
            }
            if !v.is_finite() {
                tracing::warn!(target: "nudge_ranker", nudge_type = key, value = v, "ignoring non-finite type weight");
                continue;
            }
            if !exact {
                tracing::warn!(target: "nudge_ranker", nudge_type = key, raw = %raw, "type weight key has surrounding whitespace");
            }
            table.insert(key.to_string(), v);
        }
        Self { table }
    }

    pub fn base_for(&self, kind: &NudgeType) -> f64 {
        self.get(kind.as_str()).unwrap_or(DEFAULT_BASE_SCORE)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.table.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.table.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Hot-reload wrapper: re-reads the `type_weights` section of the settings
/// file whenever its mtime changes. A missing or unparsable file keeps the
/// last good table (the built-in one until a file has been read).
#[derive(Debug)]
pub struct HotReloadTypeWeights {
    path: PathBuf,
    inner: RwLock<State>,
}

#[derive(Debug)]
struct State {
    weights: TypeWeights,
    last_modified: Option<SystemTime>,
}

impl HotReloadTypeWeights {
    /// Create with a path (defaults to `config/nudge_ranking.toml` if `None`).
    pub fn new(path: Option<&Path>) -> Self {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH));
        Self {
            path,
            inner: RwLock::new(State {
                weights: TypeWeights::builtin(),
                last_modified: None,
            }),
        }
    }

    /// Latest table, reloading if the file changed.
    pub fn current(&self) -> TypeWeights {
        let mtime = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(_) => return self.read_state().weights.clone(),
        };

        {
            let guard = self.read_state();
            if guard.last_modified == Some(mtime) {
                return guard.weights.clone();
            }
        }

        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        // Double-check in case another caller reloaded meanwhile.
        if guard.last_modified != Some(mtime) {
            match read_settings_file(&self.path) {
                Ok(settings) => {
                    guard.weights = TypeWeights::builtin().merged(settings.type_weights);
                    guard.last_modified = Some(mtime);
                    tracing::info!(target: "nudge_ranker", path = %self.path.display(), "type weights reloaded");
                }
                Err(error) => {
                    tracing::warn!(target: "nudge_ranker", path = %self.path.display(), error = ?error, "type weights reload failed; keeping previous table");
                }
            }
        }
        guard.weights.clone()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }
}
