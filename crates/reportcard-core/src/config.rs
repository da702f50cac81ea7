// Configuration loading and parsing (reportcard.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the single config file under `config/` (and `defaults/`).
pub const CONFIG_FILE: &str = "reportcard.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub resolution: ResolutionConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub db_path: String,
    pub thresholds_path: String,
}

/// Settings for binding free-text names in uploads to roster athletes.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolutionConfig {
    /// Similarity ratio (0.0 - 1.0) a roster name must reach to be suggested.
    pub similarity_floor: f64,
    /// How many suggestions to offer per unrecognized name.
    pub max_suggestions: usize,
    /// When true the best suggestion is bound automatically; otherwise the
    /// name stays unresolved until the operator maps it explicitly.
    #[serde(default = "default_accept_closest")]
    pub accept_closest: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            similarity_floor: 0.6,
            max_suggestions: 3,
            accept_closest: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_note_placeholder")]
    pub note_placeholder: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            note_placeholder: default_note_placeholder(),
        }
    }
}

fn default_accept_closest() -> bool {
    true
}

fn default_note_placeholder() -> String {
    crate::notes::NO_NOTES_PLACEHOLDER.to_string()
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/reportcard.toml` relative to `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let config: Config = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    validate(&config)?;

    Ok(config)
}

/// Seed `config/` from `defaults/`: every default file that has no copy in
/// `config/` yet is copied over. Existing copies are never touched and
/// `*.example` files are not seeded. Returns the paths written.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        return if config_dir.is_dir() {
            Ok(Vec::new())
        } else {
            Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "no defaults/ or config/ directory under {}",
                    base_dir.display()
                ),
            })
        };
    }

    let seed_err = |what: &str, path: &Path, e: std::io::Error| ConfigError::DefaultsCopyError {
        message: format!("{what} {}: {e}", path.display()),
    };

    std::fs::create_dir_all(&config_dir).map_err(|e| seed_err("cannot create", &config_dir, e))?;
    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| seed_err("cannot list", &defaults_dir, e))?;

    let mut seeded = Vec::new();
    for entry in entries {
        let source = entry.map_err(|e| seed_err("cannot list", &defaults_dir, e))?.path();
        let Some(name) = source.file_name().filter(|_| source.is_file()) else {
            continue;
        };
        if name.to_string_lossy().ends_with(".example") {
            continue;
        }
        let target = config_dir.join(name);
        if seed_file(&source, &target).map_err(|e| seed_err("cannot seed", &target, e))? {
            seeded.push(target);
        }
    }
    Ok(seeded)
}

/// Copy `source` to `target` unless `target` already exists. The existence
/// check and creation are one atomic step (`create_new`).
fn seed_file(source: &Path, target: &Path) -> std::io::Result<bool> {
    use std::io::Write;

    let mut dest = match std::fs::OpenOptions::new().write(true).create_new(true).open(target) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e),
    };
    dest.write_all(&std::fs::read(source)?)?;
    Ok(true)
}

/// Convenience wrapper: loads config relative to `base_dir`, copying
/// defaults into `config/` first.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_files(base_dir)?;
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let storage_fields: &[(&str, &str)] = &[
        ("storage.db_path", &config.storage.db_path),
        ("storage.thresholds_path", &config.storage.thresholds_path),
    ];
    for (name, val) in storage_fields {
        if val.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must not be empty".into(),
            });
        }
    }

    let floor = config.resolution.similarity_floor;
    if !(0.0..=1.0).contains(&floor) {
        return Err(ConfigError::ValidationError {
            field: "resolution.similarity_floor".into(),
            message: format!("must be between 0.0 and 1.0 inclusive, got {floor}"),
        });
    }

    if config.resolution.max_suggestions == 0 {
        return Err(ConfigError::ValidationError {
            field: "resolution.max_suggestions".into(),
            message: "must be > 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// The workspace-level `defaults/` directory.
    fn defaults_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../defaults")
    }

    fn write_config(dir: &Path, text: &str) {
        let config_dir = dir.join("config");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join(CONFIG_FILE), text).unwrap();
    }

    fn default_text() -> String {
        fs::read_to_string(defaults_dir().join(CONFIG_FILE)).unwrap()
    }

    #[test]
    fn load_valid_config_from_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(tmp.path(), &default_text());

        let config = load_config_from(tmp.path()).expect("should load valid config");
        assert_eq!(config.storage.db_path, "reportcard.db");
        assert_eq!(config.storage.thresholds_path, "data/thresholds.csv");
        assert!((config.resolution.similarity_floor - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.resolution.max_suggestions, 3);
        assert!(config.resolution.accept_closest);
        assert_eq!(config.report.note_placeholder, "No scout notes available.");
    }

    #[test]
    fn report_section_is_optional() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(
            tmp.path(),
            r#"
[storage]
db_path = "x.db"
thresholds_path = "t.csv"

[resolution]
similarity_floor = 0.5
max_suggestions = 2
"#,
        );

        let config = load_config_from(tmp.path()).unwrap();
        assert_eq!(config.report.note_placeholder, "No scout notes available.");
        // Omitted key behaves like ResolutionConfig::default().
        assert_eq!(config.resolution.accept_closest, ResolutionConfig::default().accept_closest);
        assert!(config.resolution.accept_closest);
    }

    #[test]
    fn rejects_similarity_floor_above_one() {
        let tmp = tempfile::tempdir().unwrap();
        let modified = default_text().replace("similarity_floor = 0.6", "similarity_floor = 1.5");
        write_config(tmp.path(), &modified);

        let err = load_config_from(tmp.path()).unwrap_err();
        match &err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "resolution.similarity_floor");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn rejects_zero_suggestions() {
        let tmp = tempfile::tempdir().unwrap();
        let modified = default_text().replace("max_suggestions = 3", "max_suggestions = 0");
        write_config(tmp.path(), &modified);

        let err = load_config_from(tmp.path()).unwrap_err();
        match &err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "resolution.max_suggestions");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn rejects_empty_db_path() {
        let tmp = tempfile::tempdir().unwrap();
        let modified = default_text().replace("db_path = \"reportcard.db\"", "db_path = \"  \"");
        write_config(tmp.path(), &modified);

        let err = load_config_from(tmp.path()).unwrap_err();
        match &err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "storage.db_path"),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn file_not_found_for_missing_config() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("config")).unwrap();

        let err = load_config_from(tmp.path()).unwrap_err();
        match &err {
            ConfigError::FileNotFound { path } => assert!(path.ends_with(CONFIG_FILE)),
            other => panic!("expected FileNotFound, got: {other}"),
        }
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(tmp.path(), "this is not valid [[[ toml");

        let err = load_config_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn ensure_config_files_copies_missing_files() {
        let tmp = tempfile::tempdir().unwrap();
        let defaults = tmp.path().join("defaults");
        fs::create_dir_all(&defaults).unwrap();
        fs::write(defaults.join(CONFIG_FILE), default_text()).unwrap();
        fs::write(defaults.join("notes.toml.example"), "# example\n").unwrap();

        let copied = ensure_config_files(tmp.path()).expect("should succeed");
        assert_eq!(copied.len(), 1);
        assert!(tmp.path().join("config").join(CONFIG_FILE).exists());
        assert!(!tmp.path().join("config/notes.toml.example").exists());

        // Second run finds everything in place.
        let copied = ensure_config_files(tmp.path()).unwrap();
        assert!(copied.is_empty());
    }

    #[test]
    fn ensure_config_files_keeps_existing_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let defaults = tmp.path().join("defaults");
        fs::create_dir_all(&defaults).unwrap();
        fs::write(defaults.join(CONFIG_FILE), default_text()).unwrap();
        write_config(tmp.path(), "# custom\n");

        let copied = ensure_config_files(tmp.path()).unwrap();
        assert!(copied.is_empty());
        let content = fs::read_to_string(tmp.path().join("config").join(CONFIG_FILE)).unwrap();
        assert_eq!(content, "# custom\n");
    }

    #[test]
    fn ensure_config_files_errors_when_both_dirs_missing() {
        let tmp = tempfile::tempdir().unwrap();

        let err = ensure_config_files(tmp.path()).unwrap_err();
        match &err {
            ConfigError::DefaultsCopyError { message } => {
                assert!(message.contains("no defaults/ or config/"));
            }
            other => panic!("expected DefaultsCopyError, got: {other}"),
        }
    }

    #[test]
    fn ensure_config_files_without_defaults_uses_config_dir() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(tmp.path(), &default_text());

        let copied = ensure_config_files(tmp.path()).unwrap();
        assert!(copied.is_empty());
        assert!(load_config(tmp.path()).is_ok());
    }
}
