use crate::error::{DaemonError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Platform null device used as the default redirection target
pub const NULL_DEVICE: &str = "/dev/null";

/// Self-test defaults
const DEFAULT_PID_FILE: &str = "/tmp/daemon.pid";
const DEFAULT_LOG_FILE: &str = "/tmp/daemon.log";

/// Lifecycle configuration held by the controller for its whole lifetime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Path of the PID file
    pub pid_file: PathBuf,

    /// Source for standard input once detached
    #[serde(default = "default_stream")]
    pub stdin: PathBuf,

    /// Sink for standard output once detached
    #[serde(default = "default_stream")]
    pub stdout: PathBuf,

    /// Sink for standard error once detached
    #[serde(default = "default_stream")]
    pub stderr: PathBuf,
}

fn default_stream() -> PathBuf {
    PathBuf::from(NULL_DEVICE)
}

impl DaemonConfig {
    /// Create a configuration with all three streams pointed at the null device
    pub fn new<P: AsRef<Path>>(pid_file: P) -> Self {
        Self {
            pid_file: pid_file.as_ref().to_path_buf(),
            stdin: default_stream(),
            stdout: default_stream(),
            stderr: default_stream(),
        }
    }

    pub fn with_stdin<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.stdin = path.as_ref().to_path_buf();
        self
    }

    pub fn with_stdout<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.stdout = path.as_ref().to_path_buf();
        self
    }

    pub fn with_stderr<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.stderr = path.as_ref().to_path_buf();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("pid_file", &self.pid_file),
            ("stdin", &self.stdin),
            ("stdout", &self.stdout),
            ("stderr", &self.stderr),
        ];

        for (name, path) in fields {
            if path.as_os_str().is_empty() {
                return Err(DaemonError::MissingConfigField(name.to_string()));
            }
        }

        if self.pid_file.is_dir() {
            return Err(DaemonError::ConfigValidationError(format!(
                "pid_file is a directory: {}",
                self.pid_file.display()
            )));
        }

        Ok(())
    }

    /// Anchor relative paths at `base`.
    ///
    /// The daemon changes its working directory to `/` before it opens any
    /// of these paths, so relative paths have to be fixed up beforehand.
    pub fn resolve_relative_to(&self, base: &Path) -> Self {
        let anchor = |path: &PathBuf| {
            if path.is_relative() {
                base.join(path)
            } else {
                path.clone()
            }
        };

        Self {
            pid_file: anchor(&self.pid_file),
            stdin: anchor(&self.stdin),
            stdout: anchor(&self.stdout),
            stderr: anchor(&self.stderr),
        }
    }

    fn expand_env_vars(&mut self) {
        self.pid_file = expand_env_in_path(&self.pid_file);
        self.stdin = expand_env_in_path(&self.stdin);
        self.stdout = expand_env_in_path(&self.stdout);
        self.stderr = expand_env_in_path(&self.stderr);
    }
}

/// Settings for the self-test heartbeat work loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Seconds between two heartbeat lines
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Return from the work routine after this many lines; loop forever when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beats: Option<usize>,
}

fn default_interval() -> u64 {
    2
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(DaemonError::ConfigValidationError(
                "interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            beats: None,
        }
    }
}

/// Contents of a settings file for the `daemonkit` binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::new(DEFAULT_PID_FILE)
                .with_stdout(DEFAULT_LOG_FILE)
                .with_stderr(DEFAULT_LOG_FILE),
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from a file (supports TOML and JSON)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DaemonError::ConfigError(format!("Failed to read config file: {}", e)))?;

        // Determine format based on file extension
        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let mut settings = match extension {
            "toml" => Self::parse_toml(&contents)?,
            "json" => Self::parse_json(&contents)?,
            _ => {
                return Err(DaemonError::InvalidConfig(format!(
                    "Unsupported file format: {}. Use .toml or .json",
                    extension
                )))
            }
        };

        settings.daemon.expand_env_vars();
        settings.validate()?;

        Ok(settings)
    }

    fn parse_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| DaemonError::InvalidConfig(format!("Failed to parse TOML: {}", e)))
    }

    fn parse_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| DaemonError::InvalidConfig(format!("Failed to parse JSON: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        self.daemon.validate()?;
        self.heartbeat.validate()
    }
}

/// Expand `$VAR` and `${VAR}` references in a string
fn expand_env_in_string(s: &str) -> String {
    expand_vars(s, |name| std::env::var(name).ok())
}

/// Single left-to-right pass: a name is the whole `[A-Za-z0-9_]+` run (or
/// the braced text), substituted values are never rescanned, and unknown
/// references are left as written.
fn expand_vars<F>(s: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let is_name_char = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, reference_len) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(end) if end > 0 && braced[..end].chars().all(is_name_char) => {
                    (&braced[..end], end + 2)
                }
                _ => ("", 0),
            },
            None => {
                let len = after.find(|c: char| !is_name_char(c)).unwrap_or(after.len());
                (&after[..len], len)
            }
        };

        if name.is_empty() {
            result.push('$');
            rest = after;
            continue;
        }

        match lookup(name) {
            Some(value) => result.push_str(&value),
            None => {
                result.push('$');
                result.push_str(&after[..reference_len]);
            }
        }
        rest = &after[reference_len..];
    }

    result.push_str(rest);
    result
}

fn expand_env_in_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(expand_env_in_string(&path_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_new_defaults_streams_to_null_device() {
        let config = DaemonConfig::new("/run/test.pid");
        assert_eq!(config.pid_file, PathBuf::from("/run/test.pid"));
        assert_eq!(config.stdin, PathBuf::from(NULL_DEVICE));
        assert_eq!(config.stdout, PathBuf::from(NULL_DEVICE));
        assert_eq!(config.stderr, PathBuf::from(NULL_DEVICE));
    }

    #[test]
    fn test_settings_default_matches_self_test() {
        let settings = Settings::default();
        assert_eq!(settings.daemon.pid_file, PathBuf::from("/tmp/daemon.pid"));
        assert_eq!(settings.daemon.stdout, PathBuf::from("/tmp/daemon.log"));
        assert_eq!(settings.daemon.stderr, PathBuf::from("/tmp/daemon.log"));
        assert_eq!(settings.daemon.stdin, PathBuf::from(NULL_DEVICE));
        assert_eq!(settings.heartbeat.interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_validate_empty_pid_file() {
        let config = DaemonConfig::new("");
        match config.validate() {
            Err(DaemonError::MissingConfigField(field)) => assert_eq!(field, "pid_file"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_pid_file_directory() {
        let temp_dir = TempDir::new().unwrap();
        let config = DaemonConfig::new(temp_dir.path());
        assert!(matches!(
            config.validate(),
            Err(DaemonError::ConfigValidationError(_))
        ));
    }

    #[test]
    fn test_validate_zero_interval() {
        let heartbeat = HeartbeatConfig {
            interval_secs: 0,
            beats: None,
        };
        assert!(heartbeat.validate().is_err());
    }

    #[test]
    fn test_resolve_relative_to() {
        let config = DaemonConfig::new("run/daemon.pid").with_stdout("/var/log/daemon.log");
        let resolved = config.resolve_relative_to(Path::new("/srv/app"));

        assert_eq!(resolved.pid_file, PathBuf::from("/srv/app/run/daemon.pid"));
        assert_eq!(resolved.stdout, PathBuf::from("/var/log/daemon.log"));
        assert_eq!(resolved.stdin, PathBuf::from(NULL_DEVICE));
    }

    #[test]
    fn test_expand_env_in_string() {
        std::env::set_var("DAEMONKIT_TEST_RUNDIR", "/run/user/1000");
        assert_eq!(
            expand_env_in_string("${DAEMONKIT_TEST_RUNDIR}/daemon.pid"),
            "/run/user/1000/daemon.pid"
        );
        assert_eq!(
            expand_env_in_string("$DAEMONKIT_TEST_RUNDIR/daemon.pid"),
            "/run/user/1000/daemon.pid"
        );
    }

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| {
            vars.iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn test_expand_vars_matches_whole_names() {
        let lookup = lookup_from(&[("HOME", "/root")]);
        assert_eq!(expand_vars("$HOME_X/daemon.pid", &lookup), "$HOME_X/daemon.pid");
        assert_eq!(expand_vars("$HOME/daemon.pid", &lookup), "/root/daemon.pid");
        assert_eq!(expand_vars("${HOME}_X/daemon.pid", &lookup), "/root_X/daemon.pid");
    }

    #[test]
    fn test_expand_vars_does_not_rescan_values() {
        let lookup = lookup_from(&[("A", "$B"), ("B", "/never")]);
        assert_eq!(expand_vars("$A/x", &lookup), "$B/x");
    }

    #[test]
    fn test_expand_vars_leaves_stray_dollars() {
        let lookup = lookup_from(&[("RUN", "/run")]);
        assert_eq!(expand_vars("/tmp/$", &lookup), "/tmp/$");
        assert_eq!(expand_vars("/tmp/$-x", &lookup), "/tmp/$-x");
        assert_eq!(expand_vars("${RUN", &lookup), "${RUN");
        assert_eq!(expand_vars("${}/x", &lookup), "${}/x");
        assert_eq!(expand_vars("$$RUN", &lookup), "$/run");
    }

    #[test]
    fn test_parse_toml() {
        let toml_content = r#"
            [daemon]
            pid_file = "/tmp/test.pid"
            stdout = "/tmp/test.log"

            [heartbeat]
            interval_secs = 5
            beats = 3
        "#;

        let settings = Settings::parse_toml(toml_content).unwrap();
        assert_eq!(settings.daemon.pid_file, PathBuf::from("/tmp/test.pid"));
        assert_eq!(settings.daemon.stdout, PathBuf::from("/tmp/test.log"));
        assert_eq!(settings.daemon.stderr, PathBuf::from(NULL_DEVICE));
        assert_eq!(settings.heartbeat.interval_secs, 5);
        assert_eq!(settings.heartbeat.beats, Some(3));
    }

    #[test]
    fn test_parse_toml_missing_pid_file() {
        let toml_content = r#"
            [daemon]
            stdout = "/tmp/test.log"
        "#;

        assert!(matches!(
            Settings::parse_toml(toml_content),
            Err(DaemonError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_parse_json() {
        let json_content = r#"{
            "daemon": { "pid_file": "/tmp/test.pid", "stderr": "/tmp/err.log" }
        }"#;

        let settings = Settings::parse_json(json_content).unwrap();
        assert_eq!(settings.daemon.pid_file, PathBuf::from("/tmp/test.pid"));
        assert_eq!(settings.daemon.stderr, PathBuf::from("/tmp/err.log"));
        assert_eq!(settings.heartbeat, HeartbeatConfig::default());
    }

    #[test]
    fn test_from_file_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("daemon.toml");
        fs::write(
            &config_path,
            "[daemon]\npid_file = \"/tmp/from-file.pid\"\n",
        )
        .unwrap();

        let settings = Settings::from_file(&config_path).unwrap();
        assert_eq!(settings.daemon.pid_file, PathBuf::from("/tmp/from-file.pid"));
    }

    #[test]
    fn test_from_file_unsupported_format() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("daemon.yaml");
        fs::write(&config_path, "daemon: {}").unwrap();

        assert!(matches!(
            Settings::from_file(&config_path),
            Err(DaemonError::InvalidConfig(_))
        ));
    }
}
