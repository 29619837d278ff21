//! Multi-tier TOML configuration for Bulwark.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > project > global > defaults

use bulwark_hooks::{HookExecutor, HookRegistry};
use bulwark_permissions::{PermissionMode, PermissionRule};
use bulwark_types::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default shell command timeout in milliseconds.
pub const DEFAULT_SHELL_TIMEOUT_MS: u64 = 120_000;

/// Upper bound for the shell command timeout.
pub const MAX_SHELL_TIMEOUT_MS: u64 = 600_000;

/// File name of a hook namespace document inside its root.
pub const HOOKS_FILE: &str = "hooks.json";

/// Resolved configuration for a Bulwark session.
#[derive(Debug, Clone)]
pub struct BulwarkConfig {
    pub config_dir: PathBuf,
    pub project_dir: PathBuf,
    pub permission_mode: PermissionMode,
    /// Project rules first, then global rules; first match wins.
    pub permission_rules: Vec<PermissionRule>,
    pub shell_timeout_ms: u64,
    /// Global namespaces first, then project namespaces. Roots are absolute.
    pub hook_namespaces: Vec<NamespaceSettings>,
    pub hook_flags: BTreeMap<String, bool>,
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub permissions: PermissionsSettings,
    #[serde(default)]
    pub shell: ShellSettings,
    #[serde(default)]
    pub hooks: HooksSettings,
}

/// Permission section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionsSettings {
    pub mode: Option<PermissionMode>,
    #[serde(default)]
    pub rules: Vec<PermissionRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShellSettings {
    pub timeout_ms: Option<u64>,
}

/// Hook section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HooksSettings {
    #[serde(default)]
    pub namespaces: Vec<NamespaceSettings>,
    /// Feature flags exposed to hook commands as `${FLAG_<NAME>}`.
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
}

/// A hook namespace: a name plus the directory holding its `hooks.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSettings {
    pub name: String,
    pub root: PathBuf,
}

/// Raw environment overrides, validated during resolution.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    /// `BULWARK_PERMISSION_MODE`
    pub permission_mode: Option<String>,
    /// `BULWARK_SHELL_TIMEOUT_MS`
    pub shell_timeout_ms: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            permission_mode: std::env::var("BULWARK_PERMISSION_MODE").ok(),
            shell_timeout_ms: std::env::var("BULWARK_SHELL_TIMEOUT_MS").ok(),
        }
    }
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub permission_mode: Option<PermissionMode>,
    /// Project directory (default: the current directory).
    pub project_dir: Option<PathBuf>,
}

impl BulwarkConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables
    /// 3. Project config (`<project>/.bulwark/config.toml`)
    /// 4. Global config (`~/.bulwark/config.toml`)
    /// 5. Defaults
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let project_dir = match &overrides.project_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(|e| ConfigError::InvalidValue {
                key: "project_dir".into(),
                message: e.to_string(),
            })?,
        };
        Self::resolve(&config_dir(), &project_dir, EnvOverrides::from_env(), overrides)
    }

    /// Resolve from explicit locations. `load` delegates here.
    pub fn resolve(
        config_dir: &Path,
        project_dir: &Path,
        env: EnvOverrides,
        overrides: CliOverrides,
    ) -> Result<Self, ConfigError> {
        let global = load_settings_file(&config_dir.join("config.toml"));
        let project = load_settings_file(&project_config_path(project_dir));

        // Resolve permission mode: CLI > env > project > global > default
        let env_mode = env
            .permission_mode
            .as_deref()
            .map(|s| {
                s.parse::<PermissionMode>().map_err(|message| ConfigError::InvalidValue {
                    key: "BULWARK_PERMISSION_MODE".into(),
                    message,
                })
            })
            .transpose()?;
        let permission_mode = overrides
            .permission_mode
            .or(env_mode)
            .or(project.permissions.mode)
            .or(global.permissions.mode)
            .unwrap_or_default();

        // Resolve shell timeout: env > project > global > default
        let env_timeout = env
            .shell_timeout_ms
            .as_deref()
            .map(|s| {
                s.trim().parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                    key: "BULWARK_SHELL_TIMEOUT_MS".into(),
                    message: e.to_string(),
                })
            })
            .transpose()?;
        let requested_timeout = env_timeout
            .or(project.shell.timeout_ms)
            .or(global.shell.timeout_ms)
            .unwrap_or(DEFAULT_SHELL_TIMEOUT_MS);
        if requested_timeout > MAX_SHELL_TIMEOUT_MS {
            tracing::warn!(
                requested = requested_timeout,
                max = MAX_SHELL_TIMEOUT_MS,
                "Shell timeout capped"
            );
        }
        let shell_timeout_ms = requested_timeout.min(MAX_SHELL_TIMEOUT_MS);

        let mut permission_rules = project.permissions.rules;
        permission_rules.extend(global.permissions.rules);

        let mut hook_namespaces = Vec::new();
        for (base, settings) in [(config_dir, &global.hooks), (project_dir, &project.hooks)] {
            hook_namespaces.extend(settings.namespaces.iter().map(|ns| NamespaceSettings {
                name: ns.name.clone(),
                root: base.join(&ns.root),
            }));
        }

        let mut hook_flags = global.hooks.flags;
        hook_flags.extend(project.hooks.flags);

        Ok(BulwarkConfig {
            config_dir: config_dir.to_path_buf(),
            project_dir: project_dir.to_path_buf(),
            permission_mode,
            permission_rules,
            shell_timeout_ms,
            hook_namespaces,
            hook_flags,
        })
    }

    /// Read every namespace's `hooks.json` into a registry. Missing,
    /// unreadable or malformed documents are skipped with a warning.
    pub fn load_hook_registry(&self) -> HookRegistry {
        let mut registry = HookRegistry::new();
        for ns in &self.hook_namespaces {
            let path = ns.root.join(HOOKS_FILE);
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(namespace = %ns.name, path = %path.display(), error = %e, "Skipping unreadable hooks file");
                    continue;
                }
            };
            match serde_json::from_str::<serde_json::Value>(&content) {
                Ok(document) => {
                    registry.register_document(&ns.name, &ns.root, &document);
                }
                Err(e) => {
                    tracing::warn!(namespace = %ns.name, path = %path.display(), error = %e, "Skipping malformed hooks file");
                }
            }
        }
        registry
    }

    /// Hook executor carrying the configured feature flags.
    pub fn hook_executor(&self) -> HookExecutor {
        HookExecutor::new().with_flags(self.hook_flags.clone())
    }
}

/// Get the Bulwark config directory path (~/.bulwark/).
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("BULWARK_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bulwark")
}

/// `<project>/.bulwark/config.toml`
pub fn project_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".bulwark").join("config.toml")
}

/// Load and parse a TOML settings file, returning defaults on any error.
fn load_settings_file(path: &Path) -> SettingsFile {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulwark_hooks::HookEventType;
    use bulwark_permissions::PermissionLevel;

    struct Dirs {
        _tmp: tempfile::TempDir,
        global: PathBuf,
        project: PathBuf,
    }

    fn dirs() -> Dirs {
        let tmp = tempfile::tempdir().unwrap();
        let global = tmp.path().join("global");
        let project = tmp.path().join("project");
        std::fs::create_dir_all(&global).unwrap();
        std::fs::create_dir_all(project.join(".bulwark")).unwrap();
        Dirs {
            _tmp: tmp,
            global,
            project,
        }
    }

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    fn resolve(d: &Dirs, env: EnvOverrides, cli: CliOverrides) -> Result<BulwarkConfig, ConfigError> {
        BulwarkConfig::resolve(&d.global, &d.project, env, cli)
    }

    #[test]
    fn test_default_settings() {
        let d = dirs();
        let config = resolve(&d, EnvOverrides::default(), CliOverrides::default()).unwrap();
        assert_eq!(config.permission_mode, PermissionMode::Default);
        assert!(config.permission_rules.is_empty());
        assert_eq!(config.shell_timeout_ms, DEFAULT_SHELL_TIMEOUT_MS);
        assert!(config.hook_namespaces.is_empty());
    }

    #[test]
    fn test_settings_toml_parse() {
        let toml_str = r#"
[permissions]
mode = "acceptEdits"

[[permissions.rules]]
tool = "Read"
level = "allow"

[[permissions.rules]]
tool = "Bash"
args = "rm *"
level = "deny"

[shell]
timeout_ms = 5000

[hooks]
namespaces = [{ name = "fmt", root = "plugins/fmt" }]
flags = { strict = true }
"#;
        let settings: SettingsFile = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.permissions.mode, Some(PermissionMode::AcceptEdits));
        assert_eq!(settings.permissions.rules.len(), 2);
        assert_eq!(settings.permissions.rules[1].args.as_deref(), Some("rm *"));
        assert_eq!(settings.permissions.rules[1].level, PermissionLevel::Deny);
        assert_eq!(settings.shell.timeout_ms, Some(5000));
        assert_eq!(settings.hooks.namespaces[0].name, "fmt");
        assert_eq!(settings.hooks.flags.get("strict"), Some(&true));
    }

    #[test]
    fn test_project_overrides_global() {
        let d = dirs();
        write(
            &d.global.join("config.toml"),
            r#"
[permissions]
mode = "plan"
[[permissions.rules]]
tool = "*"
level = "ask"
[shell]
timeout_ms = 1000
[hooks.flags]
strict = false
beta = true
"#,
        );
        write(
            &project_config_path(&d.project),
            r#"
[permissions]
mode = "acceptEdits"
[[permissions.rules]]
tool = "Bash"
level = "deny"
[hooks.flags]
strict = true
"#,
        );

        let config = resolve(&d, EnvOverrides::default(), CliOverrides::default()).unwrap();
        assert_eq!(config.permission_mode, PermissionMode::AcceptEdits);
        let tools: Vec<&str> = config.permission_rules.iter().map(|r| r.tool.as_str()).collect();
        assert_eq!(tools, ["Bash", "*"]);
        assert_eq!(config.shell_timeout_ms, 1000);
        assert_eq!(config.hook_flags.get("strict"), Some(&true));
        assert_eq!(config.hook_flags.get("beta"), Some(&true));
    }

    #[test]
    fn test_env_and_cli_precedence() {
        let d = dirs();
        write(&project_config_path(&d.project), "[permissions]\nmode = \"plan\"\n");

        let env = EnvOverrides {
            permission_mode: Some("acceptEdits".into()),
            shell_timeout_ms: Some("2500".into()),
        };
        let config = resolve(&d, env.clone(), CliOverrides::default()).unwrap();
        assert_eq!(config.permission_mode, PermissionMode::AcceptEdits);
        assert_eq!(config.shell_timeout_ms, 2500);

        let cli = CliOverrides {
            permission_mode: Some(PermissionMode::BypassPermissions),
            project_dir: None,
        };
        let config = resolve(&d, env, cli).unwrap();
        assert_eq!(config.permission_mode, PermissionMode::BypassPermissions);
    }

    #[test]
    fn test_invalid_env_is_an_error() {
        let d = dirs();
        let env = EnvOverrides {
            permission_mode: Some("yolo".into()),
            shell_timeout_ms: None,
        };
        assert!(matches!(
            resolve(&d, env, CliOverrides::default()),
            Err(ConfigError::InvalidValue { key, .. }) if key == "BULWARK_PERMISSION_MODE"
        ));

        let env = EnvOverrides {
            permission_mode: None,
            shell_timeout_ms: Some("soon".into()),
        };
        assert!(resolve(&d, env, CliOverrides::default()).is_err());
    }

    #[test]
    fn test_timeout_is_capped() {
        let d = dirs();
        write(&d.global.join("config.toml"), "[shell]\ntimeout_ms = 9999999\n");
        let config = resolve(&d, EnvOverrides::default(), CliOverrides::default()).unwrap();
        assert_eq!(config.shell_timeout_ms, MAX_SHELL_TIMEOUT_MS);
    }

    #[test]
    fn test_malformed_file_degrades_to_defaults() {
        let d = dirs();
        write(&d.global.join("config.toml"), "this is [not toml");
        let config = resolve(&d, EnvOverrides::default(), CliOverrides::default()).unwrap();
        assert_eq!(config.permission_mode, PermissionMode::Default);
    }

    #[test]
    fn test_hook_registry_loading() {
        let d = dirs();
        write(
            &project_config_path(&d.project),
            r#"
[hooks]
namespaces = [
    { name = "fmt", root = "plugins/fmt" },
    { name = "broken", root = "plugins/broken" },
    { name = "missing", root = "plugins/missing" },
]
"#,
        );
        write(
            &d.project.join("plugins/fmt").join(HOOKS_FILE),
            r#"{ "PreToolUse": [ { "matcher": "Bash", "hooks": [ { "type": "command", "command": "${NAMESPACE_ROOT}/check.sh" } ] } ] }"#,
        );
        write(&d.project.join("plugins/broken").join(HOOKS_FILE), "{ nope");

        let config = resolve(&d, EnvOverrides::default(), CliOverrides::default()).unwrap();
        assert_eq!(config.hook_namespaces.len(), 3);
        assert_eq!(config.hook_namespaces[0].root, d.project.join("plugins/fmt"));

        let registry = config.load_hook_registry();
        assert_eq!(registry.len(), 1);
        let hook = &registry.hooks_for(HookEventType::PreToolUse)[0];
        assert_eq!(hook.namespace, "fmt");
        assert_eq!(hook.definition.id, "fmt:PreToolUse:0:0");
        assert_eq!(hook.root, d.project.join("plugins/fmt"));
    }

    #[test]
    fn test_absolute_namespace_root_is_kept() {
        let d = dirs();
        write(
            &d.global.join("config.toml"),
            "[hooks]\nnamespaces = [{ name = \"sys\", root = \"/opt/bulwark/sys\" }]\n",
        );
        let config = resolve(&d, EnvOverrides::default(), CliOverrides::default()).unwrap();
        assert_eq!(config.hook_namespaces[0].root, PathBuf::from("/opt/bulwark/sys"));
    }
}
