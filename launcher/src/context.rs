//! Launch inputs resolved once at the process boundary.
//!
//! Nothing below `main` reads the environment: `LaunchEnv` captures it and
//! `LaunchContext` is threaded through every stage.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::backend::BackendSet;
use crate::core::options::UserOptions;
use crate::core::platform::Platform;
use crate::error::LaunchError;
use crate::io::backend_record::{self, SKIP_BACKENDS_ENV};
use crate::io::config::{LauncherConfig, config_path, load_config};
use crate::io::probe::{ProbeLimits, java_executable};

pub const TORNADOVM_HOME_ENV: &str = "TORNADOVM_HOME";
pub const TORNADO_SDK_ENV: &str = "TORNADO_SDK";
pub const JAVA_HOME_ENV: &str = "JAVA_HOME";
pub const CLASSPATH_ENV: &str = "CLASSPATH";

/// Environment inputs, captured once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchEnv {
    pub tornadovm_home: Option<String>,
    pub tornado_sdk: Option<String>,
    pub java_home: Option<String>,
    pub class_path: Option<String>,
    pub skip_backends: Option<String>,
}

impl LaunchEnv {
    pub fn from_process() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            tornadovm_home: get(TORNADOVM_HOME_ENV),
            tornado_sdk: get(TORNADO_SDK_ENV),
            java_home: get(JAVA_HOME_ENV),
            class_path: get(CLASSPATH_ENV),
            skip_backends: get(SKIP_BACKENDS_ENV),
        }
    }

    /// `TORNADOVM_HOME` wins over `TORNADO_SDK`.
    pub fn sdk_root(&self) -> Option<PathBuf> {
        self.tornadovm_home
            .as_deref()
            .or(self.tornado_sdk.as_deref())
            .map(|value| PathBuf::from(strip_quotes(value)))
    }

    pub fn java_home(&self) -> Option<PathBuf> {
        self.java_home
            .as_deref()
            .map(|value| PathBuf::from(strip_quotes(value)))
    }
}

fn strip_quotes(value: &str) -> &str {
    value.trim().trim_matches('"').trim_matches('\'')
}

/// Everything a launch stage may consult.
#[derive(Debug, Clone)]
pub struct LaunchContext {
    pub sdk_root: PathBuf,
    pub java_home: Option<PathBuf>,
    pub platform: Platform,
    pub env: LaunchEnv,
    pub config: LauncherConfig,
}

impl LaunchContext {
    /// Resolve the SDK root and load its optional configuration.
    pub fn resolve(env: LaunchEnv, platform: Platform) -> Result<Self> {
        let sdk_root = env.sdk_root().ok_or_else(|| {
            LaunchError::config(
                format!("neither {TORNADOVM_HOME_ENV} nor {TORNADO_SDK_ENV} is set"),
                format!("export {TORNADO_SDK_ENV}=<path to the TornadoVM SDK>"),
            )
        })?;
        if !sdk_root.is_dir() {
            return Err(LaunchError::not_found(
                format!("SDK directory {} does not exist", sdk_root.display()),
                format!("point {TORNADO_SDK_ENV} at an installed SDK"),
            )
            .into());
        }
        let config = load_config(&config_path(&sdk_root)).context("load launcher config")?;
        debug!(sdk = %sdk_root.display(), %platform, "launch context resolved");
        Ok(Self {
            java_home: env.java_home(),
            sdk_root,
            platform,
            env,
            config,
        })
    }

    pub fn java_executable(&self) -> Result<PathBuf, LaunchError> {
        let home = self.java_home.as_deref().ok_or_else(|| {
            LaunchError::config(
                format!("{JAVA_HOME_ENV} is not set"),
                format!("export {JAVA_HOME_ENV}=<path to a JDK {} installation>", self.config.required_java_major),
            )
        })?;
        Ok(java_executable(home, self.platform))
    }

    pub fn probe_limits(&self) -> ProbeLimits {
        ProbeLimits {
            timeout: self.config.probe_timeout(),
            output_limit_bytes: self.config.probe_output_limit_bytes,
        }
    }

    /// Installed backends minus the environment skip list.
    pub fn backends(&self) -> Result<BackendSet> {
        let installed = backend_record::load(&backend_record::record_path(&self.sdk_root))?;
        match &self.env.skip_backends {
            Some(skip) => Ok(backend_record::apply_skip_list(&installed, skip)?),
            None => Ok(installed),
        }
    }

    /// Config defaults overlaid with command-line options; `CLASSPATH` is
    /// appended to an explicit class path.
    pub fn effective_options(&self, cli: &UserOptions) -> UserOptions {
        let mut options = self.config.options.clone().overlay(cli);
        if let Some(extra) = &self.env.class_path
            && let Some(class_path) = options.class_path.take()
        {
            options.class_path = Some(format!(
                "{class_path}{}{extra}",
                self.platform.path_list_separator()
            ));
        }
        options
    }

    pub fn release_file(&self) -> PathBuf {
        crate::io::sdk_dir::release_file(&self.sdk_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> LaunchEnv {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LaunchEnv::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn tornadovm_home_is_preferred() {
        let env = env(&[(TORNADO_SDK_ENV, "/old"), (TORNADOVM_HOME_ENV, "/new")]);
        assert_eq!(env.sdk_root(), Some(PathBuf::from("/new")));
    }

    #[test]
    fn quotes_are_stripped_and_empty_values_ignored() {
        let env = env(&[(JAVA_HOME_ENV, "\"/opt/jdk 21\""), (TORNADOVM_HOME_ENV, "  ")]);
        assert_eq!(env.java_home(), Some(PathBuf::from("/opt/jdk 21")));
        assert_eq!(env.sdk_root(), None);
    }

    #[test]
    fn missing_sdk_env_is_a_config_error() {
        let err = LaunchContext::resolve(LaunchEnv::default(), Platform::Linux).expect_err("unset");
        assert!(matches!(
            err.downcast_ref::<LaunchError>(),
            Some(LaunchError::Config { .. })
        ));
    }

    #[test]
    fn classpath_env_extends_explicit_class_path_only() {
        let temp = tempfile::tempdir().expect("tempdir");
        let sdk = temp.path().to_string_lossy().into_owned();
        let ctx = LaunchContext::resolve(
            env(&[(TORNADO_SDK_ENV, &sdk), (CLASSPATH_ENV, "/libs/x.jar")]),
            Platform::Linux,
        )
        .expect("context");

        let none = ctx.effective_options(&UserOptions::default());
        assert_eq!(none.class_path, None);

        let cli = UserOptions {
            class_path: Some("app.jar".to_string()),
            ..UserOptions::default()
        };
        assert_eq!(
            ctx.effective_options(&cli).class_path.as_deref(),
            Some("app.jar:/libs/x.jar")
        );
    }

    #[test]
    fn java_executable_requires_java_home() {
        let temp = tempfile::tempdir().expect("tempdir");
        let sdk = temp.path().to_string_lossy().into_owned();
        let ctx = LaunchContext::resolve(env(&[(TORNADO_SDK_ENV, &sdk)]), Platform::Linux)
            .expect("context");
        assert!(ctx.java_executable().is_err());
    }
}
