//! Final argument vector for the child runtime.

use serde::Serialize;

use super::flags::FlagBundle;

/// How the launch target is handed to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Main class or single-file source program, passed as-is.
    MainClassOrScript,
    /// `-m <module>/<class>`.
    Module,
    /// `-jar <archive>`.
    Archive,
}

impl TargetKind {
    fn launcher_flag(self) -> Option<&'static str> {
        match self {
            TargetKind::MainClassOrScript => None,
            TargetKind::Module => Some("-m"),
            TargetKind::Archive => Some("-jar"),
        }
    }
}

/// What to run and with which application arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchTarget {
    pub kind: TargetKind,
    pub target: String,
    pub args: Vec<String>,
}

impl LaunchTarget {
    /// Resolve the target from the command line.
    ///
    /// With `-m`/`-jar` a positional application name becomes the first
    /// application argument. `params` replaces positional parameters and is
    /// split on whitespace.
    pub fn resolve(
        module: Option<String>,
        jar: Option<String>,
        application: Option<String>,
        positional_params: Vec<String>,
        params: Option<&str>,
    ) -> Option<LaunchTarget> {
        let mut args = match params {
            Some(params) => params.split_whitespace().map(str::to_string).collect(),
            None => positional_params,
        };
        let (kind, target) = match (module, jar) {
            (Some(module), _) => (TargetKind::Module, module),
            (None, Some(jar)) => (TargetKind::Archive, jar),
            (None, None) => (TargetKind::MainClassOrScript, application.clone()?),
        };
        if kind != TargetKind::MainClassOrScript
            && let Some(application) = application
        {
            args.insert(0, application);
        }
        Some(LaunchTarget { kind, target, args })
    }
}

/// Flags, then `-m`/`-jar` when needed, then the target and its arguments.
pub fn build_argv(bundle: &FlagBundle, target: &LaunchTarget, separator: char) -> Vec<String> {
    let mut argv = bundle.to_args(separator);
    if let Some(flag) = target.kind.launcher_flag() {
        argv.push(flag.to_string());
    }
    argv.push(target.target.clone());
    argv.extend(target.args.iter().cloned());
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn plain_application_keeps_positional_params() {
        let target = LaunchTarget::resolve(
            None,
            None,
            Some("demo.Main".to_string()),
            strings(&["1", "2"]),
            None,
        )
        .expect("target");
        assert_eq!(target.kind, TargetKind::MainClassOrScript);
        assert_eq!(target.target, "demo.Main");
        assert_eq!(target.args, strings(&["1", "2"]));
    }

    #[test]
    fn module_target_shifts_positional_application_into_args() {
        let target = LaunchTarget::resolve(
            Some("tornado.examples/demo.Main".to_string()),
            None,
            Some("extra".to_string()),
            Vec::new(),
            Some(" --size 512 "),
        )
        .expect("target");
        assert_eq!(target.kind, TargetKind::Module);
        assert_eq!(target.args, strings(&["extra", "--size", "512"]));
    }

    #[test]
    fn nothing_to_run_without_target() {
        assert!(LaunchTarget::resolve(None, None, None, Vec::new(), None).is_none());
    }

    #[test]
    fn argv_places_launcher_flag_before_target() {
        let target = LaunchTarget {
            kind: TargetKind::Archive,
            target: "app.jar".to_string(),
            args: strings(&["a"]),
        };
        let argv = build_argv(&FlagBundle::default(), &target, ':');
        assert_eq!(argv, strings(&["-jar", "app.jar", "a"]));
    }
}
