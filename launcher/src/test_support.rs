//! Test-only helpers for building a fake SDK and a fake `java`.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::backend::Backend;
use crate::core::exports::ExportGroup;
use crate::io::backend_record::record_path;
use crate::io::exports::export_list_path;
use crate::io::sdk_dir::release_file;

pub const JDK21_BANNER: &str = "openjdk version \"21.0.2\" 2024-01-16\nOpenJDK Runtime Environment (build 21.0.2+13-58)\nOpenJDK 64-Bit Server VM (build 21.0.2+13-58, mixed mode, sharing)";
pub const GRAAL21_BANNER: &str = "java version \"21.0.1\" 2023-10-17\nJava(TM) SE Runtime Environment Oracle GraalVM 21.0.1+12.1 (build 21.0.1+12-jvmci-23.1-b19)";
pub const JDK17_BANNER: &str = "openjdk version \"17.0.9\" 2023-10-17";

/// A throwaway SDK tree with a backend record, export lists and a JDK.
pub struct FakeSdk {
    dir: TempDir,
}

impl FakeSdk {
    /// SDK with the given backends and one export line per list.
    pub fn new(backends: &[Backend]) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let sdk = Self { dir };
        let root = sdk.root().to_path_buf();

        for sub in ["lib", "share/java/tornado", "share/java/graalJars"] {
            fs::create_dir_all(root.join(sub)).expect("sdk dirs");
        }
        let tokens: Vec<String> = backends.iter().map(|b| format!("{b}-backend")).collect();
        sdk.write(
            &record_path(&root),
            &format!("# installed\ntornado.backends={}\n", tokens.join(",")),
        );
        sdk.write_exports(ExportGroup::Common, "--add-exports jdk.internal.vm.ci/jdk.vm.ci.meta=tornado.runtime\n");
        for backend in Backend::ALL {
            sdk.write_exports(
                ExportGroup::Backend(backend),
                &format!("# {backend}\n--add-exports java.base/jdk.internal.{backend}=tornado.drivers.{backend}\n"),
            );
        }
        sdk.write(&release_file(&root), "TornadoVM 1.1.0\n");
        sdk
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn java_home(&self) -> PathBuf {
        self.root().join("jdk")
    }

    /// File the fake `java` records its arguments into, one per line.
    pub fn args_file(&self) -> PathBuf {
        self.root().join("java-args.txt")
    }

    pub fn write(&self, path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, contents).expect("write sdk file");
    }

    pub fn write_exports(&self, group: ExportGroup, contents: &str) {
        self.write(&export_list_path(self.root(), group), contents);
    }

    /// Install `<java_home>/bin/java`: answers `-version` with `banner`,
    /// otherwise records its arguments and exits with `exit_code`.
    #[cfg(unix)]
    pub fn install_java(&self, banner: &str, exit_code: i32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let java = self.java_home().join("bin").join("java");
        let script = format!(
            "#!/bin/sh\nif [ \"$1\" = \"-version\" ]; then\ncat >&2 <<'BANNER'\n{banner}\nBANNER\nexit 0\nfi\nfor arg in \"$@\"; do printf '%s\\n' \"$arg\"; done > '{}'\nexit {exit_code}\n",
            self.args_file().display()
        );
        self.write(&java, &script);
        fs::set_permissions(&java, fs::Permissions::from_mode(0o755)).expect("chmod java");
        java
    }

    pub fn recorded_args(&self) -> Vec<String> {
        fs::read_to_string(self.args_file())
            .expect("java was not launched")
            .lines()
            .map(str::to_string)
            .collect()
    }
}
