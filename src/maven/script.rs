/// Path the build script is written to inside the compile container
pub const SCRIPT_PATH: &str = "/tmp/script.sh";

/// Shell script the compile container runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildScript {
    pub verbose: bool,
    /// Folder to change into before building; empty or `.` stays in the
    /// working directory
    pub folder: String,
}

impl BuildScript {
    pub fn new(verbose: bool, folder: impl Into<String>) -> Self {
        Self {
            verbose,
            folder: folder.into(),
        }
    }

    pub fn render(&self) -> String {
        let mut script = String::from("#!/bin/sh\nset -xe\n");
        let folder = self.folder.trim();
        if !folder.is_empty() && folder != "." {
            script.push_str(&format!("cd {}\n", folder));
        }
        script.push_str("mvn --batch-mode package");
        if self.verbose {
            script.push_str(" -X");
        }
        script.push('\n');
        script
    }

    /// Entrypoint command running the script
    pub fn command() -> Vec<String> {
        vec!["sh".to_string(), SCRIPT_PATH.to_string()]
    }
}
