//! Per-attempt scratch directories.

use std::fs;
use std::io;
use std::path::Path;

use tempfile::{Builder, TempDir};
use uuid::Uuid;

use crate::attempt::Stage;

/// Ephemeral, exclusively owned directory for a single attempt.
///
/// The directory and everything in it is removed when the value is dropped,
/// on every exit path of the attempt.
pub struct AttemptWorkspace {
    dir: TempDir,
    id: Uuid,
}

impl AttemptWorkspace {
    pub fn create() -> io::Result<Self> {
        let id = Uuid::new_v4();
        let dir = Builder::new()
            .prefix(&format!("passk-{}-", id.simple()))
            .tempdir()?;
        Ok(Self { dir, id })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Unique container name for one stage of this attempt.
    pub fn container_name(&self, stage: Stage) -> String {
        format!("passk-{}-{}", self.id.simple(), stage)
    }

    pub fn write_source(&self, file_name: &str, source: &str) -> io::Result<()> {
        fs::write(self.dir.path().join(file_name), source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_is_removed_on_drop() {
        let workspace = AttemptWorkspace::create().unwrap();
        let root = workspace.path().to_path_buf();
        workspace.write_source("main.cpp", "int main() {}").unwrap();
        assert_eq!(
            fs::read_to_string(root.join("main.cpp")).unwrap(),
            "int main() {}"
        );

        drop(workspace);
        assert!(!root.exists());
    }

    #[test]
    fn concurrent_workspaces_never_share_a_directory() {
        let a = AttemptWorkspace::create().unwrap();
        let b = AttemptWorkspace::create().unwrap();
        assert_ne!(a.path(), b.path());
        assert_ne!(a.id(), b.id());
        assert_ne!(a.container_name(Stage::Run), b.container_name(Stage::Run));
    }

    #[test]
    fn container_names_are_stage_tagged() {
        let ws = AttemptWorkspace::create().unwrap();
        assert!(ws.container_name(Stage::Compile).ends_with("-compile"));
        assert!(ws.container_name(Stage::Run).ends_with("-run"));
    }
}
