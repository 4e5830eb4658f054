//! `diff` command.

use anyhow::{Result, bail};
use std::path::Path;

use super::build::{build_file, load_state};
use crate::{build::LogRecorder, config::EngineConfig, diff::dom_diff, dom::KeyPath, log};

/// Key-paths that changed between two built trees.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DiffReport {
    pub added: Vec<KeyPath>,
    pub deleted: Vec<KeyPath>,
    pub updated: Vec<KeyPath>,
    pub common: usize,
}

impl DiffReport {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }
}

/// Build both trees from the same starting state and compare them.
pub fn diff_trees(
    old: &Path,
    new: &Path,
    state: Option<&Path>,
    config: &EngineConfig,
) -> Result<DiffReport> {
    let store = load_state(state)?;
    let old_output = build_file(old, &mut store.clone(), config, &mut LogRecorder)?;
    let new_output = build_file(new, &mut store.clone(), config, &mut LogRecorder)?;

    let diff = dom_diff(old_output.tree.as_ref(), new_output.tree.as_ref());
    let owned = |paths: Vec<&KeyPath>| paths.into_iter().cloned().collect();
    Ok(DiffReport {
        added: owned(diff.added_paths()),
        deleted: owned(diff.deleted_paths()),
        updated: owned(diff.updated_paths()),
        common: diff.common_new.len(),
    })
}

/// Run the `diff` command.
pub fn run_diff(
    old: &Path,
    new: &Path,
    check: bool,
    state: Option<&Path>,
    config: &EngineConfig,
) -> Result<()> {
    let report = diff_trees(old, new, state, config)?;

    for path in &report.added {
        println!("+ {path}");
    }
    for path in &report.deleted {
        println!("- {path}");
    }
    for path in &report.updated {
        println!("~ {path}");
    }
    log!(
        "diff";
        "{} added, {} deleted, {} updated, {} unchanged",
        report.added.len(),
        report.deleted.len(),
        report.updated.len(),
        report.common - report.updated.len()
    );

    if check && !report.is_unchanged() {
        bail!("trees differ");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn trees(old: &str, new: &str) -> (tempfile::TempDir, DiffReport) {
        let dir = tempfile::tempdir().unwrap();
        let old_path = dir.path().join("old.xml");
        let new_path = dir.path().join("new.xml");
        fs::write(&old_path, old).unwrap();
        fs::write(&new_path, new).unwrap();
        let report = diff_trees(&old_path, &new_path, None, &EngineConfig::default()).unwrap();
        (dir, report)
    }

    #[test]
    fn test_identical_trees_unchanged() {
        let tree = r#"<Stackdom><Group><Web/></Group></Stackdom>"#;
        let (_dir, report) = trees(tree, tree);
        assert!(report.is_unchanged());
        assert_eq!(report.common, 2);
    }

    #[test]
    fn test_added_and_updated() {
        let (_dir, report) = trees(
            r#"<Stackdom><Group><Web port="80"/></Group></Stackdom>"#,
            r#"<Stackdom><Group><Web port="8080"/><Db/></Group></Stackdom>"#,
        );
        assert_eq!(report.added, vec![KeyPath::from_iter(["Group", "Db"])]);
        assert_eq!(report.updated, vec![KeyPath::from_iter(["Group", "Web"])]);
        assert!(report.deleted.is_empty());
    }

    #[test]
    fn test_deleted_subtree() {
        let (_dir, report) = trees(
            r#"<Stackdom><Group><Web><Cert/></Web></Group></Stackdom>"#,
            r#"<Stackdom><Group/></Stackdom>"#,
        );
        assert_eq!(report.deleted.len(), 2);
        assert!(report.added.is_empty());
    }

    #[test]
    fn test_check_fails_on_difference() {
        let dir = tempfile::tempdir().unwrap();
        let old_path = dir.path().join("old.xml");
        let new_path = dir.path().join("new.xml");
        fs::write(&old_path, "<Stackdom><A/></Stackdom>").unwrap();
        fs::write(&new_path, "<Stackdom><B/></Stackdom>").unwrap();

        let config = EngineConfig::default();
        assert!(run_diff(&old_path, &new_path, true, None, &config).is_err());
        assert!(run_diff(&old_path, &new_path, false, None, &config).is_ok());
    }
}
