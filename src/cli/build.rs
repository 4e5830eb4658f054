//! `build` command.
//!
//! Reads tree markup, builds it against the stored state, prints the
//! serialized result on stdout and writes the updated state back.

use anyhow::{Context, Result, bail};
use std::{fs, path::Path};

use crate::{
    build::{BuildEvent, BuildOutput, BuildRecorder, LogRecorder, build_with_recorder},
    config::EngineConfig,
    dom::MessageType,
    handle::HandleRegistry,
    log,
    logger::BuildStatus,
    serialize::{parse_dom, serialize_dom},
    state::StateStore,
};

/// Read and parse a serialized tree.
pub(super) fn load_tree(path: &Path) -> Result<Option<crate::dom::Element>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let parsed =
        parse_dom(&content).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(parsed.root)
}

/// Read a state file; a missing file is an empty store.
pub(super) fn load_state(path: Option<&Path>) -> Result<StateStore> {
    let Some(path) = path else {
        return Ok(StateStore::new());
    };
    if !path.exists() {
        return Ok(StateStore::new());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    StateStore::from_json(&content).with_context(|| format!("invalid state in {}", path.display()))
}

/// Shows the running pass on the status line and logs every event.
struct StatusRecorder<'a> {
    status: &'a mut BuildStatus,
}

impl BuildRecorder for StatusRecorder<'_> {
    fn record(&mut self, event: BuildEvent<'_>) {
        if let BuildEvent::PassStart { pass } = event {
            self.status.progress(&format!("pass {pass}"));
        }
        LogRecorder.record(event);
    }
}

/// Build the tree at `input` against `store`.
pub(super) fn build_file(
    input: &Path,
    store: &mut StateStore,
    config: &EngineConfig,
    recorder: &mut dyn BuildRecorder,
) -> Result<BuildOutput> {
    let root = load_tree(input)?;
    let output = build_with_recorder(
        root.as_ref(),
        None,
        store,
        &mut HandleRegistry::new(),
        &config.build_options(),
        recorder,
    )
    .with_context(|| format!("failed to build {}", input.display()))?;
    Ok(output)
}

/// Build, serialize and persist state. Returns the build and its markup.
pub fn build_tree(
    input: &Path,
    state: Option<&Path>,
    config: &EngineConfig,
) -> Result<(BuildOutput, String)> {
    let mut status = BuildStatus::new();
    let mut store = load_state(state)?;

    let built = build_file(
        input,
        &mut store,
        config,
        &mut StatusRecorder {
            status: &mut status,
        },
    );
    status.clear();
    let output = built?;

    let markup = serialize_dom(output.tree.as_ref(), &config.serialize_options())
        .context("failed to serialize built tree")?;

    if let Some(path) = state {
        let json = store.to_json().context("failed to encode state")?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    }

    report_messages(&output);
    let summary = output.summary();
    let nodes = output.tree.as_ref().map_or(0, |tree| tree.count());
    if summary.passed() {
        status.success(&format!(
            "built {} node{} in {} pass{} ({})",
            nodes,
            if nodes == 1 { "" } else { "s" },
            output.passes,
            if output.passes == 1 { "" } else { "es" },
            summary
        ));
    } else {
        status.error("build reported errors", &summary.to_string());
    }
    Ok((output, markup))
}

/// Run the `build` command.
pub fn run_build(input: &Path, state: Option<&Path>, config: &EngineConfig) -> Result<()> {
    let (output, markup) = build_tree(input, state, config)?;
    println!("{markup}");

    if output.has_errors() {
        bail!("build reported {}", output.summary());
    }
    Ok(())
}

fn report_messages(output: &BuildOutput) {
    for message in &output.messages {
        let module = match message.kind {
            MessageType::Error => "error",
            MessageType::Warning => "warning",
            MessageType::Info => "build",
        };
        if message.from.is_empty() {
            log!(module; "{}", message.content);
        } else {
            log!(module; "{}: {}", message.from, message.content);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    const TREE: &str = r#"<Stackdom><Group><Web port="80"/><Web/></Group></Stackdom>"#;

    #[test]
    fn test_build_tree_keys_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_file(dir.path(), "tree.xml", TREE);

        let (output, markup) = build_tree(&input, None, &EngineConfig::default()).unwrap();
        assert_eq!(output.passes, 1);
        let parsed = parse_dom(&markup).unwrap();
        let root = parsed.root.unwrap();

        assert_eq!(root.key(), Some("Group"));
        let keys: Vec<_> = root.children().iter().map(|c| c.key()).collect();
        assert_eq!(keys, vec![Some("Web"), Some("Web1")]);
        assert_eq!(root.children()[0].props().get_i64("port"), Some(80));
    }

    #[test]
    fn test_build_tree_writes_state() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_file(dir.path(), "tree.xml", TREE);
        let state = write_file(dir.path(), "state.json", r#"{"[\"Group\"]": {"ready": true}}"#);

        build_tree(&input, Some(&state), &EngineConfig::default()).unwrap();

        let store = StateStore::from_json(&fs::read_to_string(&state).unwrap()).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_missing_state_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = load_state(Some(&dir.path().join("state.json"))).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_build_rejects_bad_markup() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_file(dir.path(), "tree.xml", "<Other/>");
        assert!(build_tree(&input, None, &EngineConfig::default()).is_err());
    }

    #[test]
    fn test_duplicate_keys_fail() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_file(
            dir.path(),
            "tree.xml",
            r#"<Stackdom><Group><Web key="a"/><Web key="a"/></Group></Stackdom>"#,
        );
        let err = build_tree(&input, None, &EngineConfig::default()).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate key"));
    }
}
