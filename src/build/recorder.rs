//! Build progress events.

use crate::debug;
use crate::dom::KeyPath;

/// One step of a build, in the order it happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent<'a> {
    Start,
    PassStart { pass: usize },
    /// A node was placed in the pass's tree.
    ElementBuilt { key_path: &'a KeyPath, name: &'a str },
    PassDone { pass: usize, changed: bool },
    Done { passes: usize, messages: usize },
    Error { error: String },
}

/// Receives [`BuildEvent`]s as a build runs.
pub trait BuildRecorder {
    fn record(&mut self, event: BuildEvent<'_>);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecorder;

impl BuildRecorder for NullRecorder {
    fn record(&mut self, _event: BuildEvent<'_>) {}
}

/// Writes events through `debug!`, so they show up with `--verbose`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRecorder;

impl BuildRecorder for LogRecorder {
    fn record(&mut self, event: BuildEvent<'_>) {
        match event {
            BuildEvent::Start => debug!("build"; "start"),
            BuildEvent::PassStart { pass } => debug!("build"; "pass {} start", pass),
            BuildEvent::ElementBuilt { key_path, name } => {
                debug!("build"; "built {} at {}", name, key_path)
            }
            BuildEvent::PassDone { pass, changed } => {
                debug!("build"; "pass {} done (state {})", pass, if changed { "changed" } else { "stable" })
            }
            BuildEvent::Done { passes, messages } => {
                debug!("build"; "done after {} passes, {} messages", passes, messages)
            }
            BuildEvent::Error { error } => debug!("build"; "failed: {}", error),
        }
    }
}

impl<F: FnMut(BuildEvent<'_>)> BuildRecorder for F {
    fn record(&mut self, event: BuildEvent<'_>) {
        self(event)
    }
}
