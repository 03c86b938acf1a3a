use serde::Deserialize;

// `clone_url` is the identity of an entry within a catalog; `name` is
// display-only and not necessarily unique.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(rename = "ssh_url_to_repo")]
    pub clone_url: String,
    #[serde(skip)]
    pub selected: bool,
}

/// Terminal result of one clone attempt, never retried.
#[derive(Debug, Clone, PartialEq)]
pub struct CloneOutcome {
    pub project: Project,
    pub succeeded: bool,
    pub error: Option<String>,
}

/// Called once per terminal outcome with `fraction = completed / total`.
pub trait ProgressSink {
    fn on_progress(&mut self, fraction: f64, outcome: &CloneOutcome);
}

/// Sink for tests: remembers every event it was handed.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub(crate) events: Vec<(f64, CloneOutcome)>,
}

#[cfg(test)]
impl ProgressSink for RecordingSink {
    fn on_progress(&mut self, fraction: f64, outcome: &CloneOutcome) {
        self.events.push((fraction, outcome.clone()));
    }
}
