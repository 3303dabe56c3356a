//! Iteration log persistence.
//!
//! Logs are saved as pretty-printed JSON so diffs between runs stay
//! reviewable by hand.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::SnapshotError;
use crate::iterate::IterationLog;

/// Writes the log to `path` as pretty JSON, replacing any existing file.
pub fn save_log(log: &IterationLog, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    let rendered = serde_json::to_string_pretty(log)?;
    fs::write(path, rendered).map_err(|source| SnapshotError::Io {
        path: path.display().to_string(),
        source,
    })?;
    debug!(path = %path.display(), iterations = log.len(), "iteration log saved");
    Ok(())
}

/// Loads a log previously written by [`save_log`].
pub fn load_log(path: impl AsRef<Path>) -> Result<IterationLog, SnapshotError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{StepSpec, StepType, TriggerType, WorkflowIR};
    use crate::iterate::IterationDraft;
    use serde_json::json;
    use uuid::Uuid;

    fn sample_log() -> IterationLog {
        let mut trigger =
            StepSpec::new("t", "Manual", StepType::Trigger, "n8n-nodes-base.manualTrigger");
        trigger.trigger_type = Some(TriggerType::Manual);
        let ir = WorkflowIR {
            id: Uuid::nil(),
            name: "snapshot test".to_string(),
            description: String::new(),
            trigger,
            steps: vec![],
            edges: vec![],
            error_strategy: Default::default(),
            test_invariants: vec![],
            metadata: Default::default(),
            tags: vec![],
        };
        let mut log = IterationLog::new(Uuid::nil());
        log.append(IterationDraft {
            workflow_ir: ir,
            compiled_json: json!({ "name": "snapshot test" }),
            rationale: "initial draft".to_string(),
            score: Some(70),
            score_breakdown: None,
            fix_plan: None,
        });
        log
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = std::env::temp_dir().join(format!("kousei-snap-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("log.json");

        let log = sample_log();
        save_log(&log, &path).unwrap();
        let loaded = load_log(&path).unwrap();
        assert_eq!(loaded, log);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn loading_a_missing_file_is_an_io_error() {
        let err = load_log("/nonexistent/kousei/log.json").unwrap_err();
        assert!(matches!(err, SnapshotError::Io { .. }));
    }
}
