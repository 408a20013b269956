use serde::Serialize;

use super::{documents::ArtifactRef, engine::EngineChoice};

/// Terminal result of one compilation attempt. Exactly one variant per job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CompilationOutcome {
    Success { artifact: ArtifactRef },
    EngineNotFound { requested: EngineChoice },
    /// Non-zero exit; carries the engine's standard error verbatim.
    CompilationFailed { stderr: String },
    /// Clean exit but no artifact on disk; carries standard output verbatim.
    ArtifactMissing { stdout: String },
    Timeout,
    SystemError { message: String },
}

impl CompilationOutcome {
    pub fn system_error(message: impl Into<String>) -> Self {
        Self::SystemError {
            message: message.into(),
        }
    }

    /// Stable label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CompilationOutcome::Success { .. } => "success",
            CompilationOutcome::EngineNotFound { .. } => "engine_not_found",
            CompilationOutcome::CompilationFailed { .. } => "compilation_failed",
            CompilationOutcome::ArtifactMissing { .. } => "artifact_missing",
            CompilationOutcome::Timeout => "timeout",
            CompilationOutcome::SystemError { .. } => "system_error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CompilationOutcome::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::documents::DocumentRef;

    #[test]
    fn serializes_with_outcome_tag() {
        let artifact = DocumentRef::parse("paper").expect("valid name").artifact();
        let value = serde_json::to_value(CompilationOutcome::Success { artifact })
            .expect("serializable");
        assert_eq!(value, json!({"outcome": "success", "artifact": "paper.pdf"}));

        let value = serde_json::to_value(CompilationOutcome::EngineNotFound {
            requested: EngineChoice::XeLatex,
        })
        .expect("serializable");
        assert_eq!(
            value,
            json!({"outcome": "engine_not_found", "requested": "xelatex"})
        );

        let value = serde_json::to_value(CompilationOutcome::Timeout).expect("serializable");
        assert_eq!(value, json!({"outcome": "timeout"}));
    }

    #[test]
    fn kind_matches_serialized_tag() {
        let outcomes = [
            CompilationOutcome::CompilationFailed {
                stderr: "x".to_string(),
            },
            CompilationOutcome::ArtifactMissing {
                stdout: "y".to_string(),
            },
            CompilationOutcome::system_error("z"),
            CompilationOutcome::Timeout,
        ];
        for outcome in outcomes {
            let value = serde_json::to_value(&outcome).expect("serializable");
            assert_eq!(value["outcome"], outcome.kind());
            assert!(!outcome.is_success());
        }
    }
}
