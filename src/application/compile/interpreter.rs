use crate::{
    application::stores::ArtifactStore,
    domain::{documents::ArtifactRef, outcome::CompilationOutcome},
};

use super::runner::RunOutcome;

/// Map a finished run plus filesystem evidence to a terminal outcome.
///
/// A zero exit status is only trusted once the expected artifact is on disk.
pub async fn interpret(
    run: RunOutcome,
    artifact: &ArtifactRef,
    artifacts: &dyn ArtifactStore,
) -> CompilationOutcome {
    let output = match run {
        RunOutcome::TimedOut => return CompilationOutcome::Timeout,
        RunOutcome::SpawnFailed(message) | RunOutcome::WaitFailed(message) => {
            return CompilationOutcome::SystemError { message };
        }
        RunOutcome::Exited(output) => output,
    };

    if !output.succeeded() {
        return CompilationOutcome::CompilationFailed {
            stderr: output.stderr,
        };
    }

    match artifacts.exists(artifact).await {
        Ok(true) => CompilationOutcome::Success {
            artifact: artifact.clone(),
        },
        Ok(false) => CompilationOutcome::ArtifactMissing {
            stdout: output.stdout,
        },
        Err(err) => CompilationOutcome::system_error(err.to_string()),
    }
}
