use std::time::Duration;

use engine_core::execution_log::DiagnosticClassification;
use engine_core::{SimulationArtifact, TrialOutcome};
use sandbox_client::{ExecResult, Sandbox};
use serde::Deserialize;

pub const MODEL_PATH: &str = "/tmp/model.py";
pub const TRIAL_TIMEOUT: Duration = Duration::from_secs(3);
pub const SMOKE_TEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Budget for a single artifact-provided `run_monte_carlo` call, which
/// covers the whole batch in one sandbox round trip rather than one
/// `TRIAL_TIMEOUT` per seed.
pub const ARTIFACT_MONTE_CARLO_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct TrialWireResult {
    metric: f64,
}

#[derive(Deserialize)]
struct MonteCarloWireResult {
    outcomes: Vec<bool>,
}

/// Classified outcome of a single execution attempt (smoke test or trial).
pub enum TrialAttempt {
    Ok(TrialOutcome),
    Failed {
        classification: DiagnosticClassification,
        exec: ExecResult,
    },
}

/// Writes the artifact to its stable in-sandbox path. Idempotent — callers
/// call this once per artifact version, not once per trial.
pub async fn write_artifact(sandbox: &Sandbox, artifact: &SimulationArtifact) -> std::io::Result<()> {
    sandbox
        .write_file(MODEL_PATH, artifact.code.as_bytes())
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}

/// Executes `run_trial(seed)` inside the sandbox and classifies the
/// outcome. The artifact must already have been written via
/// `write_artifact`.
pub async fn run_trial(sandbox: &Sandbox, seed: u64, timeout: Duration) -> TrialAttempt {
    let wrapper = format!(
        "import json\n\
         with open({path:?}) as _f:\n\
         \texec(_f.read())\n\
         _metric, _aux = run_trial({seed})\n\
         print(json.dumps({{\"metric\": _metric}}))\n",
        path = MODEL_PATH,
        seed = seed,
    );

    let exec = match sandbox.exec(&wrapper, timeout).await {
        Ok(exec) => exec,
        Err(err) => {
            let classification = if matches!(err, sandbox_client::SandboxError::Timeout(_)) {
                DiagnosticClassification::Timeout
            } else {
                DiagnosticClassification::RuntimeError
            };
            return TrialAttempt::Failed {
                classification,
                exec: ExecResult {
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: err.to_string(),
                    structured_result: None,
                },
            };
        }
    };

    if !exec.succeeded() {
        return TrialAttempt::Failed {
            classification: classify_nonzero_exit(&exec),
            exec,
        };
    }

    let parsed = exec
        .structured_result
        .clone()
        .map(|v| serde_json::from_value::<TrialWireResult>(v).map_err(|e| e.to_string()))
        .unwrap_or_else(|| parse_last_json_line(&exec.stdout));

    match parsed {
        Ok(wire) if wire.metric.is_finite() => {
            TrialAttempt::Ok(TrialOutcome::new(seed, wire.metric, false))
        }
        Ok(_) => TrialAttempt::Failed {
            classification: DiagnosticClassification::NonFiniteMetric,
            exec,
        },
        Err(_) => TrialAttempt::Failed {
            classification: DiagnosticClassification::RuntimeError,
            exec,
        },
    }
}

/// Invokes the artifact's own `run_monte_carlo(n_runs, threshold)` inside
/// the sandbox in a single call, instead of synthesizing the batch via
/// `runs` separate `run_trial` calls. Returns `None` on any execution or
/// parse failure — the caller falls back to the per-seed loop in that case,
/// since providing `run_monte_carlo` is optional (spec §4.F).
pub async fn run_artifact_monte_carlo(
    sandbox: &Sandbox,
    runs: usize,
    threshold: f64,
    timeout: Duration,
) -> Option<Vec<bool>> {
    let wrapper = format!(
        "import json\n\
         with open({path:?}) as _f:\n\
         \texec(_f.read())\n\
         _res = run_monte_carlo({runs}, {threshold})\n\
         _outcomes = _res[\"outcomes\"] if isinstance(_res, dict) else _res.outcomes\n\
         print(json.dumps({{\"outcomes\": list(_outcomes)}}))\n",
        path = MODEL_PATH,
        runs = runs,
        threshold = threshold,
    );

    let exec = sandbox.exec(&wrapper, timeout).await.ok()?;
    if !exec.succeeded() {
        return None;
    }

    let parsed = exec
        .structured_result
        .clone()
        .map(|v| serde_json::from_value::<MonteCarloWireResult>(v).ok())
        .unwrap_or_else(|| {
            exec.stdout
                .lines()
                .rev()
                .find_map(|line| serde_json::from_str::<MonteCarloWireResult>(line.trim()).ok())
        })?;

    Some(parsed.outcomes)
}

fn classify_nonzero_exit(exec: &ExecResult) -> DiagnosticClassification {
    let stderr = exec.stderr.to_lowercase();
    if stderr.contains("syntaxerror") || stderr.contains("indentationerror") {
        DiagnosticClassification::CompileOrParseError
    } else {
        DiagnosticClassification::RuntimeError
    }
}

fn parse_last_json_line(stdout: &str) -> Result<TrialWireResult, String> {
    stdout
        .lines()
        .rev()
        .find_map(|line| serde_json::from_str::<TrialWireResult>(line.trim()).ok())
        .ok_or_else(|| "no parseable JSON line in stdout".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trailing_json_line() {
        let stdout = "some log line\n{\"metric\": 0.42}\n";
        let parsed = parse_last_json_line(stdout).unwrap();
        assert!((parsed.metric - 0.42).abs() < 1e-12);
    }

    #[test]
    fn syntax_error_stderr_classifies_as_compile_error() {
        let exec = ExecResult {
            exit_code: 1,
            stdout: String::new(),
            stderr: "  File \"model.py\", line 3\nSyntaxError: invalid syntax".into(),
            structured_result: None,
        };
        assert_eq!(classify_nonzero_exit(&exec), DiagnosticClassification::CompileOrParseError);
    }
}
