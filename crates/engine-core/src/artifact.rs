use serde::{Deserialize, Serialize};

/// Required entry points the sandboxed program must define. The engine
/// never parses the artifact text itself — this exists purely as a
/// structural-violation check (substring presence) the repair loop can run
/// before paying for a sandbox round trip, and as shared vocabulary for
/// prompts and diagnostics.
pub const RUN_TRIAL_ENTRY_POINT: &str = "run_trial";
pub const RUN_MONTE_CARLO_ENTRY_POINT: &str = "run_monte_carlo";

/// Patterns the generator is instructed never to emit; a match is treated
/// as a structural-violation diagnostic routed straight into the repair
/// loop rather than executed.
pub const FORBIDDEN_PATTERNS: &[&str] = &[
    "socket.", "urllib", "requests.", "http.client", "subprocess", "os.system",
];

/// Static self-description the generated program is asked to expose
/// alongside its entry points, used only for the human-facing explanation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDescription {
    pub agent_classes: Vec<String>,
    pub approximate_counts: Vec<(String, u64)>,
    pub rationale: String,
    pub outcome_interpretation: String,
}

/// The marker line the system prompt asks the generator to emit, e.g.
/// `# SELF_DESCRIPTION: {"agent_classes": [...], ...}`.
const SELF_DESCRIPTION_MARKER: &str = "SELF_DESCRIPTION:";

impl ArtifactDescription {
    /// Best-effort extraction of the self-description line from generated
    /// code. Returns `None` if the marker is absent or the JSON after it
    /// doesn't parse — a model that forgets or malforms the block just
    /// leaves the explanation without a description, it never fails the
    /// pipeline.
    pub fn parse_from_code(code: &str) -> Option<Self> {
        let line = code.lines().find(|line| line.contains(SELF_DESCRIPTION_MARKER))?;
        let json_start = line.find(SELF_DESCRIPTION_MARKER)? + SELF_DESCRIPTION_MARKER.len();
        serde_json::from_str(line[json_start..].trim()).ok()
    }
}

/// Opaque program text plus whatever self-description the generator
/// attached. Owned by the pipeline that produced it; a repair never
/// mutates an artifact in place, it produces a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationArtifact {
    pub code: String,
    pub description: Option<ArtifactDescription>,
    /// True if the artifact was supplied by the caller as a baseline
    /// fallback rather than authored by the generator.
    pub is_fallback: bool,
}

impl SimulationArtifact {
    pub fn generated(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: None,
            is_fallback: false,
        }
    }

    /// Like [`Self::generated`], but parses the self-description line out
    /// of `code` and attaches it (spec §4.C/§4.H).
    pub fn generated_with_description(code: impl Into<String>) -> Self {
        let code = code.into();
        let description = ArtifactDescription::parse_from_code(&code);
        Self {
            code,
            description,
            is_fallback: false,
        }
    }

    pub fn fallback(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: None,
            is_fallback: true,
        }
    }

    /// Cheap structural check run before executing the artifact: do the
    /// required entry points appear, and does any forbidden pattern
    /// appear. Does not guarantee the program is valid code — only that an
    /// execution attempt is worth making.
    pub fn structural_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if !self.code.contains(RUN_TRIAL_ENTRY_POINT) {
            violations.push(format!("missing entry point `{RUN_TRIAL_ENTRY_POINT}`"));
        }
        for pattern in FORBIDDEN_PATTERNS {
            if self.code.contains(pattern) {
                violations.push(format!("forbidden pattern `{pattern}`"));
            }
        }
        violations
    }

    pub fn provides_run_monte_carlo(&self) -> bool {
        self.code.contains(RUN_MONTE_CARLO_ENTRY_POINT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_missing_entry_point() {
        let artifact = SimulationArtifact::generated("def something_else(): pass");
        let violations = artifact.structural_violations();
        assert!(violations.iter().any(|v| v.contains("run_trial")));
    }

    #[test]
    fn detects_forbidden_network_pattern() {
        let artifact = SimulationArtifact::generated(
            "import requests\ndef run_trial(seed):\n    requests.get('http://x')\n",
        );
        let violations = artifact.structural_violations();
        assert!(violations.iter().any(|v| v.contains("requests.")));
    }

    #[test]
    fn clean_artifact_has_no_violations() {
        let artifact =
            SimulationArtifact::generated("def run_trial(seed):\n    return seed, None\n");
        assert!(artifact.structural_violations().is_empty());
    }
}
