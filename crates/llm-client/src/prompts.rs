use engine_core::artifact::FORBIDDEN_PATTERNS;

/// System prompt shared by `initial` and `repair`: the artifact contract,
/// constraints, and forbidden patterns (spec §4.C).
pub fn system_prompt() -> String {
    format!(
        "You are generating a self-contained agent-based Monte Carlo simulation \
         program to estimate the probability that a prediction-market question \
         resolves YES.\n\n\
         Your program MUST define:\n\
         - `run_trial(seed: int) -> (metric: float, auxiliary: any)`: deterministic \
           for a given seed, completes within 3 seconds, and returns a finite, \
           non-NaN metric.\n\
         - Optionally `run_monte_carlo(n_runs, threshold, seeds=None)` if you want \
           to provide your own aggregation; otherwise the caller will synthesize \
           it by calling `run_trial` repeatedly. If you provide it, print a \
           final JSON line of the form `{{\"outcomes\": [true, false, ...]}}` \
           (one boolean per run, in the order evaluated) to stdout.\n\
         - A self-description: a single comment line of the exact form \
           `# SELF_DESCRIPTION: <json>` where `<json>` is one JSON object with \
           keys `agent_classes` (array of strings), `approximate_counts` (array \
           of [name, count] pairs), `rationale` (string), and \
           `outcome_interpretation` (one sentence). Emit this line once, near \
           the top of the file, with the JSON object on that single line.\n\n\
         Constraints: bound your agent counts and step counts to something that \
         completes in the time budget above. Forbidden patterns (do not use any \
         of these): {forbidden}.\n",
        forbidden = FORBIDDEN_PATTERNS.join(", "),
    )
}

pub fn initial_user_prompt(question: &str, research_context: &str) -> String {
    format!(
        "Market question: {question}\n\n\
         Research context:\n{research_context}\n\n\
         Write the agent-based simulation program described in the system prompt."
    )
}

pub fn repair_user_prompt(
    previous_code: &str,
    classification: &str,
    stdout_tail: &str,
    stderr_tail: &str,
) -> String {
    format!(
        "Your previous program failed during execution.\n\n\
         Failure classification: {classification}\n\n\
         stdout (tail):\n{stdout_tail}\n\n\
         stderr (tail):\n{stderr_tail}\n\n\
         Previous program:\n{previous_code}\n\n\
         Produce a corrected, complete replacement program that fixes this issue \
         while still satisfying the contract in the system prompt."
    )
}

pub fn insufficient_stochasticity_prompt(previous_code: &str) -> String {
    format!(
        "Your previous program's calibration batch produced essentially constant \
         metrics (standard deviation below the variance floor). A Monte Carlo \
         over a deterministic outcome is meaningless. Introduce genuine \
         stochasticity driven by the trial seed (e.g. randomized agent behavior, \
         randomized initial conditions) so that repeated calibration trials \
         produce a real spread of outcomes.\n\n\
         Previous program:\n{previous_code}"
    )
}
