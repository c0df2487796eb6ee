use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestOutcome {
    Passed,
    Failed,
    Skipped,
}

const SKIPPED_OUTCOMES: [&str; 3] = ["skipped", "notexecuted", "inconclusive"];

/// Map a provider outcome onto the three-valued taxonomy.
///
/// The provider vocabulary is open, so anything unrecognized (including a missing
/// outcome) counts as a failure rather than disappearing from the totals.
pub fn normalize_outcome(outcome: Option<&str>) -> TestOutcome {
    let Some(outcome) = outcome.filter(|o| !o.is_empty()) else {
        return TestOutcome::Failed;
    };

    let outcome = outcome.to_ascii_lowercase();
    match outcome.as_str() {
        "passed" => TestOutcome::Passed,
        "failed" => TestOutcome::Failed,
        o if SKIPPED_OUTCOMES.contains(&o) => TestOutcome::Skipped,
        _ => TestOutcome::Failed,
    }
}
