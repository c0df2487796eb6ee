use log::{debug, warn};

use super::outcome::normalize_outcome;
use super::{BuildIdentity, TestSummary};
use crate::error::Result;
use crate::providers::BuildApi;

/// Fold every test result of a build into one summary.
///
/// Never fails: a listing error degrades to the zero summary so a report can still be built.
pub async fn summarize_tests<A>(api: &A, build: &BuildIdentity) -> TestSummary
where
    A: BuildApi + ?Sized,
{
    match collect_test_summary(api, build).await {
        Ok(summary) => summary,
        Err(e) => {
            warn!("Could not summarize tests for {build}: {e}");
            TestSummary::default()
        }
    }
}

async fn collect_test_summary<A>(api: &A, build: &BuildIdentity) -> Result<TestSummary>
where
    A: BuildApi + ?Sized,
{
    let runs = api.list_test_runs(&build.project, build.build_id).await?;

    if runs.is_empty() {
        debug!("No test runs recorded for {build}");
        return Ok(TestSummary::default());
    }

    let mut outcomes = Vec::new();
    for run in &runs {
        let results = api.list_test_results(&build.project, run.id).await?;
        outcomes.extend(
            results
                .iter()
                .map(|result| normalize_outcome(result.outcome.as_deref())),
        );
    }

    let summary = TestSummary::from_outcomes(outcomes);
    debug!(
        "{build}: {} passed, {} failed, {} skipped across {} runs",
        summary.passed(),
        summary.failed(),
        summary.skipped(),
        runs.len()
    );

    Ok(summary)
}
