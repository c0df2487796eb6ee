use std::fmt;

use log::{debug, info};

use super::batch::{best_effort, process_batch, BatchResult, CancelToken};
use super::test_summary::summarize_tests;
use super::{validate_project, BuildIdentity, BuildReport};
use crate::error::Result;
use crate::providers::types::Timeline;
use crate::providers::BuildApi;

/// Build metadata, timeline, artifacts and tests for one build.
///
/// Only the metadata fetch is required; everything else degrades to an empty value.
pub async fn assemble_report<A>(api: &A, identity: &BuildIdentity) -> Result<BuildReport>
where
    A: BuildApi + ?Sized,
{
    let build = api
        .get_build(&identity.project, identity.build_id)
        .await
        .map_err(|e| {
            e.context(format!(
                "Failed to fetch build {} in project '{}'",
                identity.build_id, identity.project
            ))
        })?;

    let timeline_label = format!("timeline of {identity}");
    let artifacts_label = format!("artifacts of {identity}");
    let (timeline, artifacts, tests) = tokio::join!(
        best_effort(
            api.get_build_timeline(&identity.project, identity.build_id),
            Timeline::default(),
            &timeline_label,
        ),
        best_effort(
            api.get_build_artifacts(&identity.project, identity.build_id),
            Vec::new(),
            &artifacts_label,
        ),
        summarize_tests(api, identity),
    );

    debug!(
        "{identity}: {} timeline records, {} artifacts, {} tests ({:.1}% passed)",
        timeline.records.len(),
        artifacts.len(),
        tests.total(),
        tests.pass_rate()
    );

    Ok(BuildReport::from_build(identity, build, tests))
}

struct BuildItem<'a> {
    project: &'a str,
    build_id: u32,
}

impl fmt::Display for BuildItem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "build {} in project '{}'", self.build_id, self.project)
    }
}

/// Assemble reports for many builds; builds that fail are logged and left out.
pub async fn fetch_build_reports<A>(
    api: &A,
    project: &str,
    build_ids: &[u32],
    cancel: &CancelToken,
) -> Result<BatchResult<BuildReport>>
where
    A: BuildApi + ?Sized,
{
    validate_project(project)?;
    info!(
        "Fetching {} build reports for project: {project}",
        build_ids.len()
    );

    let items: Vec<BuildItem<'_>> = build_ids
        .iter()
        .map(|&build_id| BuildItem { project, build_id })
        .collect();

    process_batch(
        items,
        |item| async move {
            let identity = BuildIdentity::new(item.project, item.build_id)?;
            assemble_report(api, &identity).await
        },
        cancel,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildLensError;
    use crate::insights::testing::{build, result, with_definition, FakeApi};
    use crate::providers::types::TestRun;

    fn api_with_builds(ids: &[u32]) -> FakeApi {
        let mut api = FakeApi::default();
        for &id in ids {
            api.builds.insert(
                id,
                with_definition(build(id, "succeeded", Some(0), Some(5)), 3, "ci"),
            );
        }
        api
    }

    #[tokio::test]
    async fn test_report_embeds_tests_and_duration() {
        let mut api = api_with_builds(&[42]);
        api.test_runs.insert(42, vec![TestRun { id: 8, name: None }]);
        api.test_results
            .insert(8, vec![result("Passed"), result("Inconclusive")]);

        let identity = BuildIdentity::new("Fiber", 42).unwrap();
        let report = assemble_report(&api, &identity).await.unwrap();

        assert_eq!(report.build_id, 42);
        assert_eq!(report.project, "Fiber");
        assert_eq!(report.result.as_deref(), Some("succeeded"));
        assert_eq!(report.duration, Some(chrono::Duration::minutes(5)));
        assert_eq!(report.definition_name.as_deref(), Some("ci"));
        assert_eq!(report.tests.total(), 2);
        assert_eq!(report.tests.skipped(), 1);
    }

    #[tokio::test]
    async fn test_missing_metadata_fails_with_context() {
        let api = FakeApi::default();

        let identity = BuildIdentity::new("Fiber", 77).unwrap();
        let err = assemble_report(&api, &identity).await.unwrap_err();

        assert!(matches!(err, BuildLensError::Context { .. }));
        let message = err.to_string();
        assert!(message.contains("77"), "{message}");
        assert!(message.contains("Fiber"), "{message}");
        // Nothing else is attempted once the mandatory fetch fails
        assert_eq!(api.call_count(), 1);
    }

    #[tokio::test]
    async fn test_optional_fetch_failures_are_absorbed() {
        let mut api = api_with_builds(&[42]);
        api.fail_timeline = true;
        api.fail_artifacts = true;
        api.fail_test_runs = true;

        let identity = BuildIdentity::new("Fiber", 42).unwrap();
        let report = assemble_report(&api, &identity).await.unwrap();

        assert_eq!(report.tests, crate::insights::TestSummary::default());
        assert_eq!(report.tests.total(), 0);
    }

    #[tokio::test]
    async fn test_batch_skips_failing_build_in_order() {
        let mut api = api_with_builds(&[1, 3]);
        api.failing_builds.insert(2);

        let batch = fetch_build_reports(&api, "Fiber", &[1, 2, 3], &CancelToken::new())
            .await
            .unwrap();

        let ids: Vec<u32> = batch.items.iter().map(|r| r.build_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(batch.failed, vec!["build 2 in project 'Fiber'"]);
    }

    #[tokio::test]
    async fn test_batch_zero_id_fails_only_that_item() {
        let api = api_with_builds(&[5]);

        let batch = fetch_build_reports(&api, "Fiber", &[0, 5], &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(batch.items.len(), 1);
        assert_eq!(batch.items[0].build_id, 5);
        assert_eq!(batch.failed, vec!["build 0 in project 'Fiber'"]);
    }

    #[tokio::test]
    async fn test_batch_of_unknown_builds_is_empty() {
        let api = FakeApi::default();

        let batch = fetch_build_reports(&api, "Fiber", &[10, 11], &CancelToken::new())
            .await
            .unwrap();

        assert!(batch.items.is_empty());
        assert_eq!(batch.failed.len(), 2);
    }

    #[tokio::test]
    async fn test_batch_validates_input_before_fetching() {
        let api = api_with_builds(&[1]);

        let empty = fetch_build_reports(&api, "Fiber", &[], &CancelToken::new()).await;
        let no_project = fetch_build_reports(&api, "", &[1], &CancelToken::new()).await;

        assert!(matches!(empty, Err(BuildLensError::Validation(_))));
        assert!(matches!(no_project, Err(BuildLensError::Validation(_))));
        assert_eq!(api.call_count(), 0);
    }
}
