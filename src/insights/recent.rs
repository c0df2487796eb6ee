use log::{info, warn};

use super::batch::{BatchResult, CancelToken};
use super::report::fetch_build_reports;
use super::{validate_project, BuildReport};
use crate::error::{BuildLensError, Result};
use crate::providers::types::{Build, BuildQuery, BuildStatusFilter, QueryOrder};
use crate::providers::{BuildApi, PullRequestApi};

/// Ids of up to `count` builds of a definition, most recently finished first.
pub async fn resolve_recent_build_ids<A>(
    api: &A,
    project: &str,
    definition_id: u32,
    count: usize,
    status: Option<BuildStatusFilter>,
) -> Result<Vec<u32>>
where
    A: BuildApi + ?Sized,
{
    validate_project(project)?;
    if definition_id == 0 {
        return Err(BuildLensError::Validation(
            "Definition id must be a positive integer".to_string(),
        ));
    }
    validate_count(count)?;

    let mut query = BuildQuery::new(count);
    query.definitions = vec![definition_id];
    query.order = QueryOrder::FinishTimeDescending;
    query.status_filter = Some(status.unwrap_or(BuildStatusFilter::Completed));

    let builds = api.list_builds(project, &query).await.map_err(|e| {
        e.context(format!(
            "Failed to list builds of definition {definition_id} in project '{project}'"
        ))
    })?;

    Ok(most_recent_first(builds, count))
}

/// Reports for the `count` most recently finished builds of a definition.
pub async fn recent_build_reports<A>(
    api: &A,
    project: &str,
    definition_id: u32,
    count: usize,
    status: Option<BuildStatusFilter>,
    cancel: &CancelToken,
) -> Result<BatchResult<BuildReport>>
where
    A: BuildApi + ?Sized,
{
    let ids = resolve_recent_build_ids(api, project, definition_id, count, status).await?;
    info!(
        "Resolved {} of {count} requested builds for definition {definition_id}",
        ids.len()
    );

    if ids.is_empty() {
        warn!("No builds found for definition {definition_id} in project: {project}");
        return Ok(BatchResult::default());
    }

    fetch_build_reports(api, project, &ids, cancel).await
}

/// Reports for the builds of a pull request's merge branch, most recently finished first.
pub async fn pull_request_build_reports<A>(
    api: &A,
    project: &str,
    repository: &str,
    pull_request_id: u32,
    count: usize,
    cancel: &CancelToken,
) -> Result<BatchResult<BuildReport>>
where
    A: BuildApi + PullRequestApi + ?Sized,
{
    validate_project(project)?;
    if repository.trim().is_empty() || pull_request_id == 0 {
        return Err(BuildLensError::Validation(
            "Repository and a positive pull request id are required".to_string(),
        ));
    }
    validate_count(count)?;

    let pull_request = api
        .get_pull_request(project, repository, pull_request_id)
        .await
        .map_err(|e| {
            e.context(format!(
                "Failed to fetch pull request {pull_request_id} of repository '{repository}' in project '{project}'"
            ))
        })?;
    info!(
        "Pull request {pull_request_id}: {}",
        pull_request.title.as_deref().unwrap_or("<untitled>")
    );

    let mut query = BuildQuery::new(count);
    query.branch_name = Some(format!("refs/pull/{pull_request_id}/merge"));
    // Pull request builds may still be running, so select by queue time and re-sort below
    query.order = QueryOrder::QueueTimeDescending;

    let builds = api.list_builds(project, &query).await.map_err(|e| {
        e.context(format!(
            "Failed to list builds of pull request {pull_request_id} in project '{project}'"
        ))
    })?;
    let ids = most_recent_first(builds, count);

    if ids.is_empty() {
        warn!("No builds found for pull request {pull_request_id} in project: {project}");
        return Ok(BatchResult::default());
    }

    fetch_build_reports(api, project, &ids, cancel).await
}

fn validate_count(count: usize) -> Result<()> {
    if count == 0 {
        return Err(BuildLensError::Validation(
            "Build count must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Sort by finish time descending (unfinished builds last) and keep `count` ids.
fn most_recent_first(mut builds: Vec<Build>, count: usize) -> Vec<u32> {
    builds.sort_by(|a, b| b.finish_time.cmp(&a.finish_time));
    builds.into_iter().take(count).map(|b| b.id).collect()
}
