use async_trait::async_trait;
use chrono::SecondsFormat;
use log::warn;

use super::core::AzureDevOpsClient;
use crate::error::Result;
use crate::providers::types::{
    Artifact, Build, BuildQuery, ListResponse, TestResult, TestRun, Timeline,
};
use crate::providers::BuildApi;

const RESULTS_PAGE_SIZE: usize = 1000;
const MAX_RESULT_PAGES: usize = 100;

#[async_trait]
impl BuildApi for AzureDevOpsClient {
    async fn get_build(&self, project: &str, build_id: u32) -> Result<Build> {
        let url = self.api_url(project, &format!("build/builds/{build_id}"))?;
        self.send_json(self.client.get(url), &format!("build {build_id}"))
            .await
    }

    async fn get_build_timeline(&self, project: &str, build_id: u32) -> Result<Timeline> {
        let url = self.api_url(project, &format!("build/builds/{build_id}/timeline"))?;
        self.send_json(self.client.get(url), &format!("timeline of build {build_id}"))
            .await
    }

    async fn get_build_artifacts(&self, project: &str, build_id: u32) -> Result<Vec<Artifact>> {
        let url = self.api_url(project, &format!("build/builds/{build_id}/artifacts"))?;
        let artifacts: ListResponse<Artifact> = self
            .send_json(self.client.get(url), &format!("artifacts of build {build_id}"))
            .await?;
        Ok(artifacts.value)
    }

    async fn list_test_runs(&self, project: &str, build_id: u32) -> Result<Vec<TestRun>> {
        let url = self.api_url(project, "test/runs")?;
        let request = self
            .client
            .get(url)
            .query(&[("buildUri", format!("vstfs:///Build/Build/{build_id}"))]);
        let runs: ListResponse<TestRun> = self
            .send_json(request, &format!("test runs of build {build_id}"))
            .await?;
        Ok(runs.value)
    }

    async fn list_test_results(&self, project: &str, run_id: u32) -> Result<Vec<TestResult>> {
        self.fetch_test_results(project, run_id, RESULTS_PAGE_SIZE, MAX_RESULT_PAGES)
            .await
    }

    async fn list_builds(&self, project: &str, query: &BuildQuery) -> Result<Vec<Build>> {
        let url = self.api_url(project, "build/builds")?;

        let mut params = vec![
            ("$top", query.top.to_string()),
            ("queryOrder", query.order.as_str().to_string()),
        ];
        if !query.definitions.is_empty() {
            let ids: Vec<String> = query.definitions.iter().map(ToString::to_string).collect();
            params.push(("definitions", ids.join(",")));
        }
        if let Some(branch) = &query.branch_name {
            params.push(("branchName", branch.clone()));
        }
        if let Some(min) = query.min_finish_time {
            params.push(("minTime", min.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(max) = query.max_finish_time {
            params.push(("maxTime", max.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(status) = query.status_filter {
            params.push(("statusFilter", status.as_str().to_string()));
        }

        let request = self.client.get(url).query(&params);
        let builds: ListResponse<Build> = self.send_json(request, "build list").await?;
        Ok(builds.value)
    }
}

impl AzureDevOpsClient {
    /// Page through a run's results, stopping after `max_pages` requests even if pages stay full.
    async fn fetch_test_results(
        &self,
        project: &str,
        run_id: u32,
        page_size: usize,
        max_pages: usize,
    ) -> Result<Vec<TestResult>> {
        let mut all_results = Vec::new();

        for page_number in 1..=max_pages {
            let url = self.api_url(project, &format!("test/Runs/{run_id}/results"))?;
            let request = self
                .client
                .get(url)
                .query(&[("$top", page_size), ("$skip", all_results.len())]);
            let page: ListResponse<TestResult> = self
                .send_json(request, &format!("results of test run {run_id}"))
                .await?;

            let fetched = page.value.len();
            all_results.extend(page.value);

            if fetched < page_size {
                return Ok(all_results);
            }
            if page_number == max_pages {
                warn!(
                    "Test run {run_id}: stopped after {max_pages} pages ({} results)",
                    all_results.len()
                );
            }
        }

        Ok(all_results)
    }
}
