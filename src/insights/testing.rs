//! In-memory provider used by the aggregation tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::error::{BuildLensError, Result};
use crate::providers::types::{
    Artifact, Build, BuildQuery, Comment, CommentThread, DefinitionRef, NewThread, PullRequest,
    TestResult, TestRun, ThreadStatus, Timeline,
};
use crate::providers::{BuildApi, PullRequestApi};

#[derive(Default)]
pub struct FakeApi {
    pub builds: HashMap<u32, Build>,
    pub failing_builds: HashSet<u32>,
    pub fail_timeline: bool,
    pub fail_artifacts: bool,
    pub test_runs: HashMap<u32, Vec<TestRun>>,
    pub fail_test_runs: bool,
    pub test_results: HashMap<u32, Vec<TestResult>>,
    pub failing_result_runs: HashSet<u32>,
    pub listed_builds: Vec<Build>,
    pub fail_list: bool,
    pub pull_requests: HashMap<u32, PullRequest>,
    pub threads: Vec<CommentThread>,
    /// Comment contents whose thread creation fails.
    pub failing_comments: HashSet<String>,
    pub calls: AtomicUsize,
    pub queries: Mutex<Vec<BuildQuery>>,
    pub created_threads: Mutex<Vec<NewThread>>,
}

impl FakeApi {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<BuildQuery> {
        self.queries.lock().unwrap().last().cloned()
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 11, hour, minute, 0).unwrap()
}

pub fn build(id: u32, result: &str, started_min: Option<u32>, finished_min: Option<u32>) -> Build {
    Build {
        id,
        status: Some("completed".to_string()),
        result: Some(result.to_string()),
        start_time: started_min.map(|m| at(10, 0) + Duration::minutes(i64::from(m))),
        finish_time: finished_min.map(|m| at(10, 0) + Duration::minutes(i64::from(m))),
        ..Build::default()
    }
}

pub fn with_definition(mut build: Build, id: u32, name: &str) -> Build {
    build.definition = Some(DefinitionRef {
        id,
        name: Some(name.to_string()),
    });
    build
}

pub fn result(outcome: &str) -> TestResult {
    TestResult {
        outcome: Some(outcome.to_string()),
        ..TestResult::default()
    }
}

#[async_trait]
impl BuildApi for FakeApi {
    async fn get_build(&self, _project: &str, build_id: u32) -> Result<Build> {
        self.hit();
        if self.failing_builds.contains(&build_id) {
            return Err(BuildLensError::Api(format!("build {build_id} exploded")));
        }
        self.builds
            .get(&build_id)
            .cloned()
            .ok_or_else(|| BuildLensError::NotFound(format!("build {build_id}")))
    }

    async fn get_build_timeline(&self, _project: &str, build_id: u32) -> Result<Timeline> {
        self.hit();
        if self.fail_timeline {
            return Err(BuildLensError::Api(format!("no timeline for {build_id}")));
        }
        Ok(Timeline::default())
    }

    async fn get_build_artifacts(&self, _project: &str, build_id: u32) -> Result<Vec<Artifact>> {
        self.hit();
        if self.fail_artifacts {
            return Err(BuildLensError::Api(format!("no artifacts for {build_id}")));
        }
        Ok(vec![Artifact {
            id: Some(1),
            name: "drop".to_string(),
        }])
    }

    async fn list_test_runs(&self, _project: &str, build_id: u32) -> Result<Vec<TestRun>> {
        self.hit();
        if self.fail_test_runs {
            return Err(BuildLensError::Api("test service unavailable".to_string()));
        }
        Ok(self.test_runs.get(&build_id).cloned().unwrap_or_default())
    }

    async fn list_test_results(&self, _project: &str, run_id: u32) -> Result<Vec<TestResult>> {
        self.hit();
        if self.failing_result_runs.contains(&run_id) {
            return Err(BuildLensError::Api(format!("run {run_id} unavailable")));
        }
        Ok(self.test_results.get(&run_id).cloned().unwrap_or_default())
    }

    async fn list_builds(&self, _project: &str, query: &BuildQuery) -> Result<Vec<Build>> {
        self.hit();
        self.queries.lock().unwrap().push(query.clone());
        if self.fail_list {
            return Err(BuildLensError::Api("listing failed".to_string()));
        }
        Ok(self
            .listed_builds
            .iter()
            .take(query.top)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PullRequestApi for FakeApi {
    async fn get_pull_request(
        &self,
        _project: &str,
        _repository: &str,
        pull_request_id: u32,
    ) -> Result<PullRequest> {
        self.hit();
        self.pull_requests
            .get(&pull_request_id)
            .cloned()
            .ok_or_else(|| BuildLensError::NotFound(format!("pull request {pull_request_id}")))
    }

    async fn create_comment_thread(
        &self,
        _project: &str,
        _repository: &str,
        _pull_request_id: u32,
        thread: &NewThread,
    ) -> Result<CommentThread> {
        self.hit();
        let content = &thread.comments[0].content;
        if self.failing_comments.contains(content) {
            return Err(BuildLensError::Api(format!("rejected '{content}'")));
        }

        let mut created = self.created_threads.lock().unwrap();
        created.push(thread.clone());
        #[allow(clippy::cast_possible_truncation)]
        let id = created.len() as u32;
        Ok(CommentThread {
            id,
            status: Some("active".to_string()),
            comments: vec![Comment {
                id: Some(1),
                parent_comment_id: Some(0),
                content: Some(content.clone()),
                author: None,
            }],
            thread_context: thread.thread_context.clone(),
            is_deleted: false,
        })
    }

    async fn update_comment_thread_status(
        &self,
        _project: &str,
        _repository: &str,
        _pull_request_id: u32,
        thread_id: u32,
        status: ThreadStatus,
    ) -> Result<CommentThread> {
        self.hit();
        let mut thread = self
            .threads
            .iter()
            .find(|t| t.id == thread_id)
            .cloned()
            .ok_or_else(|| BuildLensError::NotFound(format!("thread {thread_id}")))?;
        thread.status = serde_json::to_value(status)?.as_str().map(str::to_string);
        Ok(thread)
    }

    async fn create_comment_reply(
        &self,
        _project: &str,
        _repository: &str,
        _pull_request_id: u32,
        thread_id: u32,
        content: &str,
    ) -> Result<Comment> {
        self.hit();
        if !self.threads.iter().any(|t| t.id == thread_id) {
            return Err(BuildLensError::NotFound(format!("thread {thread_id}")));
        }
        Ok(Comment {
            id: Some(2),
            parent_comment_id: Some(1),
            content: Some(content.to_string()),
            author: None,
        })
    }

    async fn list_comment_threads(
        &self,
        _project: &str,
        _repository: &str,
        _pull_request_id: u32,
    ) -> Result<Vec<CommentThread>> {
        self.hit();
        Ok(self.threads.clone())
    }
}
