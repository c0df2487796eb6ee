pub mod azure;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::{
    Artifact, Build, BuildQuery, Comment, CommentThread, NewThread, PullRequest, TestResult, TestRun,
    ThreadStatus, Timeline,
};

#[async_trait]
pub trait BuildApi: Send + Sync {
    async fn get_build(&self, project: &str, build_id: u32) -> Result<Build>;

    async fn get_build_timeline(&self, project: &str, build_id: u32) -> Result<Timeline>;

    async fn get_build_artifacts(&self, project: &str, build_id: u32) -> Result<Vec<Artifact>>;

    async fn list_test_runs(&self, project: &str, build_id: u32) -> Result<Vec<TestRun>>;

    async fn list_test_results(&self, project: &str, run_id: u32) -> Result<Vec<TestResult>>;

    async fn list_builds(&self, project: &str, query: &BuildQuery) -> Result<Vec<Build>>;
}

#[async_trait]
pub trait PullRequestApi: Send + Sync {
    async fn get_pull_request(
        &self,
        project: &str,
        repository: &str,
        pull_request_id: u32,
    ) -> Result<PullRequest>;

    async fn create_comment_thread(
        &self,
        project: &str,
        repository: &str,
        pull_request_id: u32,
        thread: &NewThread,
    ) -> Result<CommentThread>;

    async fn update_comment_thread_status(
        &self,
        project: &str,
        repository: &str,
        pull_request_id: u32,
        thread_id: u32,
        status: ThreadStatus,
    ) -> Result<CommentThread>;

    async fn create_comment_reply(
        &self,
        project: &str,
        repository: &str,
        pull_request_id: u32,
        thread_id: u32,
        content: &str,
    ) -> Result<Comment>;

    async fn list_comment_threads(
        &self,
        project: &str,
        repository: &str,
        pull_request_id: u32,
    ) -> Result<Vec<CommentThread>>;
}
