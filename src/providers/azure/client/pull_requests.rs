use async_trait::async_trait;
use serde_json::json;

use super::core::AzureDevOpsClient;
use crate::error::Result;
use crate::providers::types::{
    Comment, CommentThread, ListResponse, NewComment, NewThread, PullRequest, ThreadStatus,
};
use crate::providers::PullRequestApi;

fn pull_request_path(repository: &str, pull_request_id: u32) -> String {
    format!(
        "git/repositories/{}/pullRequests/{pull_request_id}",
        urlencoding::encode(repository)
    )
}

#[async_trait]
impl PullRequestApi for AzureDevOpsClient {
    async fn get_pull_request(
        &self,
        project: &str,
        repository: &str,
        pull_request_id: u32,
    ) -> Result<PullRequest> {
        let url = self.api_url(project, &pull_request_path(repository, pull_request_id))?;
        self.send_json(
            self.client.get(url),
            &format!("pull request {pull_request_id}"),
        )
        .await
    }

    async fn create_comment_thread(
        &self,
        project: &str,
        repository: &str,
        pull_request_id: u32,
        thread: &NewThread,
    ) -> Result<CommentThread> {
        let path = format!("{}/threads", pull_request_path(repository, pull_request_id));
        let url = self.api_url(project, &path)?;
        self.send_json(
            self.client.post(url).json(thread),
            &format!("new thread on pull request {pull_request_id}"),
        )
        .await
    }

    async fn update_comment_thread_status(
        &self,
        project: &str,
        repository: &str,
        pull_request_id: u32,
        thread_id: u32,
        status: ThreadStatus,
    ) -> Result<CommentThread> {
        let path = format!(
            "{}/threads/{thread_id}",
            pull_request_path(repository, pull_request_id)
        );
        let url = self.api_url(project, &path)?;
        self.send_json(
            self.client.patch(url).json(&json!({ "status": status })),
            &format!("thread {thread_id} on pull request {pull_request_id}"),
        )
        .await
    }

    async fn create_comment_reply(
        &self,
        project: &str,
        repository: &str,
        pull_request_id: u32,
        thread_id: u32,
        content: &str,
    ) -> Result<Comment> {
        let path = format!(
            "{}/threads/{thread_id}/comments",
            pull_request_path(repository, pull_request_id)
        );
        let url = self.api_url(project, &path)?;
        // Replies hang off the thread's first comment
        let body = NewComment::text(content, Some(1));
        self.send_json(
            self.client.post(url).json(&body),
            &format!("reply to thread {thread_id} on pull request {pull_request_id}"),
        )
        .await
    }

    async fn list_comment_threads(
        &self,
        project: &str,
        repository: &str,
        pull_request_id: u32,
    ) -> Result<Vec<CommentThread>> {
        let path = format!("{}/threads", pull_request_path(repository, pull_request_id));
        let url = self.api_url(project, &path)?;
        let threads: ListResponse<CommentThread> = self
            .send_json(
                self.client.get(url),
                &format!("threads of pull request {pull_request_id}"),
            )
            .await?;
        Ok(threads.value)
    }
}
