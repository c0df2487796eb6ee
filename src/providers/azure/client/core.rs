use log::debug;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::Token;
use crate::error::{BuildLensError, Result};

pub const API_VERSION: &str = "7.1";

pub struct AzureDevOpsClient {
    pub client: Client,
    pub org_url: Url,
    pub token: Option<Token>,
}

impl AzureDevOpsClient {
    pub fn new(org_url: &str, token: Option<Token>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("BuildLens/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BuildLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        // Url::join drops the last path segment unless the base ends with a slash
        let normalized = format!("{}/", org_url.trim_end_matches('/'));
        let org_url = Url::parse(&normalized)
            .map_err(|e| BuildLensError::Config(format!("Invalid organization URL: {e}")))?;

        Ok(Self {
            client,
            org_url,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// Personal access tokens travel as basic auth with an empty user name.
    pub fn auth_request(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.token {
            request.basic_auth("", Some(token.as_str()))
        } else {
            request
        }
    }

    /// `{org}/{project}/_apis/{path}`
    pub fn api_url(&self, project: &str, path: &str) -> Result<Url> {
        let mut url = self
            .org_url
            .join(&format!("{}/_apis/{path}", urlencoding::encode(project)))
            .map_err(|e| BuildLensError::Config(format!("Invalid API URL: {e}")))?;
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }

    /// Send a request and decode its JSON body, mapping HTTP failures to crate errors.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let request = self.auth_request(request);
        let response = request.send().await?;
        debug!("{} {} -> {}", what, response.url(), response.status());

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(BuildLensError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BuildLensError::Api(format!(
                "Failed to fetch {what}: {status} - {body}"
            )));
        }

        Ok(response.json::<T>().await?)
    }
}
