mod builds;
mod core;
mod pull_requests;

pub use self::core::AzureDevOpsClient;
