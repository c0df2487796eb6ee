mod client;

pub use client::AzureDevOpsClient;
