use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_dynamodb as ddb;
use std::env;

const DYNAMODB_ENDPOINT: &str = "DYNAMODB_ENDPOINT";

/// Loads the shared SDK configuration once per process.
pub async fn load_sdk_config() -> SdkConfig {
    let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
    aws_config::defaults(BehaviorVersion::latest())
        .region(region_provider)
        .load()
        .await
}

/// Builds a DynamoDB client, pointing it at `DYNAMODB_ENDPOINT` when set (local testing).
pub fn dynamodb_client(config: &SdkConfig) -> ddb::Client {
    let ddb_config = match env::var(DYNAMODB_ENDPOINT) {
        Ok(endpoint) => ddb::config::Builder::from(config).endpoint_url(endpoint).build(),
        _ => ddb::config::Builder::from(config).build()
    };
    ddb::Client::from_conf(ddb_config)
}
