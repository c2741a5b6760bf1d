use common::aws::{dynamodb_client, load_sdk_config};
use common::{DynamoStore, S3Objects};
use lambda_runtime::{run, service_fn, Error};
use signal_state::{function_handler, Config};
use tracing::error;

#[tokio::main]
async fn main() -> Result<(), Error> {
    common::init_tracing();

    let config = Config::from_env().map_err(|e| {
        error!("startup failed: {}", e);
        e
    })?;
    let sdk_config = load_sdk_config().await;
    let objects = S3Objects::new(aws_sdk_s3::Client::new(&sdk_config));
    let store = DynamoStore::new(dynamodb_client(&sdk_config), config.table_name);

    run(service_fn(|event| function_handler(&objects, &store, event))).await
}
