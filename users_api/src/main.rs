use common::aws::{dynamodb_client, load_sdk_config};
use common::DynamoStore;
use lambda_http::{run, service_fn, Error, Request};
use tracing::error;
use users_api::{function_handler, Config};

#[tokio::main]
async fn main() -> Result<(), Error> {
    common::init_tracing();

    let config = Config::from_env().map_err(|e| {
        error!("startup failed: {}", e);
        e
    })?;
    let sdk_config = load_sdk_config().await;
    let store = DynamoStore::new(dynamodb_client(&sdk_config), config.table_name);

    run(service_fn(|event: Request| function_handler(&store, event))).await
}
