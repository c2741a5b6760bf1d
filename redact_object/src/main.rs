use lambda_runtime::{run, service_fn, Error};
use redact_object::{function_handler, Config, S3Gateway};
use tracing::error;

#[tokio::main]
async fn main() -> Result<(), Error> {
    common::init_tracing();

    let config = Config::from_env().map_err(|e| {
        error!("startup failed: {}", e);
        e
    })?;
    let sdk_config = common::aws::load_sdk_config().await;
    let gateway = S3Gateway::new(aws_sdk_s3::Client::new(&sdk_config));

    run(service_fn(|event| function_handler(&gateway, &config, event))).await
}
