use aws_sdk_timestreamwrite as tsw;
use lambda_runtime::{run, service_fn, Error};
use sensor_ingest::{function_handler, Config, TimestreamWriter};
use tracing::error;

#[tokio::main]
async fn main() -> Result<(), Error> {
    common::init_tracing();

    let config = Config::from_env().map_err(|e| {
        error!("startup failed: {}", e);
        e
    })?;
    let sdk_config = common::aws::load_sdk_config().await;
    // Timestream requires endpoint discovery; keep the endpoint refreshed in the background.
    let (client, reload) = tsw::Client::new(&sdk_config)
        .with_endpoint_discovery_enabled()
        .await?;
    tokio::spawn(reload.reload_task());
    let writer = TimestreamWriter::new(client);

    run(service_fn(|event| function_handler(&writer, &config, event))).await
}
