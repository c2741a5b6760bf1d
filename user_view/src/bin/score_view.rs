use lambda_runtime::Error;
use user_view::{run_view, SCORE_VIEW};

#[tokio::main]
async fn main() -> Result<(), Error> {
    common::init_tracing();
    run_view(&SCORE_VIEW).await
}
