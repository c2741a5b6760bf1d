use lambda_runtime::Error;
use user_view::{run_view, WINS_VIEW};

#[tokio::main]
async fn main() -> Result<(), Error> {
    common::init_tracing();
    run_view(&WINS_VIEW).await
}
