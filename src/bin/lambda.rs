//! AWS Lambda entry point for seatwatch
//!
//! Deploy with `cargo lambda build --release --features lambda` and attach a
//! scheduled trigger (for example `rate(1 minute)`).

use lambda_runtime::{Error as LambdaError, service_fn};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the AWS Lambda function.
#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    // `init` also installs the `log` bridge, so library records reach the JSON output
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("seatwatch Lambda starting...");
    lambda_runtime::run(service_fn(seatwatch::lambda::handler)).await
}
