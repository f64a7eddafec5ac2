use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    ao3_stats::app::run().await
}
