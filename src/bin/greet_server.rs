use anyhow::Result;
use course::tracing_conf;
use course_config::CONFIG;
use course_grpc_server::GreetServiceGrpc;
use dotenv::dotenv;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let _guard = tracing_conf::init_tracing()?;

    GreetServiceGrpc::run_server(CONFIG.greet.clone()).await?;

    info!("End of Program");
    Ok(())
}
