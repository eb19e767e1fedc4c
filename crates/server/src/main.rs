use server::{start_server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pull in a local .env for development; absence is fine.
    dotenvy::dotenv().ok();

    let config = ServerConfig::load()?;
    start_server(config).await
}
