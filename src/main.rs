use cardano_index::config::Settings;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let settings = Settings::parse();
    cardano_index::run(settings).await?;
    Ok(())
}
