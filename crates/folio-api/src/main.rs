use folio_api::setup;
use folio_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (telemetry, database, storage, services, routes)
    let app = setup::initialize_app(config.clone()).await?;

    // Start the server; background tasks stop once it returns
    setup::server::start_server(&config, app.router).await?;
    app.background.shutdown();

    Ok(())
}
