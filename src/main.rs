use anyhow::Result;
use idea2short::core::config::Config;
use idea2short::services::orchestrator::Orchestrator;
use idea2short::services::setup;
use idea2short::ui::App;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            eprintln!("Fix or remove 'config.yml' and try again.");
            return Err(e);
        }
    };

    config.ensure_directories()?;

    setup::run_setup(&mut config)?;

    let orchestrator = match Orchestrator::from_config(&config) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Err(e.into());
        }
    };

    let mut app = App::new(config, orchestrator);
    app.run().await?;

    Ok(())
}
