use actix_web::{web, App, HttpServer};
use clap::Parser;

use routegate::config::Settings;
use routegate::server::config_routes;
use routegate::util::{cors_config_from_env, init_tracing, AppState};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Loads .env before the settings read the environment.
    init_tracing();

    let settings = Settings::parse();
    tracing::info!("Starting routegate with {:?}", settings);

    let state = web::Data::new(AppState::from_settings(&settings)?);

    HttpServer::new(move || {
        App::new()
            .wrap(cors_config_from_env())
            .app_data(state.clone())
            .configure(config_routes)
    })
    .bind(&settings.bind_addr)?
    .run()
    .await?;

    Ok(())
}
