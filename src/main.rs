use actix_web::{web, App, HttpServer};
use contact_relay::{configure, Config, ContactService};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let service = web::Data::new(ContactService::from_config(&config).await?);

    log::info!("Contact relay listening on {}", config.bind_addr);
    HttpServer::new(move || App::new().app_data(service.clone()).configure(configure))
        .bind(&config.bind_addr)?
        .run()
        .await?;
    Ok(())
}
