use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use clap::Parser;

use server::caption::{Captioner, DisabledCaptioner, GeminiCaptioner};
use server::config::Config;
use server::handlers::root;
use server::server::spawn_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = Config::parse();

    let captioner: Arc<dyn Captioner> = match &config.gemini_api_key {
        Some(api_key) => Arc::new(GeminiCaptioner::new(
            api_key.clone(),
            config.caption_model.clone(),
            None,
        )),
        None => {
            log::warn!("GEMINI_API_KEY is not set; guesses will use the fallback answer");
            Arc::new(DisabledCaptioner)
        }
    };

    let srv_tx = spawn_server(captioner);
    let bind = (config.host.clone(), config.port);
    let config = web::Data::new(config);

    log::info!("Listening on {}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(web::Data::new(srv_tx.clone()))
            .app_data(config.clone())
            .configure(root)
    })
    .bind(bind)?
    .run()
    .await
}
