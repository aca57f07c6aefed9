use crate::connection::ws_index;
use crate::handlers::config::client_config;
use actix_web::web;

mod config;

pub fn root(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws/").route(web::get().to(ws_index)));
    cfg.service(web::resource("/config").route(web::get().to(client_config)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::DisabledCaptioner;
    use crate::config::Config;
    use crate::server::spawn_server;
    use actix_web::{test, App};
    use clap::Parser;
    use std::sync::Arc;
    use system::serde_json::{json, Value};

    #[actix_web::test]
    async fn it_exposes_client_key() {
        let config = Config::try_parse_from(["whiteboard-server", "--client-key", "k-123"]).unwrap();
        let srv_tx = spawn_server(Arc::new(DisabledCaptioner));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(srv_tx))
                .app_data(web::Data::new(config))
                .configure(root),
        )
        .await;

        let req = test::TestRequest::get().uri("/config").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "clientKey": "k-123" }));
    }
}
