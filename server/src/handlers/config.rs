use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use crate::config::Config;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    client_key: Option<String>,
}

pub async fn client_config(config: web::Data<Config>) -> impl Responder {
    HttpResponse::Ok().json(ClientConfig {
        client_key: config.client_key.clone(),
    })
}
