use crate::engine::SearchEngine;
use actix_web::{get, web, App, HttpServer, Responder};
use anyhow::Result;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
    start: usize,
}

#[get("/api")]
async fn search_api(
    engine: web::Data<SearchEngine>,
    params: web::Query<SearchParams>,
) -> impl Responder {
    web::Json(engine.search(&params.query, params.start))
}

/// Blocking HTTP front for the query engine: a single GET endpoint taking
/// `query` and `start`, returning one 20-result page as JSON.
pub fn serve(engine: SearchEngine, port: u16) -> Result<()> {
    let data = web::Data::new(engine);
    info!("serving queries on port {port}");
    actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || App::new().app_data(data.clone()).service(search_api))
            .bind(("0.0.0.0", port))?
            .run()
            .await
    })?;
    Ok(())
}
