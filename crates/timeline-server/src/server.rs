use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::io;

use crate::config::ServerConfig;
use crate::handlers;
use crate::state::AppState;

/// Registers the `/api/v1` routes. Shared by the binary and the tests.
pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health::handler))
            .route("/sessions", web::post().to(handlers::sessions::create))
            .route(
                "/sessions/{session_id}",
                web::get().to(handlers::sessions::get),
            )
            .route(
                "/sessions/{session_id}",
                web::delete().to(handlers::sessions::delete),
            )
            .route(
                "/sessions/{session_id}/reset",
                web::post().to(handlers::sessions::reset),
            )
            .route(
                "/sessions/{session_id}/system-prompt",
                web::put().to(handlers::sessions::update_system_prompt),
            )
            .route(
                "/sessions/{session_id}/nodes",
                web::post().to(handlers::nodes::append),
            )
            .route(
                "/sessions/{session_id}/nodes/{node_id}",
                web::get().to(handlers::nodes::lookup),
            )
            .route(
                "/sessions/{session_id}/nodes/{node_id}/transcript",
                web::get().to(handlers::nodes::transcript),
            )
            .route(
                "/sessions/{session_id}/branches",
                web::post().to(handlers::nodes::branch),
            )
            .route(
                "/sessions/{session_id}/merges",
                web::post().to(handlers::nodes::merge),
            )
            .route(
                "/sessions/{session_id}/layout",
                web::get().to(handlers::nodes::layout),
            )
            .route(
                "/sessions/{session_id}/navigate",
                web::post().to(handlers::navigation::navigate),
            )
            .route(
                "/sessions/{session_id}/jump",
                web::post().to(handlers::navigation::jump),
            )
            .route(
                "/sessions/{session_id}/back",
                web::post().to(handlers::navigation::back),
            )
            .route(
                "/sessions/{session_id}/turns",
                web::post().to(handlers::turns::submit),
            )
            .route(
                "/sessions/{session_id}/turns/stop",
                web::post().to(handlers::turns::stop),
            )
            .route(
                "/sessions/{session_id}/turns/state",
                web::get().to(handlers::turns::turn_state),
            ),
    );
}

pub async fn run_server(config: ServerConfig, port: u16) -> io::Result<()> {
    let state = web::Data::new(AppState::new(&config).await?);

    log::info!("Listening on 0.0.0.0:{}", port);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .configure(app_config)
    })
    .bind(format!("0.0.0.0:{}", port))?
    .run()
    .await
}
