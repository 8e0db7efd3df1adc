use axum::{
    routing::{get, post, put},
    Router,
};
use log::{debug, info};
use simplelog::*;
use std::sync::Arc;

use gamehub::auth::JwtValidator;
use gamehub::config::Config;
use gamehub::controllers;
use gamehub::manager::GameManager;
use gamehub::store::GameStore;
use gamehub::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // set up logging facility
    let _ = SimpleLogger::init(config.log_level, simplelog::Config::default());
    info!("Starting..");
    debug!(
        "max games: {}, lock timeout: {:?}, reap every {:?} after {:?}",
        config.max_games, config.lock_timeout, config.reap_interval, config.reap_grace
    );

    let manager = GameManager::new(
        GameStore::new(config.max_games, config.lock_timeout),
        Arc::new(JwtValidator::new(&config.jwt_secret)),
    );
    let state = AppState::new(manager);

    // Finished games and games nobody joined are removed in the background
    let reaper = state.manager.clone();
    let (interval, grace) = (config.reap_interval, config.reap_grace);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            reaper.reap(grace).await;
        }
    });

    // Define routes
    let app = Router::new()
        .route("/games", post(controllers::game::create_game))
        .route("/games/search", post(controllers::game::list_games))
        .route("/games/leave", post(controllers::game::leave_all_games))
        .route("/games/:gid", get(controllers::game::get_game))
        .route("/games/:gid/join", post(controllers::game::join_game))
        .route("/games/:gid/leave", post(controllers::game::leave_game))
        .route("/games/:gid/move", put(controllers::game::put_move))
        .with_state(state);

    // Start the server
    info!("Listening on {}", config.listen_addr);
    axum::Server::bind(&config.listen_addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down..");
        })
        .await?;

    Ok(())
}
