use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod controllers;
pub mod errors;
pub mod manager;
pub mod models;
pub mod registry;
pub mod store;

use crate::manager::GameManager;

// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<GameManager>,
}

impl AppState {
    pub fn new(manager: GameManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }
}
