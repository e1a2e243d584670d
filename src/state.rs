use std::sync::Arc;

use crate::{config::AppConfig, db::OrmConn};

/// Everything a request handler needs, built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(orm: OrmConn, config: AppConfig) -> Self {
        Self {
            orm,
            config: Arc::new(config),
        }
    }
}
