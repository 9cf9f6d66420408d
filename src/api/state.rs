use std::sync::Arc;

use crate::config::Config;
use crate::facade::Logbook;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub logbook: Arc<Logbook>,
}

impl AppState {
    pub fn new(config: Config, logbook: Logbook) -> Self {
        Self {
            config: Arc::new(config),
            logbook: Arc::new(logbook),
        }
    }
}
