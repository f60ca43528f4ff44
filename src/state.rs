use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::cache::BookingCache;
use crate::config::AppConfig;
use crate::services::changes::ChangeEvent;
use crate::services::verification::{BookingVerifier, SqliteBackend, VerifierSettings};

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub cache: Arc<BookingCache>,
    pub verifier: BookingVerifier,
    pub changes_tx: broadcast::Sender<ChangeEvent>,
}

impl AppState {
    pub fn new(conn: Connection, config: AppConfig) -> Self {
        let db = Arc::new(Mutex::new(conn));
        let cache = Arc::new(BookingCache::new());
        let verifier = BookingVerifier::new(
            Arc::new(SqliteBackend::new(db.clone())),
            cache.clone(),
            VerifierSettings::from_config(&config),
        );
        let (changes_tx, _) = broadcast::channel(256);

        Self {
            db,
            config,
            cache,
            verifier,
            changes_tx,
        }
    }
}
