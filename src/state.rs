use crate::{config::Config, database::Database};
use std::{collections::BTreeSet, sync::Arc};

/// Application state shared across all HTTP handlers
///
/// Holds the database handle and the set of tables the record endpoints may
/// touch. Handlers create one [`crate::database::DbContext`] per request from
/// `db`.
#[derive(Clone)]
pub struct AppState {
    /// Shared connection pool handle
    pub db: Database,
    /// Tables reachable through `/api/v1/records/{table}`
    pub exposed_tables: Arc<BTreeSet<String>>,
    /// Loaded application config
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        let exposed_tables = config.server.exposed_tables().into_iter().collect();
        Self {
            db,
            exposed_tables: Arc::new(exposed_tables),
            config: Arc::new(config),
        }
    }

    /// Whether `table` is served by the record endpoints.
    pub fn is_exposed(&self, table: &str) -> bool {
        self.exposed_tables.contains(table)
    }
}
