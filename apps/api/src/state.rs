//! Shared handler state.

use retail_db::Database;

/// Cloned into every handler; the pool inside `Database` is reference counted.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        AppState { db }
    }
}
