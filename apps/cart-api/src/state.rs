//! Shared application state for the HTTP layer.

use merx_db::{CartMutator, Database};

/// State handed to every handler via axum's `State` extractor.
///
/// Both fields are cheap clones over the same pool.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub mutator: CartMutator,
}

impl AppState {
    /// Builds the state from a connected database handle.
    pub fn new(db: Database) -> Self {
        let mutator = CartMutator::new(db.clone());
        AppState { db, mutator }
    }
}
