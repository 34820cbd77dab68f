use std::sync::Arc;

use crate::engine::ReviewEngine;
use crate::users::UserDirectory;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReviewEngine>,
    pub users: Arc<UserDirectory>,
}

impl AppState {
    pub fn new(engine: Arc<ReviewEngine>) -> Self {
        let users = Arc::new(UserDirectory::new(
            engine.admin_store().clone(),
            engine.user_index().clone(),
        ));
        Self { engine, users }
    }
}
