//! Application state shared by handlers

use folio_services::FileReplaceService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub replace_service: Arc<FileReplaceService>,
}

impl AppState {
    pub fn new(replace_service: FileReplaceService) -> Self {
        Self {
            replace_service: Arc::new(replace_service),
        }
    }
}
