use std::path::PathBuf;
use std::sync::Arc;

use crate::jobs::JobRunner;
use crate::pipeline::ModelCache;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ModelCache>,
    pub jobs: JobRunner,
    pub static_dir: PathBuf,
}
