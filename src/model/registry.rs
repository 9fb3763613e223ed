//! Process-wide model registry.
//!
//! Models are expensive to construct, so they are built once and shared by
//! every run. The lifecycle is explicit:
//!
//! 1. [`initialize`] (or [`initialize_from_config`]) before the first run;
//! 2. any number of runs, each taking a [`current`] snapshot up front so a
//!    run never observes a registry change halfway through;
//! 3. [`shutdown`] at process exit, which drops the registry's reference.
//!    Runs still holding a snapshot finish with the models they started with.

use crate::config::ProcessingConfig;
use crate::error::ProcessingError;
use crate::model::vlm;
use crate::model::ModelSet;
use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};
use tracing::info;

static REGISTRY: Lazy<RwLock<Option<Arc<ModelSet>>>> = Lazy::new(|| RwLock::new(None));

/// Install `models` as the process-wide model set.
///
/// # Errors
/// [`ProcessingError::RegistryAlreadyInitialized`] if a set is installed.
pub fn initialize(models: ModelSet) -> Result<Arc<ModelSet>, ProcessingError> {
    let mut guard = REGISTRY
        .write()
        .map_err(|_| ProcessingError::Internal("model registry lock poisoned".into()))?;
    if guard.is_some() {
        return Err(ProcessingError::RegistryAlreadyInitialized);
    }
    let models = Arc::new(models);
    info!("Model registry initialised: {:?}", models);
    *guard = Some(Arc::clone(&models));
    Ok(models)
}

/// Build the VLM-backed model set described by `config` and install it.
pub fn initialize_from_config(config: &ProcessingConfig) -> Result<Arc<ModelSet>, ProcessingError> {
    let models = vlm::build_model_set(config)?;
    initialize(models)
}

/// Snapshot of the installed model set.
pub fn current() -> Result<Arc<ModelSet>, ProcessingError> {
    REGISTRY
        .read()
        .map_err(|_| ProcessingError::Internal("model registry lock poisoned".into()))?
        .as_ref()
        .map(Arc::clone)
        .ok_or(ProcessingError::RegistryNotInitialized)
}

/// Whether a model set is installed.
pub fn is_initialized() -> bool {
    REGISTRY.read().map(|g| g.is_some()).unwrap_or(false)
}

/// Drop the installed model set. Returns whether one was installed.
pub fn shutdown() -> bool {
    match REGISTRY.write() {
        Ok(mut guard) => {
            let was = guard.take().is_some();
            if was {
                info!("Model registry shut down");
            }
            was
        }
        Err(_) => false,
    }
}
