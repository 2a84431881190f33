//! Single-slot access guard for non-reentrant models

use crate::error::SceneError;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::debug;

/// Owns a model handle and lets one caller use it at a time
pub struct ModelGate<M: ?Sized> {
    model: Arc<M>,
    slot: Semaphore,
}

impl<M: ?Sized> ModelGate<M> {
    pub fn new(model: Arc<M>) -> Self {
        Self {
            model,
            slot: Semaphore::new(1),
        }
    }

    /// Wait for the slot; the model is released when the guard drops
    pub async fn enter(&self) -> Result<GatedModel<'_, M>, SceneError> {
        let permit = self
            .slot
            .acquire()
            .await
            .map_err(|_| SceneError::Model("model gate closed".to_string()))?;
        debug!("Model gate entered");
        Ok(GatedModel {
            model: &*self.model,
            _permit: permit,
        })
    }

    /// Whether no caller currently holds the model
    pub fn is_idle(&self) -> bool {
        self.slot.available_permits() == 1
    }

    /// Refuse all future callers; current holders finish normally
    pub fn close(&self) {
        self.slot.close();
    }

    pub fn model(&self) -> &Arc<M> {
        &self.model
    }
}

/// Exclusive access to a gated model
pub struct GatedModel<'a, M: ?Sized> {
    model: &'a M,
    _permit: SemaphorePermit<'a>,
}

impl<M: ?Sized> fmt::Debug for GatedModel<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatedModel").finish_non_exhaustive()
    }
}

impl<M: ?Sized> Deref for GatedModel<'_, M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.model
    }
}
