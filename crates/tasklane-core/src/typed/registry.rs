//! HandlerRegistry - task_type → ハンドラ
//!
//! 起動時に組み立て（mutable）、実行中は読み取り専用で共有する。
//! 未登録の task_type は fallback（既定は `GenericHandler`）に回す。

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{Handler, TaskHandler, TypedHandler};
use super::task::TaskParams;
use crate::handlers::GenericHandler;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Handler for task type '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("task type must not be empty")]
    EmptyTaskType,
}

pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    fallback: Arc<dyn TaskHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: Arc::new(GenericHandler::default()),
        }
    }

    pub fn register<T: TaskParams, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        self.register_dyn(T::TYPE, Arc::new(TypedHandler::new(handler)))
    }

    /// Register an untyped handler under `task_type`.
    pub fn register_dyn(
        &mut self,
        task_type: &str,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<(), RegistryError> {
        if task_type.is_empty() {
            return Err(RegistryError::EmptyTaskType);
        }
        if self.handlers.contains_key(task_type) {
            return Err(RegistryError::AlreadyRegistered(task_type.to_string()));
        }
        self.handlers.insert(task_type.to_string(), handler);
        Ok(())
    }

    pub fn set_fallback(&mut self, handler: Arc<dyn TaskHandler>) {
        self.fallback = handler;
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(task_type).cloned()
    }

    /// Registered handler, or the fallback.
    pub fn resolve(&self, task_type: &str) -> Arc<dyn TaskHandler> {
        self.get(task_type)
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    /// Sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
