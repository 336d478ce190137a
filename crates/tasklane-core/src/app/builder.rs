//! ProcessorBuilder - Processor の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - `expect_tasks()` で期待される task_type を宣言
//! - `build()` 時に「期待集合 ⊆ 登録済み集合」と設定の妥当性をチェック
//! - 不足があれば BuildError を返す（起動後に GenericHandler へ黙って落ちない）

use std::sync::Arc;

use crate::config::{ConfigError, ProcessorConfig};
use crate::impls::InMemoryTaskStore;
use crate::ports::{Clock, IdGenerator, SystemClock, TaskStore, UlidGenerator};
use crate::typed::{Handler, HandlerRegistry, RegistryError, TaskHandler, TaskParams};

use super::engine::Engine;
use super::processor::Processor;

/// ```ignore
/// let processor = ProcessorBuilder::new()
///     .store(Arc::new(JsonFileTaskStore::open("tasks.json").await?))
///     .register::<ResizeImage, _>(ResizeImageHandler)?
///     .expect_tasks(&["resize_image"])
///     .build()?;
/// ```
pub struct ProcessorBuilder {
    registry: HandlerRegistry,
    expected_tasks: Option<Vec<String>>,
    store: Option<Arc<dyn TaskStore>>,
    config: ProcessorConfig,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing task types: {0:?}. These tasks were expected but not registered.")]
    MissingTaskTypes(Vec<String>),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ProcessorBuilder {
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            expected_tasks: None,
            store: None,
            config: ProcessorConfig::default(),
            clock: None,
            ids: None,
        }
    }

    pub fn register<T: TaskParams, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<T, H>(handler)?;
        Ok(self)
    }

    pub fn register_dyn(
        mut self,
        task_type: &str,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<Self, RegistryError> {
        self.registry.register_dyn(task_type, handler)?;
        Ok(self)
    }

    /// Handler for task types nobody registered. Defaults to `GenericHandler`.
    pub fn fallback(mut self, handler: Arc<dyn TaskHandler>) -> Self {
        self.registry.set_fallback(handler);
        self
    }

    /// Defaults to an `InMemoryTaskStore`.
    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn expect_tasks(mut self, task_types: &[&str]) -> Self {
        self.expected_tasks = Some(task_types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<Processor, BuildError> {
        if let Some(expected_tasks) = &self.expected_tasks {
            let registered_types = self.registry.registered_types();
            let missing_tasks: Vec<String> = expected_tasks
                .iter()
                .filter(|t| !registered_types.contains(t))
                .cloned()
                .collect();
            if !missing_tasks.is_empty() {
                return Err(BuildError::MissingTaskTypes(missing_tasks));
            }
        }
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))) as Arc<dyn IdGenerator>);
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryTaskStore::new()) as Arc<dyn TaskStore>);

        Ok(Processor::from_engine(Engine::new(
            store,
            self.registry,
            clock,
            ids,
            self.config,
        )))
    }
}

impl Default for ProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::handler::fixtures::{EchoHandler, GreetingHandler};
    use crate::typed::task::fixtures::{Echo, Greeting};

    #[test]
    fn build_success() {
        let processor = ProcessorBuilder::new()
            .register::<Echo, _>(EchoHandler)
            .unwrap()
            .expect_tasks(&[Echo::TYPE])
            .build();
        assert!(processor.is_ok());
    }

    #[test]
    fn build_missing_task_types() {
        let processor = ProcessorBuilder::new()
            .register::<Echo, _>(EchoHandler)
            .unwrap()
            .expect_tasks(&[Echo::TYPE, Greeting::TYPE])
            .build();
        assert!(matches!(
            processor,
            Err(BuildError::MissingTaskTypes(missing)) if missing == vec![Greeting::TYPE.to_string()]
        ));
    }

    #[test]
    fn build_without_expectations() {
        let processor = ProcessorBuilder::new()
            .register::<Greeting, _>(GreetingHandler)
            .unwrap()
            .build();
        assert!(processor.is_ok());
    }

    #[test]
    fn invalid_config_fails_the_build() {
        let processor = ProcessorBuilder::new()
            .config(ProcessorConfig {
                max_workers: 0,
                ..ProcessorConfig::default()
            })
            .build();
        assert!(matches!(processor, Err(BuildError::Config(_))));
    }
}
