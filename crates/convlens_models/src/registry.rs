//! Model registry for dynamic model creation.
//!
//! The registry allows creating models dynamically by name from JSON
//! configuration, which is how the UI instantiates whichever architecture the
//! loaded weights describe.
//!
//! # Example
//!
//! ```rust,ignore
//! use convlens_models::registry::default_registry;
//! use serde_json::json;
//!
//! let registry = default_registry::<NdArray>();
//! let config = json!({ "n_classes": 1000, "input_size": 224 });
//! let model = registry.create("MobileNetV2Small", &config, &device)?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use burn::prelude::*;
use serde_json::Value;
use thiserror::Error;

use convlens_core::SpatialModel;

use crate::{MobileNetV2SmallConfig, SmallCnnConfig};

/// Error type for model registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Model not found in registry.
    #[error("Model '{0}' not found in registry")]
    ModelNotFound(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Type alias for model constructor.
pub type ModelConstructor<B> = Arc<
    dyn Fn(&Value, &<B as Backend>::Device) -> Result<Box<dyn SpatialModel<B>>> + Send + Sync,
>;

/// Registry for dynamically creating models by name.
pub struct ModelRegistry<B: Backend> {
    models: HashMap<String, ModelConstructor<B>>,
}

impl<B: Backend> Default for ModelRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> ModelRegistry<B> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    /// Register a model constructor.
    ///
    /// # Arguments
    ///
    /// * `name` - The name to register the model under
    /// * `constructor` - A function that creates the model from config
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&Value, &<B as Backend>::Device) -> Result<Box<dyn SpatialModel<B>>>
            + Send
            + Sync
            + 'static,
    {
        self.models.insert(name.to_string(), Arc::new(constructor));
    }

    /// Create a model by name.
    ///
    /// # Arguments
    ///
    /// * `name` - The registered name of the model
    /// * `config` - JSON configuration for the model
    /// * `device` - The device to create the model on
    pub fn create(
        &self,
        name: &str,
        config: &Value,
        device: &<B as Backend>::Device,
    ) -> Result<Box<dyn SpatialModel<B>>> {
        let constructor = self
            .models
            .get(name)
            .ok_or_else(|| RegistryError::ModelNotFound(name.to_string()))?;
        constructor(config, device)
    }

    /// List all registered model names.
    pub fn list(&self) -> Vec<&str> {
        self.models.keys().map(|s| s.as_str()).collect()
    }

    /// Check if a model is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }
}

fn get_usize(config: &Value, key: &str) -> Result<usize> {
    config
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| RegistryError::InvalidConfig(format!("Missing or invalid '{}'", key)))
}

fn get_usize_or(config: &Value, key: &str, default: usize) -> usize {
    config
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(default)
}

/// Create a registry with all available models pre-registered.
///
/// # Available Models
///
/// - `MobileNetV2Small` - compact MobileNetV2-style network
/// - `SmallCnn` - minimal two-convolution network
///
/// All models require `n_classes`; `input_size` is optional.
pub fn default_registry<B: Backend>() -> ModelRegistry<B> {
    let mut registry = ModelRegistry::new();

    registry.register("MobileNetV2Small", |config, device| {
        let n_classes = get_usize(config, "n_classes")?;

        let model_config = MobileNetV2SmallConfig::new(n_classes)
            .with_input_size(get_usize_or(config, "input_size", 224))
            .with_expansion(get_usize_or(config, "expansion", 6));

        Ok(Box::new(model_config.init::<B>(device)) as Box<dyn SpatialModel<B>>)
    });

    registry.register("SmallCnn", |config, device| {
        let n_classes = get_usize(config, "n_classes")?;

        let model_config = SmallCnnConfig::new(n_classes)
            .with_input_size(get_usize_or(config, "input_size", 32));

        Ok(Box::new(model_config.init::<B>(device)) as Box<dyn SpatialModel<B>>)
    });

    registry
}
