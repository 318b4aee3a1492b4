//! Skill feature registry for the Aria automation engine
//!
//! Skills are external units of functionality (weather, news, calendar)
//! invoked by feature name. The automation core treats them as opaque:
//! it hands over a feature name and arguments and gets back a value or
//! a typed error. Features are registered explicitly at startup; there
//! is no runtime discovery.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from skill feature dispatch
///
/// Callers branch on the kind: an unimplemented feature is a normal,
/// user-visible outcome ("I don't know how to do that"), never a crash.
#[derive(Debug, Clone, Error)]
pub enum SkillError {
    #[error("feature '{0}' has not been implemented")]
    NotImplemented(String),

    #[error("feature '{feature}' failed: {reason}")]
    Failed { feature: String, reason: String },
}

/// Result type for skill feature calls
pub type SkillResult = Result<serde_json::Value, SkillError>;

/// Handler function for a skill feature
pub type FeatureHandler = Arc<dyn Fn(&serde_json::Value) -> SkillResult + Send + Sync>;

/// Information about a registered feature
#[derive(Debug, Clone)]
pub struct FeatureDescription {
    /// Skill the feature belongs to (e.g., "weather")
    pub skill: String,
    /// Feature name (e.g., "current_weather")
    pub feature: String,
}

struct RegisteredFeature {
    handler: FeatureHandler,
    description: FeatureDescription,
}

/// The skill registry maps feature names to their handlers
///
/// Feature names are globally unique across skills, matching how the
/// assistant's intent layer resolves a recognized intent to a feature.
pub struct SkillRegistry {
    features: DashMap<String, RegisteredFeature>,
}

impl SkillRegistry {
    /// Create a new empty skill registry
    pub fn new() -> Self {
        Self {
            features: DashMap::new(),
        }
    }

    /// Register a feature handler under a skill
    ///
    /// Re-registering a feature name replaces the previous handler.
    pub fn register(
        &self,
        skill: impl Into<String>,
        feature: impl Into<String>,
        handler: impl Fn(&serde_json::Value) -> SkillResult + Send + Sync + 'static,
    ) {
        let skill = skill.into();
        let feature = feature.into();
        debug!(skill = %skill, feature = %feature, "Registering skill feature");

        self.features.insert(
            feature.clone(),
            RegisteredFeature {
                handler: Arc::new(handler),
                description: FeatureDescription { skill, feature },
            },
        );
    }

    /// Call a feature by name
    ///
    /// Fails with [`SkillError::NotImplemented`] when no such feature is
    /// registered; handler failures come back as [`SkillError::Failed`].
    pub fn call_feature(&self, feature: &str, args: &serde_json::Value) -> SkillResult {
        let Some(registered) = self.features.get(feature) else {
            warn!(feature = %feature, "Feature not implemented");
            return Err(SkillError::NotImplemented(feature.to_string()));
        };

        debug!(
            skill = %registered.description.skill,
            feature = %feature,
            "Calling skill feature"
        );

        let handler = Arc::clone(&registered.handler);
        drop(registered); // Release the shard lock before running the handler

        handler(args)
    }

    /// Check whether a feature is registered
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains_key(feature)
    }

    /// Look up which skill a feature is registered under
    pub fn describe(&self, feature: &str) -> Option<FeatureDescription> {
        self.features.get(feature).map(|f| f.description.clone())
    }

    /// All features of one skill
    pub fn skill_features(&self, skill: &str) -> Vec<FeatureDescription> {
        self.features
            .iter()
            .filter(|f| f.description.skill == skill)
            .map(|f| f.description.clone())
            .collect()
    }

    /// All registered features grouped by skill
    ///
    /// This is the mapping the assistant exposes to its intent layer so
    /// it knows which features exist.
    pub fn skill_mapping(&self) -> HashMap<String, Vec<String>> {
        let mut result: HashMap<String, Vec<String>> = HashMap::new();
        for entry in self.features.iter() {
            result
                .entry(entry.description.skill.clone())
                .or_default()
                .push(entry.description.feature.clone());
        }
        for features in result.values_mut() {
            features.sort();
        }
        result
    }

    /// Remove a feature registration
    pub fn unregister(&self, feature: &str) -> bool {
        let removed = self.features.remove(feature).is_some();
        if removed {
            debug!(feature = %feature, "Unregistered skill feature");
        }
        removed
    }

    /// Total number of registered features
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for SkillRegistry
pub type SharedSkillRegistry = Arc<SkillRegistry>;
