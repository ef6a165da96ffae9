//! Compatibility table for the query-string `/analyze-image` endpoint.
//!
//! Older integrations send an opaque `appKey` instead of structured analysis
//! parameters. Each key maps to one fixed configuration. Adding a key is a
//! code change and a deployment.

use serde_json::{Value, json};

use crate::error::AppError;
use crate::models::{AnalysisKind, AnalysisRequest, AnalysisType, TagDefinition};

/// A canned analysis configuration bound to a legacy key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyConfig {
    General(&'static [&'static str]),
    Moderation(&'static [&'static str]),
    Tagging(&'static [(&'static str, &'static str)]),
}

struct LegacyKeyEntry {
    key: &'static str,
    config: LegacyConfig,
}

static LEGACY_KEYS: [LegacyKeyEntry; 3] = [
    LegacyKeyEntry {
        key: "fGr3Ase",
        config: LegacyConfig::Tagging(&[
            ("person", "Does the image contain one or more people?"),
            ("product", "Does the image show a commercial product?"),
        ]),
    },
    LegacyKeyEntry {
        key: "kT9xWq2",
        config: LegacyConfig::General(&[
            "Describe this image in detail.",
            "What is the main subject of this image?",
        ]),
    },
    LegacyKeyEntry {
        key: "mZ4pLr8",
        config: LegacyConfig::Moderation(&[
            "Does the image contain nudity or sexual content?",
            "Does the image contain violence or weapons?",
        ]),
    },
];

/// Looks up the configuration for a legacy key.
pub fn resolve_legacy_key(app_key: &str) -> Result<LegacyConfig, AppError> {
    LEGACY_KEYS
        .iter()
        .find(|entry| entry.key == app_key)
        .map(|entry| entry.config)
        .ok_or(AppError::InvalidAppKey)
}

impl LegacyConfig {
    pub fn analysis_type(&self) -> AnalysisType {
        match self {
            LegacyConfig::General(_) => AnalysisType::General,
            LegacyConfig::Moderation(_) => AnalysisType::Moderation,
            LegacyConfig::Tagging(_) => AnalysisType::Tagging,
        }
    }

    /// Builds the request this configuration stands for, against `image_url`.
    /// The URL must already be validated.
    pub fn to_request(&self, image_url: &str) -> AnalysisRequest {
        let kind = match *self {
            LegacyConfig::General(prompts) => AnalysisKind::General {
                prompts: owned_prompts(prompts),
            },
            LegacyConfig::Moderation(prompts) => AnalysisKind::Moderation {
                prompts: owned_prompts(prompts),
            },
            LegacyConfig::Tagging(tags) => AnalysisKind::Tagging {
                tags: owned_tags(tags),
            },
        };

        AnalysisRequest {
            image_url: image_url.to_string(),
            kind,
            multi_label: None,
        }
    }

    /// The configuration as echoed back to legacy callers.
    pub fn echo(&self) -> Value {
        match *self {
            LegacyConfig::General(prompts) | LegacyConfig::Moderation(prompts) => json!(prompts),
            LegacyConfig::Tagging(tags) => json!(owned_tags(tags)),
        }
    }
}

fn owned_prompts(prompts: &[&str]) -> Vec<String> {
    prompts.iter().map(|prompt| prompt.to_string()).collect()
}

fn owned_tags(tags: &[(&str, &str)]) -> Vec<TagDefinition> {
    tags.iter()
        .map(|(name, description)| TagDefinition {
            name: name.to_string(),
            description: description.to_string(),
        })
        .collect()
}
