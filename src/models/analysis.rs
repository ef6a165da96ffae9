use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Provider capability selected by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisType {
    #[serde(rename = "ai_vision_general")]
    General,
    #[serde(rename = "ai_vision_moderation")]
    Moderation,
    #[serde(rename = "ai_vision_tagging")]
    Tagging,
}

impl AnalysisType {
    /// Capability name used in the provider's endpoint path.
    pub fn capability(&self) -> &'static str {
        match self {
            AnalysisType::General => "ai_vision_general",
            AnalysisType::Moderation => "ai_vision_moderation",
            AnalysisType::Tagging => "ai_vision_tagging",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.capability())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownAnalysisType;

impl FromStr for AnalysisType {
    type Err = UnknownAnalysisType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ai_vision_general" | "general" => Ok(AnalysisType::General),
            "ai_vision_moderation" | "moderation" => Ok(AnalysisType::Moderation),
            "ai_vision_tagging" | "tagging" => Ok(AnalysisType::Tagging),
            _ => Err(UnknownAnalysisType),
        }
    }
}

/// A tag the provider should look for. Only these two fields ever reach the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDefinition {
    pub name: String,
    pub description: String,
}

/// Type-specific instructions of a validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisKind {
    General { prompts: Vec<String> },
    Moderation { prompts: Vec<String> },
    Tagging { tags: Vec<TagDefinition> },
}

/// A validated, normalized analysis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub image_url: String,
    pub kind: AnalysisKind,
    /// Kept for every type; only tagging forwards it.
    pub multi_label: Option<bool>,
}

impl AnalysisRequest {
    pub fn analysis_type(&self) -> AnalysisType {
        match self.kind {
            AnalysisKind::General { .. } => AnalysisType::General,
            AnalysisKind::Moderation { .. } => AnalysisType::Moderation,
            AnalysisKind::Tagging { .. } => AnalysisType::Tagging,
        }
    }
}
