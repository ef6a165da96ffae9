use serde::Serialize;
use serde_with::skip_serializing_none;

use super::analysis::TagDefinition;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadSource {
    pub uri: String,
}

/// Body sent to the vision provider.
///
/// Exactly one of `prompts`, `rejection_questions`, `tag_definitions` is set.
/// Absent fields are omitted from the JSON entirely. Built only through the
/// constructors below and never mutated afterwards.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderPayload {
    source: PayloadSource,
    prompts: Option<Vec<String>>,
    rejection_questions: Option<Vec<String>>,
    tag_definitions: Option<Vec<TagDefinition>>,
    multi_label: Option<bool>,
}

impl ProviderPayload {
    fn with_source(uri: &str) -> Self {
        Self {
            source: PayloadSource { uri: uri.to_string() },
            prompts: None,
            rejection_questions: None,
            tag_definitions: None,
            multi_label: None,
        }
    }

    pub fn general(uri: &str, prompts: Vec<String>) -> Self {
        Self {
            prompts: Some(prompts),
            ..Self::with_source(uri)
        }
    }

    pub fn moderation(uri: &str, rejection_questions: Vec<String>) -> Self {
        Self {
            rejection_questions: Some(rejection_questions),
            ..Self::with_source(uri)
        }
    }

    pub fn tagging(uri: &str, tag_definitions: Vec<TagDefinition>, multi_label: Option<bool>) -> Self {
        Self {
            tag_definitions: Some(tag_definitions),
            multi_label,
            ..Self::with_source(uri)
        }
    }

    pub fn prompts(&self) -> Option<&[String]> {
        self.prompts.as_deref()
    }

    pub fn rejection_questions(&self) -> Option<&[String]> {
        self.rejection_questions.as_deref()
    }

    pub fn tag_definitions(&self) -> Option<&[TagDefinition]> {
        self.tag_definitions.as_deref()
    }

    pub fn multi_label(&self) -> Option<bool> {
        self.multi_label
    }
}
