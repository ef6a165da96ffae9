//! Schema validation for incoming analysis requests.
//!
//! Both JSON dialects (`/analyze` and `/batch-analyze`) are validated here and
//! normalized into an [`AnalysisRequest`]. Validation stops at the first
//! problem and reports it as a single field-specific `AppError::Validation`.

use serde_json::{Map, Value};

use crate::error::AppError;
use crate::models::{AnalysisKind, AnalysisRequest, AnalysisType, TagDefinition};
use crate::utils::url_safety::validate_image_url;

pub const MAX_PROMPTS: usize = 10;
pub const MAX_PROMPT_CHARS: usize = 1000;
pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_NAME_CHARS: usize = 100;
pub const MAX_TAG_DESCRIPTION_CHARS: usize = 500;

const INVALID_ANALYSIS_TYPE: &str =
    "Invalid analysis type. Must be one of: ai_vision_general, ai_vision_moderation, ai_vision_tagging";

/// Field naming convention of a request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyDialect {
    /// `/analyze`: `imageUrl`, `analysis_type`, `prompts`, `tags`, `multi_label`.
    Analyze,
    /// `/batch-analyze`: `imageUrl`, `analysisType`, `analysisData`, `multiLabel`.
    Batch,
}

struct FieldNames {
    image_url: &'static str,
    analysis_type: &'static str,
    prompts: &'static str,
    tags: &'static str,
    multi_label: &'static str,
}

impl BodyDialect {
    fn fields(&self) -> FieldNames {
        match self {
            BodyDialect::Analyze => FieldNames {
                image_url: "imageUrl",
                analysis_type: "analysis_type",
                prompts: "prompts",
                tags: "tags",
                multi_label: "multi_label",
            },
            BodyDialect::Batch => FieldNames {
                image_url: "imageUrl",
                analysis_type: "analysisType",
                prompts: "analysisData",
                tags: "analysisData",
                multi_label: "multiLabel",
            },
        }
    }
}

/// Validates a raw JSON body and returns the normalized request.
pub fn validate_analysis_request(body: &Value, dialect: BodyDialect) -> Result<AnalysisRequest, AppError> {
    let fields = dialect.fields();
    let object = body
        .as_object()
        .ok_or_else(|| AppError::Validation("Request body must be a JSON object".to_string()))?;

    let image_url = match present(object, fields.image_url) {
        None => return Err(required(fields.image_url)),
        Some(Value::String(raw)) => {
            validate_image_url(raw, fields.image_url)?;
            raw.trim().to_string()
        }
        Some(_) => {
            return Err(AppError::Validation(format!("{} must be a string", fields.image_url)));
        }
    };

    let analysis_type = match present(object, fields.analysis_type) {
        None => return Err(required(fields.analysis_type)),
        Some(value) => value
            .as_str()
            .and_then(|raw| raw.parse::<AnalysisType>().ok())
            .ok_or_else(|| AppError::Validation(INVALID_ANALYSIS_TYPE.to_string()))?,
    };

    let kind = match analysis_type {
        AnalysisType::General => AnalysisKind::General {
            prompts: validate_prompts(present(object, fields.prompts), fields.prompts, analysis_type)?,
        },
        AnalysisType::Moderation => AnalysisKind::Moderation {
            prompts: validate_prompts(present(object, fields.prompts), fields.prompts, analysis_type)?,
        },
        AnalysisType::Tagging => AnalysisKind::Tagging {
            tags: validate_tags(present(object, fields.tags), fields.tags)?,
        },
    };

    // Only tagging reads the flag; other types carry a boolean along untouched
    // and ignore anything else.
    let multi_label = match present(object, fields.multi_label) {
        None => None,
        Some(Value::Bool(flag)) => Some(*flag),
        Some(_) if analysis_type != AnalysisType::Tagging => None,
        Some(_) => {
            return Err(AppError::Validation(format!("{} must be a boolean", fields.multi_label)));
        }
    };

    Ok(AnalysisRequest {
        image_url,
        kind,
        multi_label,
    })
}

/// Returns the field value, treating an explicit `null` as absent.
fn present<'a>(object: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    object.get(field).filter(|value| !value.is_null())
}

fn required(field: &str) -> AppError {
    AppError::Validation(format!("{} is required", field))
}

fn validate_prompts(
    value: Option<&Value>,
    field: &str,
    analysis_type: AnalysisType,
) -> Result<Vec<String>, AppError> {
    let items = match value {
        None => {
            return Err(AppError::Validation(format!(
                "{} is required for {} analysis",
                field, analysis_type
            )));
        }
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(AppError::Validation(format!("{} must be an array of strings", field)));
        }
    };

    if items.is_empty() {
        return Err(AppError::Validation(format!(
            "{} must contain at least one prompt",
            field
        )));
    }
    if items.len() > MAX_PROMPTS {
        return Err(AppError::Validation(format!(
            "{} must contain at most {} items",
            field, MAX_PROMPTS
        )));
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| -> Result<_, AppError> {
            let prompt = item.as_str().ok_or_else(|| {
                AppError::Validation(format!("{}[{}] must be a string", field, index))
            })?;
            if prompt.is_empty() {
                return Err(AppError::Validation(format!("{}[{}] must not be empty", field, index)));
            }
            if prompt.chars().count() > MAX_PROMPT_CHARS {
                return Err(AppError::Validation(format!(
                    "{}[{}] must be at most {} characters",
                    field, index, MAX_PROMPT_CHARS
                )));
            }
            Ok(prompt.to_string())
        })
        .collect()
}

fn validate_tags(value: Option<&Value>, field: &str) -> Result<Vec<TagDefinition>, AppError> {
    let items = match value {
        None => {
            return Err(AppError::Validation(format!(
                "{} is required for {} analysis",
                field,
                AnalysisType::Tagging
            )));
        }
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(AppError::Validation(format!(
                "{} must be an array of tag definitions",
                field
            )));
        }
    };

    if items.is_empty() {
        return Err(AppError::Validation(format!(
            "{} must contain at least one tag definition",
            field
        )));
    }
    if items.len() > MAX_TAGS {
        return Err(AppError::Validation(format!(
            "{} must contain at most {} items",
            field, MAX_TAGS
        )));
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| -> Result<_, AppError> {
            let entry = item.as_object().ok_or_else(|| {
                AppError::Validation(format!(
                    "{}[{}] must be an object with name and description",
                    field, index
                ))
            })?;
            let name = tag_text(entry, field, index, "name", MAX_TAG_NAME_CHARS)?;
            let description = tag_text(entry, field, index, "description", MAX_TAG_DESCRIPTION_CHARS)?;
            Ok(TagDefinition { name, description })
        })
        .collect()
}

fn tag_text(
    entry: &Map<String, Value>,
    field: &str,
    index: usize,
    key: &str,
    max_chars: usize,
) -> Result<String, AppError> {
    let text = entry
        .get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| AppError::Validation(format!("{}[{}].{} is required", field, index, key)))?;

    if text.chars().count() > max_chars {
        return Err(AppError::Validation(format!(
            "{}[{}].{} must be at most {} characters",
            field, index, key, max_chars
        )));
    }
    if contains_markup(text) {
        return Err(AppError::Validation(format!(
            "{}[{}].{} must not contain HTML markup",
            field, index, key
        )));
    }

    Ok(text.to_string())
}

fn contains_markup(text: &str) -> bool {
    text.contains('<') || text.contains('>')
}
