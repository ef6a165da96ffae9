use crate::models::{AnalysisKind, AnalysisRequest, ProviderPayload};

/// Builds the provider body for a validated request.
///
/// | kind       | provider field        |
/// |------------|-----------------------|
/// | general    | `prompts`             |
/// | moderation | `rejection_questions` |
/// | tagging    | `tag_definitions`     |
///
/// `multi_label` is only forwarded for tagging, and only when the caller set it.
pub fn build_provider_payload(request: &AnalysisRequest) -> ProviderPayload {
    let uri = request.image_url.as_str();
    match &request.kind {
        AnalysisKind::General { prompts } => ProviderPayload::general(uri, prompts.clone()),
        AnalysisKind::Moderation { prompts } => ProviderPayload::moderation(uri, prompts.clone()),
        AnalysisKind::Tagging { tags } => ProviderPayload::tagging(uri, tags.clone(), request.multi_label),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TagDefinition;
    use crate::utils::request_validation::{BodyDialect, validate_analysis_request};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::{Value, json};

    fn to_json(payload: &ProviderPayload) -> Value {
        serde_json::to_value(payload).unwrap()
    }

    #[test]
    fn test_moderation_maps_to_rejection_questions() {
        let request = validate_analysis_request(
            &json!({
                "imageUrl": "https://x/img.jpg",
                "analysis_type": "ai_vision_moderation",
                "prompts": ["is it safe?"]
            }),
            BodyDialect::Analyze,
        )
        .unwrap();

        assert_eq!(
            to_json(&build_provider_payload(&request)),
            json!({"source": {"uri": "https://x/img.jpg"}, "rejection_questions": ["is it safe?"]})
        );
    }

    #[test]
    fn test_general_ignores_multi_label() {
        let request = AnalysisRequest {
            image_url: "https://x/img.jpg".into(),
            kind: AnalysisKind::General { prompts: vec!["what is shown?".into()] },
            multi_label: Some(true),
        };

        assert_eq!(
            to_json(&build_provider_payload(&request)),
            json!({"source": {"uri": "https://x/img.jpg"}, "prompts": ["what is shown?"]})
        );
    }

    #[test]
    fn test_tagging_copies_multi_label_when_present() {
        let tags = vec![TagDefinition { name: "cat".into(), description: "a cat".into() }];
        let with_flag = AnalysisRequest {
            image_url: "https://x/img.jpg".into(),
            kind: AnalysisKind::Tagging { tags: tags.clone() },
            multi_label: Some(false),
        };
        let without_flag = AnalysisRequest { multi_label: None, ..with_flag.clone() };

        assert_eq!(
            to_json(&build_provider_payload(&with_flag)),
            json!({
                "source": {"uri": "https://x/img.jpg"},
                "tag_definitions": [{"name": "cat", "description": "a cat"}],
                "multi_label": false
            })
        );

        let omitted = to_json(&build_provider_payload(&without_flag));
        assert!(omitted.get("multi_label").is_none());
    }

    #[test]
    fn test_tag_extra_fields_never_reach_payload() {
        let request = validate_analysis_request(
            &json!({
                "imageUrl": "https://x/img.jpg",
                "analysis_type": "ai_vision_tagging",
                "tags": [
                    {"name": "dog", "description": "a dog", "priority": 1},
                    {"name": "ball", "description": "a ball", "extra": {"nested": true}}
                ]
            }),
            BodyDialect::Analyze,
        )
        .unwrap();

        let payload = to_json(&build_provider_payload(&request));
        for definition in payload["tag_definitions"].as_array().unwrap() {
            let keys: Vec<&str> = definition.as_object().unwrap().keys().map(String::as_str).collect();
            assert_eq!(keys, vec!["description", "name"]);
        }
    }

    #[test]
    fn test_identical_requests_build_identical_payloads() {
        let request = AnalysisRequest {
            image_url: "https://x/img.jpg".into(),
            kind: AnalysisKind::General { prompts: vec!["a".into(), "b".into()] },
            multi_label: None,
        };
        assert_eq!(build_provider_payload(&request), build_provider_payload(&request));
    }

    proptest! {
        #[test]
        fn prop_general_prompts_pass_through_verbatim(
            prompts in prop::collection::vec("[a-zA-Z0-9 ?]{1,40}", 1..=10)
        ) {
            let request = AnalysisRequest {
                image_url: "https://images.example.com/p.jpg".into(),
                kind: AnalysisKind::General { prompts: prompts.clone() },
                multi_label: None,
            };
            let payload = to_json(&build_provider_payload(&request));
            let object = payload.as_object().unwrap();

            prop_assert_eq!(object.len(), 2);
            prop_assert_eq!(&payload["prompts"], &json!(prompts));
            prop_assert_eq!(&payload["source"]["uri"], &json!("https://images.example.com/p.jpg"));
        }

        #[test]
        fn prop_tag_definitions_preserve_length(
            names in prop::collection::vec("[a-z]{1,20}", 1..=20),
            multi_label in proptest::option::of(any::<bool>())
        ) {
            let tags: Vec<TagDefinition> = names
                .iter()
                .map(|name| TagDefinition { name: name.clone(), description: format!("contains {}", name) })
                .collect();
            let request = AnalysisRequest {
                image_url: "https://images.example.com/p.jpg".into(),
                kind: AnalysisKind::Tagging { tags: tags.clone() },
                multi_label,
            };
            let payload = build_provider_payload(&request);

            prop_assert_eq!(payload.tag_definitions().map(|t| t.len()), Some(tags.len()));
            prop_assert_eq!(payload.multi_label(), multi_label);
            prop_assert!(payload.prompts().is_none());
            prop_assert!(payload.rejection_questions().is_none());
        }
    }
}
