//! External tests for the providers module: wire shapes as the endpoint
//! sees them and the model catalog.

use clap::ValueEnum;
use dialexa::providers::*;
use rstest::rstest;
use serde_json::json;

// -- Provider ---------------------------------------------------------------

#[rstest]
#[case("openrouter", Provider::Openrouter)]
#[case("openai", Provider::Openai)]
fn test_provider_parses_from_cli_value(#[case] raw: &str, #[case] expected: Provider) {
    assert_eq!(Provider::from_str(raw, true).unwrap(), expected);
    assert_eq!(expected.to_string(), raw);
}

#[test]
fn test_provider_unknown_value_rejected() {
    assert!(Provider::from_str("anthropic", true).is_err());
}

#[test]
fn test_provider_deserializes_lowercase() {
    #[derive(serde::Deserialize)]
    struct Wrap {
        provider: Provider,
    }
    let w: Wrap = toml::from_str(r#"provider = "openai""#).unwrap();
    assert_eq!(w.provider, Provider::Openai);
}

// -- Request shapes ---------------------------------------------------------

#[test]
fn test_request_matches_wire_format() {
    let request = ChatRequest {
        model: DEFAULT_MODEL.to_string(),
        messages: vec![
            ChatMessage::text(Role::System, "be brief"),
            ChatMessage::parts(
                Role::User,
                vec![
                    ContentPart::Text { text: "what is this?".into() },
                    ContentPart::ImageUrl { image_url: ImageUrl { url: "https://x/cat.png".into() } },
                ],
            ),
        ],
        stream: true,
    };

    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        json!({
            "model": DEFAULT_MODEL,
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": [
                    {"type": "text", "text": "what is this?"},
                    {"type": "image_url", "image_url": {"url": "https://x/cat.png"}}
                ]}
            ],
            "stream": true
        })
    );
}

#[test]
fn test_role_display_matches_wire_name() {
    for role in [Role::System, Role::User, Role::Assistant] {
        assert_eq!(serde_json::to_value(role).unwrap(), json!(role.to_string()));
    }
}

// -- Response shapes --------------------------------------------------------

#[rstest]
#[case(json!({"choices": [{"message": {"content": "hi"}}]}), Some("hi"))]
#[case(json!({"choices": [{"message": {"content": ""}}]}), None)]
#[case(json!({"choices": [{"message": {"content": null}}]}), None)]
#[case(json!({"choices": [{}]}), None)]
#[case(json!({"choices": []}), None)]
#[case(json!({"id": "gen-1"}), None)]
fn test_completion_content_variants(#[case] body: serde_json::Value, #[case] expected: Option<&str>) {
    let completion: ChatCompletion = serde_json::from_value(body).unwrap();
    assert_eq!(completion.first_content(), expected);
}

#[rstest]
#[case(json!({"choices": [{"delta": {"content": "tok"}}]}), "tok")]
#[case(json!({"choices": [{"delta": {"role": "assistant"}}]}), "")]
#[case(json!({"choices": [{"delta": {}, "finish_reason": "stop"}]}), "")]
#[case(json!({"choices": []}), "")]
#[case(json!({"object": "chat.completion.chunk"}), "")]
fn test_chunk_delta_variants(#[case] body: serde_json::Value, #[case] expected: &str) {
    let chunk: StreamChunk = serde_json::from_value(body).unwrap();
    assert_eq!(chunk.delta_text(), expected);
}

#[test]
fn test_chunk_keeps_finish_reason() {
    let chunk: StreamChunk =
        serde_json::from_value(json!({"choices": [{"delta": {}, "finish_reason": "length"}]})).unwrap();
    assert_eq!(chunk.choices[0].finish_reason.as_deref(), Some("length"));
}

// -- Catalog ----------------------------------------------------------------

#[test]
fn test_defaults_are_in_catalog() {
    assert!(find_model(DEFAULT_MODEL).is_some());
    assert!(find_model(DEFAULT_ASK_MODEL).is_some());
}

#[test]
fn test_catalog_ids_are_free_tier() {
    for model in MODELS {
        assert!(model.id.ends_with(":free"), "{} is not a free model", model.id);
        assert!(!model.label.is_empty());
    }
}

#[test]
fn test_some_catalog_models_accept_images() {
    let vision: Vec<&str> = MODELS.iter().filter(|m| m.supports_image).map(|m| m.id).collect();
    assert!(!vision.is_empty());
    assert!(vision.iter().all(|id| supports_image(id)));
    assert!(!supports_image("some/unlisted-model"));
}
