//! Input parameter validation tests.
//!
//! Invalid tool arguments are rejected with per-field details before any
//! image reference is resolved or any provider is called.

#[cfg(test)]
mod tests {
    use imagegen_mcp_common::Error;
    use imagegen_mcp_server::handler::{EditImageParams, GenerateImageParams};
    use imagegen_mcp_server::server::parse_arguments;
    use proptest::prelude::*;
    use serde_json::json;

    fn generate(args: serde_json::Value) -> GenerateImageParams {
        serde_json::from_value(args).unwrap()
    }

    fn edit(args: serde_json::Value) -> EditImageParams {
        serde_json::from_value(args).unwrap()
    }

    #[test]
    fn test_generate_rejects_invalid_size() {
        let err = generate(json!({ "prompt": "A cat", "size": "512x512" }))
            .validate()
            .unwrap_err();
        assert_eq!(err.fields(), vec!["size"]);
        assert!(err.to_string().contains("512x512"));
    }

    #[test]
    fn test_generate_rejects_empty_prompt() {
        let err = generate(json!({ "prompt": "   " })).validate().unwrap_err();
        assert_eq!(err.fields(), vec!["prompt"]);
    }

    #[test]
    fn test_generate_reports_every_bad_field() {
        let err = generate(json!({
            "prompt": "",
            "size": "huge",
            "output_format": "bmp",
            "background": "striped",
            "model": "dall-e-2",
        }))
        .validate()
        .unwrap_err();
        assert_eq!(
            err.fields(),
            vec!["prompt", "size", "output_format", "background", "model"]
        );
    }

    #[test]
    fn test_transparent_background_needs_alpha_format() {
        let err = generate(json!({ "prompt": "A logo", "background": "transparent" }))
            .validate()
            .unwrap_err();
        assert_eq!(err.fields(), vec!["background"]);

        let ok = generate(json!({
            "prompt": "A logo",
            "background": "transparent",
            "output_format": "png",
        }))
        .validate();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_unknown_response_format_is_unsupported() {
        let err = generate(json!({ "prompt": "", "response_format": "html" }))
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)), "{:?}", err);
    }

    #[test]
    fn test_edit_rejects_too_many_images() {
        let paths: Vec<String> = (0..17).map(|i| format!("/tmp/{i}.png")).collect();
        let err = edit(json!({ "prompt": "Add a hat", "image_paths": paths }))
            .validate()
            .unwrap_err();
        assert_eq!(err.fields(), vec!["image_paths"]);
    }

    #[test]
    fn test_edit_rejects_model_without_edit_support() {
        let err = edit(json!({
            "prompt": "Add a hat",
            "image_paths": ["/tmp/a.png"],
            "model": "FLUX.1-Kontext-pro",
        }))
        .validate()
        .unwrap_err();
        assert_eq!(err.fields(), vec!["model"]);
    }

    #[test]
    fn test_missing_required_argument_is_invalid_params() {
        let args = json!({ "size": "auto" }).as_object().cloned();
        let err = parse_arguments::<GenerateImageParams>(args).unwrap_err();
        assert_eq!(err.data.unwrap()["fields"], json!(["prompt"]));

        let result = parse_arguments::<EditImageParams>(None);
        assert!(result.is_err());
    }

    proptest! {
        /// Any non-blank prompt within the limit passes with otherwise default options.
        #[test]
        fn prop_valid_prompt_is_accepted(prompt in "[a-zA-Z][a-zA-Z ]{0,300}") {
            let request = generate(json!({ "prompt": prompt.clone() })).validate().unwrap();
            prop_assert_eq!(request.prompt, prompt.trim());
        }

        /// Edit accepts every image count from 1 to 16.
        #[test]
        fn prop_edit_image_count_bounds(count in 1usize..=16) {
            let paths: Vec<String> = (0..count).map(|i| format!("{i}.png")).collect();
            let request = edit(json!({ "prompt": "Add a hat", "image_paths": paths }))
                .validate()
                .unwrap();
            prop_assert_eq!(request.image_paths.len(), count);
        }
    }
}
