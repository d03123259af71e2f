//! Tool schema validity tests.
//!
//! Every registered tool has a name, a description and an object input schema
//! listing its parameters, with only the truly required ones marked required.

use serde_json::Value;

/// Validates that a JSON schema has the structure MCP clients expect.
fn validate_json_schema(schema: &Value) -> Result<(), String> {
    let obj = schema
        .as_object()
        .ok_or_else(|| "Schema must be an object".to_string())?;

    if let Some(type_val) = obj.get("type") {
        if type_val != "object" {
            return Err(format!("Expected type 'object', got {:?}", type_val));
        }
    }

    if let Some(properties) = obj.get("properties") {
        if !properties.is_object() {
            return Err("Properties must be an object".to_string());
        }
    }

    Ok(())
}

/// Validates that a tool has required fields.
fn validate_tool(tool: &rmcp::model::Tool) -> Result<(), String> {
    if tool.name.is_empty() {
        return Err("Tool name cannot be empty".to_string());
    }

    if tool.description.as_deref().is_none_or(str::is_empty) {
        return Err(format!("Tool '{}' must have a description", tool.name));
    }

    if tool.input_schema.is_empty() {
        return Err(format!("Tool '{}' must have an input schema", tool.name));
    }

    let schema_value = serde_json::to_value(&*tool.input_schema)
        .map_err(|e| format!("Failed to serialize schema: {}", e))?;
    validate_json_schema(&schema_value)
}

fn required_fields(schema: &Value) -> Vec<String> {
    schema["required"]
        .as_array()
        .map(|fields| {
            fields
                .iter()
                .filter_map(|f| f.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use imagegen_mcp_server::handler::{EditImageParams, GenerateImageParams};
    use imagegen_mcp_server::server::tools;
    use proptest::prelude::*;
    use schemars::schema_for;
    use std::borrow::Cow;
    use std::sync::Arc;

    #[test]
    fn test_json_schema_validation() {
        let valid_schema = serde_json::json!({
            "type": "object",
            "properties": { "prompt": { "type": "string" } },
            "required": ["prompt"]
        });
        assert!(validate_json_schema(&valid_schema).is_ok());

        let invalid_schema = serde_json::json!({ "type": "string" });
        assert!(validate_json_schema(&invalid_schema).is_err());
    }

    #[test]
    fn test_tool_validation_rejects_missing_description() {
        let tool = rmcp::model::Tool {
            name: Cow::Borrowed("test_tool"),
            description: None,
            input_schema: Arc::new(serde_json::Map::new()),
            annotations: None,
            icons: None,
            meta: None,
            output_schema: None,
            title: None,
        };
        assert!(validate_tool(&tool).is_err());
    }

    #[test]
    fn test_registered_tools_are_valid() {
        for tool in tools() {
            validate_tool(&tool).unwrap_or_else(|e| panic!("{}", e));
        }
    }

    #[test]
    fn test_generate_params_schema() {
        let schema = serde_json::to_value(schema_for!(GenerateImageParams)).unwrap();
        assert!(validate_json_schema(&schema).is_ok());

        let properties = schema["properties"].as_object().unwrap();
        for field in [
            "prompt",
            "n",
            "size",
            "quality",
            "output_format",
            "seed",
            "enhance_prompt",
            "response_format",
            "background",
            "model",
        ] {
            assert!(properties.contains_key(field), "missing property {}", field);
        }
        assert_eq!(required_fields(&schema), vec!["prompt"]);
        assert_eq!(properties["size"]["default"], "1024x1024");
        assert_eq!(properties["output_format"]["default"], "jpeg");
        assert_eq!(properties["enhance_prompt"]["default"], true);
        assert_eq!(properties["n"]["default"], 1);
        assert_eq!(properties["quality"]["default"], "auto");
    }

    #[test]
    fn test_edit_params_schema() {
        let schema = serde_json::to_value(schema_for!(EditImageParams)).unwrap();
        assert!(validate_json_schema(&schema).is_ok());

        let properties = schema["properties"].as_object().unwrap();
        assert!(properties.contains_key("image_paths"));
        assert!(properties.contains_key("mask_path"));
        assert_eq!(properties["image_paths"]["type"], "array");

        let mut required = required_fields(&schema);
        required.sort();
        assert_eq!(required, vec!["image_paths", "prompt"]);
        assert_eq!(properties["size"]["default"], "auto");
        assert_eq!(properties["output_format"]["default"], "png");
    }

    proptest! {
        /// Any prompt string round-trips through the tool arguments with defaults filled in.
        #[test]
        fn prop_generate_arguments_fill_defaults(prompt in ".{1,200}") {
            let params: GenerateImageParams =
                serde_json::from_value(serde_json::json!({ "prompt": prompt.clone() })).unwrap();
            prop_assert_eq!(params.prompt, prompt);
            prop_assert_eq!(params.model, "gpt-image-1");
            prop_assert_eq!(params.response_format, "image");
            prop_assert_eq!(params.seed, 0);
        }
    }
}
