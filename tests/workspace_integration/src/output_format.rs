//! Output format tests.
//!
//! Successful tool results are MCP content with image MIME types or text;
//! failures are tool errors whose text is the JSON error envelope.

use rmcp::model::{CallToolResult, Content, RawContent};

/// Validates that a CallToolResult has valid content format.
fn validate_tool_result(result: &CallToolResult) -> Result<(), String> {
    if result.content.is_empty() {
        return Err("Result should have content".to_string());
    }
    for content in &result.content {
        validate_content(content)?;
    }
    Ok(())
}

/// Validates that a Content item has valid structure.
fn validate_content(content: &Content) -> Result<(), String> {
    match &content.raw {
        RawContent::Text(text_content) => {
            if text_content.text.is_empty() {
                return Err("Text content should not be empty".to_string());
            }
            Ok(())
        }
        RawContent::Image(image_content) => {
            if image_content.data.is_empty() {
                return Err("Image content should have data".to_string());
            }
            if !image_content.mime_type.starts_with("image/") {
                return Err(format!(
                    "Image content should have image/* mime type, got: {}",
                    image_content.mime_type
                ));
            }
            Ok(())
        }
        _ => Err("Only text and image content are produced".to_string()),
    }
}

/// Parse the JSON error envelope out of a failed tool result.
fn error_envelope(result: &CallToolResult) -> serde_json::Value {
    match &result.content[0].raw {
        RawContent::Text(text) => serde_json::from_str(&text.text).unwrap_or_default(),
        _ => serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server;
    use imagegen_mcp_common::OutputFormat;
    use imagegen_mcp_server::GeneratedImage;
    use imagegen_mcp_server::formatter::{ResponsePayload, markdown_document};
    use imagegen_mcp_server::handler::GenerateImageParams;
    use imagegen_mcp_server::server::payload_content;

    #[test]
    fn test_image_payload_is_image_content() {
        let payload = ResponsePayload::Image(vec![
            GeneratedImage {
                bytes: b"first".to_vec(),
                format: OutputFormat::Png,
            },
            GeneratedImage {
                bytes: b"second".to_vec(),
                format: OutputFormat::Webp,
            },
        ]);
        let content = payload_content(&payload);
        assert_eq!(content.len(), 2);
        for item in &content {
            assert!(validate_content(item).is_ok());
        }
        match &content[1].raw {
            RawContent::Image(image) => assert_eq!(image.mime_type, "image/webp"),
            _ => panic!("expected image content"),
        }
    }

    #[test]
    fn test_markdown_payload_is_text_content() {
        let doc = markdown_document("a cat", &["https://host/_upload/a.png".to_string()]);
        let content = payload_content(&ResponsePayload::Markdown(doc.clone()));
        assert_eq!(content.len(), 1);
        match &content[0].raw {
            RawContent::Text(text) => assert_eq!(text.text, doc),
            _ => panic!("expected text content"),
        }
    }

    #[test]
    fn test_card_payload_is_json_text() {
        let card = serde_json::json!({ "type": "AdaptiveCard", "version": "1.5" });
        let content = payload_content(&ResponsePayload::AdaptiveCard(card.clone()));
        match &content[0].raw {
            RawContent::Text(text) => {
                let parsed: serde_json::Value = serde_json::from_str(&text.text).unwrap();
                assert_eq!(parsed, card);
            }
            _ => panic!("expected text content"),
        }
    }

    #[tokio::test]
    async fn test_validation_failure_is_tool_error_envelope() {
        let server = test_server();
        let params: GenerateImageParams =
            serde_json::from_value(serde_json::json!({ "prompt": "a cat", "size": "tiny" }))
                .unwrap();

        let result = server.generate_image(params).await;
        assert_eq!(result.is_error, Some(true));
        assert!(validate_tool_result(&result).is_ok());

        let envelope = error_envelope(&result);
        assert_eq!(envelope["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(envelope["metadata"]["prompt"], "a cat");
        assert_eq!(envelope["metadata"]["size"], "tiny");
    }

    #[tokio::test]
    async fn test_unconfigured_model_is_tool_error() {
        let server = test_server();
        let params: GenerateImageParams = serde_json::from_value(serde_json::json!({
            "prompt": "a cat",
            "model": "flux",
        }))
        .unwrap();

        let result = server.generate_image(params).await;
        assert_eq!(result.is_error, Some(true));
        let envelope = error_envelope(&result);
        assert_eq!(envelope["error"]["code"], "VALIDATION_ERROR");
        assert!(
            envelope["error"]["message"]
                .as_str()
                .unwrap()
                .contains("FLUX_API_KEY")
        );
    }
}
