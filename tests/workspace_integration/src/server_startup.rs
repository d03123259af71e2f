//! Server startup integration tests.
//!
//! The server can be instantiated from configuration and provides server info,
//! tools and resources.

#[cfg(test)]
mod tests {
    use crate::{test_config, test_server};
    use imagegen_mcp_server::server::{EDIT_IMAGE_TOOL, GENERATE_IMAGE_TOOL, resource_list, tools};
    use rmcp::ServerHandler;

    #[test]
    fn test_image_server_startup() {
        let server = test_server();
        let info = server.get_info();

        let instructions = info.instructions.as_ref().unwrap().to_lowercase();
        assert!(
            instructions.contains("image"),
            "Server instructions should mention 'image'"
        );
        assert!(instructions.contains(GENERATE_IMAGE_TOOL));
        assert!(instructions.contains(EDIT_IMAGE_TOOL));
    }

    #[test]
    fn test_server_has_tools_and_resources_capability() {
        let info = test_server().get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_some());
    }

    #[test]
    fn test_registered_tools() {
        let names: Vec<String> = tools().iter().map(|t| t.name.to_string()).collect();
        assert_eq!(names, vec![GENERATE_IMAGE_TOOL, EDIT_IMAGE_TOOL]);
    }

    #[test]
    fn test_registered_resources() {
        let uris: Vec<String> = resource_list().iter().map(|r| r.raw.uri.clone()).collect();
        assert_eq!(uris, vec!["image://models", "image://options", "image://providers"]);
        for resource in resource_list() {
            assert_eq!(resource.raw.mime_type.as_deref(), Some("application/json"));
        }
    }

    #[test]
    fn test_config_defaults_without_flux() {
        let config = test_config();
        assert!(config.flux.is_none());
        assert_eq!(config.upload_base_url(), "http://localhost:8080/_upload");
    }
}
