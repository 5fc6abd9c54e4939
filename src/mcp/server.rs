//! MCP server bootstrap and request dispatch.

use std::{borrow::Cow, sync::Arc};

use crate::mcp::{
    RetrievalService,
    format::{HitKind, format_full_document},
    handlers::{
        collections::handle_list_collections,
        documents::handle_get_document_by_id,
        search::{
            handle_search_executive_orders, handle_search_government_documents,
            handle_search_scotus_opinions,
        },
    },
    registry, schemas,
};
use rmcp::{
    ErrorData as McpError,
    handler::server::ServerHandler,
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, ListResourceTemplatesResult,
        ListResourcesResult, ListToolsResult, RawResourceTemplate, ReadResourceRequestParam,
        ReadResourceResult, ResourceContents, ResourceTemplate, ServerCapabilities, ServerInfo,
        Tool, ToolAnnotations,
    },
};

const SCOTUS_RESOURCE_TEMPLATE: &str = "scotus://opinion/{id}";
const EO_RESOURCE_TEMPLATE: &str = "eo://document/{number}";
const SCOTUS_RESOURCE_PREFIX: &str = "scotus://opinion/";
const EO_RESOURCE_PREFIX: &str = "eo://document/";
const MARKDOWN_MIME: &str = "text/markdown";

/// MCP server exposing the government document corpus to LLM hosts.
#[derive(Clone)]
pub struct GovReporterMcpServer {
    service: Arc<RetrievalService>,
    registry: Arc<registry::Registry>,
}

impl GovReporterMcpServer {
    /// Create a new MCP server around the shared retrieval service.
    pub fn new(service: Arc<RetrievalService>) -> Self {
        let mut registry = registry::Registry::new();
        registry.register_tool("search_government_documents", tool_search_government);
        registry.register_tool("search_scotus_opinions", tool_search_scotus);
        registry.register_tool("search_executive_orders", tool_search_eo);
        registry.register_tool("get_document_by_id", tool_get_document);
        registry.register_tool("list_collections", tool_list_collections);

        Self {
            service,
            registry: Arc::new(registry),
        }
    }

    fn describe_tools(&self) -> Vec<Tool> {
        let config = self.service.config();
        vec![
            Tool {
                name: Cow::Borrowed("search_government_documents"),
                title: Some("Search Government Documents".to_string()),
                description: Some(Cow::Borrowed(
                    "Semantic search across Supreme Court opinions and Executive Orders, merged and ranked by relevance.",
                )),
                input_schema: Arc::new(schemas::government_search_input_schema(config)),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Search Government Documents")
                        .read_only(true)
                        .idempotent(true)
                        .open_world(false),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("search_scotus_opinions"),
                title: Some("Search SCOTUS Opinions".to_string()),
                description: Some(Cow::Borrowed(
                    "Search Supreme Court opinions with filters for opinion type, authoring justice, and filing-date range.",
                )),
                input_schema: Arc::new(schemas::scotus_search_input_schema(config)),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Search SCOTUS Opinions")
                        .read_only(true)
                        .idempotent(true)
                        .open_world(false),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("search_executive_orders"),
                title: Some("Search Executive Orders".to_string()),
                description: Some(Cow::Borrowed(
                    "Search Executive Orders with filters for president, impacted agencies, policy topics, and signing-date range.",
                )),
                input_schema: Arc::new(schemas::eo_search_input_schema(config)),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Search Executive Orders")
                        .read_only(true)
                        .idempotent(true)
                        .open_world(false),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("get_document_by_id"),
                title: Some("Get Document by ID".to_string()),
                description: Some(Cow::Borrowed(
                    "Retrieve a stored chunk by id; optionally fetch the complete source document from its government API.",
                )),
                input_schema: Arc::new(schemas::get_document_input_schema()),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Get Document by ID")
                        .read_only(true)
                        .idempotent(true)
                        .open_world(true),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("list_collections"),
                title: Some("List Collections".to_string()),
                description: Some(Cow::Borrowed(
                    "Enumerate vector collections with chunk counts, index status, and sample metadata fields.",
                )),
                input_schema: Arc::new(schemas::empty_object_schema()),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("List Collections")
                        .read_only(true)
                        .idempotent(true)
                        .open_world(false),
                ),
                icons: None,
            },
        ]
    }

    fn describe_resource_templates(&self) -> Vec<ResourceTemplate> {
        let scotus_template = RawResourceTemplate {
            uri_template: SCOTUS_RESOURCE_TEMPLATE.into(),
            name: "scotus-opinion".into(),
            title: Some("Supreme Court Opinion".into()),
            description: Some(
                "Full text of a Supreme Court opinion by CourtListener opinion id".into(),
            ),
            mime_type: Some(MARKDOWN_MIME.into()),
        };

        let eo_template = RawResourceTemplate {
            uri_template: EO_RESOURCE_TEMPLATE.into(),
            name: "executive-order".into(),
            title: Some("Executive Order".into()),
            description: Some(
                "Full text of an Executive Order by Federal Register document number".into(),
            ),
            mime_type: Some(MARKDOWN_MIME.into()),
        };

        vec![scotus_template.no_annotation(), eo_template.no_annotation()]
    }

    async fn read_document_resource(
        &self,
        uri: &str,
        kind: HitKind,
        document_id: &str,
    ) -> Result<ReadResourceResult, McpError> {
        if document_id.is_empty() {
            return Err(McpError::invalid_params(
                "Document identifier missing in resource URI",
                None,
            ));
        }

        let api = self.service.api_for(kind).ok_or_else(|| {
            McpError::internal_error("Source API is not configured for this resource", None)
        })?;

        let document = api
            .get_document(document_id)
            .await
            .map_err(|err| McpError::internal_error(err.to_string(), None))?;

        let text = format_full_document(kind, &document, &serde_json::Map::new());
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::TextResourceContents {
                uri: uri.to_string(),
                mime_type: Some(MARKDOWN_MIME.into()),
                text,
                meta: None,
            }],
        })
    }
}

fn tool_search_government(
    server: &GovReporterMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    let service = server.service.clone();
    Box::pin(async move { handle_search_government_documents(&service, request.arguments).await })
}

fn tool_search_scotus(
    server: &GovReporterMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    let service = server.service.clone();
    Box::pin(async move { handle_search_scotus_opinions(&service, request.arguments).await })
}

fn tool_search_eo(
    server: &GovReporterMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    let service = server.service.clone();
    Box::pin(async move { handle_search_executive_orders(&service, request.arguments).await })
}

fn tool_get_document(
    server: &GovReporterMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    let service = server.service.clone();
    Box::pin(async move { handle_get_document_by_id(&service, request.arguments).await })
}

fn tool_list_collections(
    server: &GovReporterMcpServer,
    _request: CallToolRequestParam,
) -> registry::ToolFuture {
    let service = server.service.clone();
    Box::pin(async move { handle_list_collections(&service).await })
}

impl ServerHandler for GovReporterMcpServer {
    fn get_info(&self) -> ServerInfo {
        let config = self.service.config();
        let mut implementation = rmcp::model::Implementation::from_build_env();
        implementation.name = config.mcp_server_name.clone();
        implementation.title = Some("Government Reporter MCP".to_string());
        implementation.version = config.mcp_server_version.clone();

        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: implementation,
            instructions: Some(
                "Search US federal legal documents semantically: Supreme Court opinions and Presidential Executive Orders. Use the search tools for relevant chunks with citations and plain-language context, then get_document_by_id or the scotus://opinion and eo://document resources for full texts.".into(),
            ),
            ..ServerInfo::default()
        }
    }

    fn list_resources(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListResourcesResult::with_all_items(Vec::new())))
    }

    fn list_resource_templates(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourceTemplatesResult, McpError>> + Send + '_
    {
        let templates = self.describe_resource_templates();
        std::future::ready(Ok(ListResourceTemplatesResult::with_all_items(templates)))
    }

    fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools = self.describe_tools();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            let uri = request.uri.clone();
            if let Some(id) = uri.strip_prefix(SCOTUS_RESOURCE_PREFIX) {
                return self
                    .read_document_resource(&uri, HitKind::Scotus, id)
                    .await;
            }
            if let Some(number) = uri.strip_prefix(EO_RESOURCE_PREFIX) {
                return self
                    .read_document_resource(&uri, HitKind::ExecutiveOrder, number)
                    .await;
            }

            if let Some(handler) = self.registry.resources.get(uri.as_str()) {
                return handler(self, request).await;
            }

            Err(McpError::invalid_params(
                format!("Unknown resource URI: {uri}"),
                None,
            ))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            if let Some(handler) = self.registry.tools.get(request.name.as_ref()) {
                return handler(self, request).await;
            }

            Err(McpError::invalid_params(
                format!("Unknown tool: {}", request.name),
                None,
            ))
        }
    }
}
