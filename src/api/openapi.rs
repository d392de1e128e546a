//! OpenAPI documentation assembly.

use utoipa::OpenApi;

/// OpenAPI 3.1 document for the bookdl REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "bookdl API",
        description = "Multi-source book search and download backend",
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        crate::api::routes::search_stream,
        crate::api::routes::search,
        crate::api::routes::search_by_source,
        crate::api::routes::start_download,
        crate::api::routes::download_progress,
        crate::api::routes::active_downloads,
        crate::api::routes::list_sources,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
        crate::api::routes::shutdown,
    ),
    components(schemas(
        crate::api::routes::SearchRequest,
        crate::error::ApiError,
        crate::error::ErrorDetail,
        crate::source::SourceInfo,
        crate::types::BookId,
        crate::types::Event,
        crate::types::JobStatus,
        crate::types::JobView,
        crate::types::SearchResult,
        crate::types::SourceId,
        crate::types::StartDownload,
    )),
    tags(
        (name = "search", description = "Multi-source search"),
        (name = "downloads", description = "Background book downloads"),
        (name = "sources", description = "Registered sources"),
        (name = "system", description = "Health and lifecycle")
    )
)]
pub struct ApiDoc;
