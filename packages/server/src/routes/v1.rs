use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/models", model_routes())
        .nest("/versions/{version_id}/profiles", profile_routes())
        .nest("/profiles", profile_admin_routes())
        .nest("/files", file_routes())
        .nest("/organizations", organization_routes())
        .nest("/upload", upload_routes())
}

fn model_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::model::list_models,
            handlers::model::create_model
        ))
        .routes(routes!(
            handlers::model::get_model,
            handlers::model::update_model,
            handlers::model::delete_model
        ))
        .nest("/{id}/versions", version_routes())
}

fn version_routes() -> OpenApiRouter<AppState> {
    let crud = OpenApiRouter::new()
        .routes(routes!(
            handlers::version::get_version,
            handlers::version::update_version
        ))
        .routes(routes!(handlers::archive::download_version_archive))
        .routes(routes!(handlers::version::list_versions));

    let upload = OpenApiRouter::new()
        .routes(routes!(handlers::version::add_version))
        .layer(handlers::version::version_upload_body_limit());

    crud.merge(upload)
}

fn profile_routes() -> OpenApiRouter<AppState> {
    let crud = OpenApiRouter::new()
        .routes(routes!(handlers::profile::list_profiles))
        .routes(routes!(handlers::profile::resolve_conflict));

    let upload = OpenApiRouter::new()
        .routes(routes!(handlers::profile::upload_profiles))
        .layer(handlers::profile::profile_upload_body_limit());

    crud.merge(upload)
}

fn profile_admin_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::profile::delete_profile))
}

fn file_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::archive::file_download_url))
}

fn organization_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::model::organization_usage))
}

fn upload_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::upload::programmatic_upload))
        .layer(handlers::version::version_upload_body_limit())
}
