use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::application::display::{DisplaySurface, DisplayView};
use crate::application::error::HttpError;
use crate::application::generated_image::ImageSession;
use crate::domain::product::ProductImageRequest;

use super::ImageState;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct ImageQuery {
    name: Option<String>,
    original: Option<String>,
    auto: Option<bool>,
    show_original: bool,
    image_failed: bool,
}

impl ImageQuery {
    fn surface(&self) -> DisplaySurface {
        let mut surface = DisplaySurface::new();
        if self.show_original {
            surface.toggle_original();
        }
        if self.image_failed {
            surface.mark_image_failed();
        }
        surface
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct GenerateBody {
    product_name: String,
    original_image_url: Option<String>,
}

/// Cache check plus optional auto-generation, rendered for one slot.
pub(super) async fn show_image(
    State(state): State<ImageState>,
    Path(product_id): Path<String>,
    Query(query): Query<ImageQuery>,
) -> Result<Json<DisplayView>, HttpError> {
    let surface = query.surface();
    let request = ProductImageRequest::new(
        product_id,
        query.name.unwrap_or_default(),
        query.original,
    );
    request.validate()?;

    let auto = query.auto.unwrap_or(state.auto_generate);
    let session = ImageSession::new(state.workflow, request, auto);
    session.load().await;

    Ok(Json(render(surface, &session)))
}

/// Cache check, then the manual trigger when nothing is cached.
pub(super) async fn generate_image(
    State(state): State<ImageState>,
    Path(product_id): Path<String>,
    Json(body): Json<GenerateBody>,
) -> Result<Json<DisplayView>, HttpError> {
    let request =
        ProductImageRequest::new(product_id, body.product_name, body.original_image_url);
    request.validate()?;

    let session = ImageSession::new(state.workflow, request, false);
    session.load().await;
    if session.state().image_url.is_none() {
        session.generate().await;
    }

    Ok(Json(render(DisplaySurface::new(), &session)))
}

fn render(surface: DisplaySurface, session: &ImageSession) -> DisplayView {
    let view = surface.render(&session.request(), &session.state());
    session.unmount();
    view
}
