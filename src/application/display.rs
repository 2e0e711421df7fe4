//! What a product image slot shows for a given session state.

use serde::Serialize;

use crate::application::generated_image::GeneratedImageState;
use crate::domain::product::ProductImageRequest;

pub const GENERATING_LABEL: &str = "Generating 4K image...";
pub const GENERATE_LABEL: &str = "Generate 4K";
const SHOW_GENERATED_TITLE: &str = "Show generated image";
const SHOW_ORIGINAL_TITLE: &str = "Show original image";

/// Per-slot presentation toggles owned by the consumer, not the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplaySurface {
    show_original: bool,
    image_failed: bool,
}

/// Rendered decision for one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayView {
    /// `None` while the cache check runs, or when there is nothing to show.
    pub display_url: Option<String>,
    pub alt: String,
    pub placeholder: bool,
    pub dimmed: bool,
    pub generating_label: Option<&'static str>,
    pub generate_label: Option<&'static str>,
    pub toggle_title: Option<&'static str>,
    pub error: Option<String>,
    pub state: GeneratedImageState,
}

impl DisplaySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn showing_original(&self) -> bool {
        self.show_original
    }

    /// Flips between the original and generated asset.
    pub fn toggle_original(&mut self) {
        self.show_original = !self.show_original;
    }

    /// The displayed asset failed to load; fall back to the original for good.
    pub fn mark_image_failed(&mut self) {
        self.image_failed = true;
    }

    /// Address to report once the displayed image loaded, if it is the generated one.
    pub fn loaded_generated_url<'a>(&self, state: &'a GeneratedImageState) -> Option<&'a str> {
        if state.is_loading || state.is_generating || self.show_original || self.image_failed {
            return None;
        }
        state.image_url.as_deref()
    }

    pub fn render(&self, request: &ProductImageRequest, state: &GeneratedImageState) -> DisplayView {
        let alt = request.product_name.clone();

        if state.is_loading {
            return DisplayView {
                display_url: None,
                alt,
                placeholder: true,
                dimmed: false,
                generating_label: None,
                generate_label: None,
                toggle_title: None,
                error: None,
                state: state.clone(),
            };
        }

        let generated = state.image_url.as_deref();
        let use_original = self.show_original
            || self.image_failed
            || (generated.is_none() && !state.is_generating);
        let display_url = if use_original {
            request.original_image_url.clone()
        } else {
            generated
                .map(str::to_string)
                .or_else(|| request.original_image_url.clone())
        };

        let offer_generate = generated.is_none() && !state.is_generating && state.error.is_none();
        let offer_toggle = generated.is_some() && !state.is_generating;

        DisplayView {
            display_url,
            alt,
            placeholder: false,
            dimmed: state.is_generating,
            generating_label: state.is_generating.then_some(GENERATING_LABEL),
            generate_label: offer_generate.then_some(GENERATE_LABEL),
            toggle_title: offer_toggle.then(|| {
                if self.show_original {
                    SHOW_GENERATED_TITLE
                } else {
                    SHOW_ORIGINAL_TITLE
                }
            }),
            error: state.error.clone(),
            state: state.clone(),
        }
    }
}
