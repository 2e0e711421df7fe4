//! Product image requests and the storage keys derived from them.
//!
//! A generated image lives at a key computed purely from the product's id and
//! name, so a lookup needs no separate index: the same product always maps to
//! the same storage slot.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// File extension of every generated artifact.
pub const CACHE_KEY_EXTENSION: &str = "png";

/// Number of leading id characters folded into the cache key.
pub const CACHE_KEY_ID_PREFIX_LEN: usize = 8;

pub const MISSING_IDENTITY_MESSAGE: &str = "Product ID and name are required";

/// Input for the generated-image workflow, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImageRequest {
    pub product_id: String,
    pub product_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_image_url: Option<String>,
}

impl ProductImageRequest {
    pub fn new(
        product_id: impl Into<String>,
        product_name: impl Into<String>,
        original_image_url: Option<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            original_image_url,
        }
    }

    /// Storage key for this product's generated image.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::derive(&self.product_id, &self.product_name)
    }

    /// Two requests share an identity when they resolve to the same product slot.
    pub fn same_identity(&self, other: &Self) -> bool {
        self.product_id == other.product_id && self.product_name == other.product_name
    }

    /// Generation needs both identifiers; the original image is optional.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.product_id.is_empty() || self.product_name.is_empty() {
            return Err(DomainError::validation(MISSING_IDENTITY_MESSAGE));
        }
        Ok(())
    }
}

/// Deterministic object-storage key for a product's generated image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// `{normalized name}-{first 8 id chars}.png`
    ///
    /// The name is lower-cased and every character outside `[a-z0-9]` becomes
    /// a single `-`. Runs are not collapsed, so `"A & B"` yields `a---b`.
    pub fn derive(product_id: &str, product_name: &str) -> Self {
        let name = normalize_name(product_name);
        let prefix: String = product_id.chars().take(CACHE_KEY_ID_PREFIX_LEN).collect();
        Self(format!("{name}-{prefix}.{CACHE_KEY_EXTENSION}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|ch| {
            if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
                ch
            } else {
                '-'
            }
        })
        .collect()
}
