//! Content-addressed compiler image tags

use super::recipe::RecipeStore;
use super::version::{resolve_version, MavenVersion};
use crate::error::Result;
use crate::request::BuildRequest;
use sha2::{Digest, Sha256};
use std::fmt;

/// Registry reference of the form `prefix/name:digest`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageTag {
    registry: String,
    name: String,
    digest: String,
}

impl ImageTag {
    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hex-encoded SHA-256 of the recipe
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn reference(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ImageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.registry.is_empty() {
            write!(f, "{}:{}", self.name, self.digest)
        } else {
            write!(f, "{}/{}:{}", self.registry, self.name, self.digest)
        }
    }
}

pub fn compute_checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Image name for a toolchain version, without registry or tag
pub fn compiler_image_name(version: MavenVersion) -> String {
    format!("maven-3-eclipse-temurin-{}-alpine", version.release())
}

/// Derives the tag of the compiler image built from `recipe`.
///
/// Only the recipe bytes feed the digest, so identical recipes always map to
/// the same tag and a previously built image can be reused.
pub fn derive_tag(recipe: &[u8], version: MavenVersion, registry_prefix: &str) -> ImageTag {
    ImageTag {
        registry: registry_prefix.trim_end_matches('/').to_string(),
        name: compiler_image_name(version),
        digest: compute_checksum(recipe),
    }
}

/// Compiler image tag for `request`, reading the recipe from `recipes`
pub fn compiler_image(
    recipes: &RecipeStore,
    request: &BuildRequest,
    registry_prefix: &str,
) -> Result<ImageTag> {
    let version = resolve_version(request)?;
    let recipe = recipes.for_version(version)?;
    Ok(derive_tag(recipe, version, registry_prefix))
}
