//! Embedded compiler image recipes
//!
//! Each supported [`MavenVersion`] has exactly one Dockerfile, bundled into the
//! binary at compile time and looked up by file name.

use super::version::MavenVersion;
use crate::error::{Result, StepError};
use std::collections::HashMap;

const RECIPE_V17: &[u8] = include_bytes!("recipes/Dockerfile.maven_v17-jdk-jammy");
const RECIPE_V21: &[u8] = include_bytes!("recipes/Dockerfile.maven_v21-jdk-jammy");

/// File name of the recipe for `version`
pub fn recipe_file_name(version: MavenVersion) -> String {
    format!("Dockerfile.maven_{}-jdk-jammy", version.token())
}

/// Keyed store of recipe bytes
#[derive(Debug, Clone)]
pub struct RecipeStore {
    recipes: HashMap<String, &'static [u8]>,
}

impl RecipeStore {
    /// Recipes compiled into this binary
    pub fn embedded() -> Self {
        Self::from_entries([
            (recipe_file_name(MavenVersion::V17), RECIPE_V17),
            (recipe_file_name(MavenVersion::V21), RECIPE_V21),
        ])
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, &'static [u8])>,
    {
        Self {
            recipes: entries.into_iter().collect(),
        }
    }

    pub fn read(&self, file_name: &str) -> Result<&'static [u8]> {
        self.recipes
            .get(file_name)
            .copied()
            .ok_or_else(|| StepError::MissingRecipe {
                file_name: file_name.to_string(),
            })
    }

    pub fn for_version(&self, version: MavenVersion) -> Result<&'static [u8]> {
        self.read(&recipe_file_name(version))
    }

    /// Checks that every supported version has a non-empty recipe, so a
    /// broken bundle fails at startup instead of mid-build.
    pub fn validate(&self) -> Result<()> {
        for version in MavenVersion::ALL {
            let file_name = recipe_file_name(version);
            match self.recipes.get(&file_name) {
                Some(bytes) if !bytes.is_empty() => {}
                _ => return Err(StepError::MissingRecipe { file_name }),
            }
        }
        Ok(())
    }
}

impl Default for RecipeStore {
    fn default() -> Self {
        Self::embedded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_store_is_complete() {
        let store = RecipeStore::embedded();
        assert!(store.validate().is_ok());
        for version in MavenVersion::ALL {
            let recipe = store.for_version(version).unwrap();
            let text = std::str::from_utf8(recipe).unwrap();
            assert!(text.contains(&format!("eclipse-temurin-{}", version.release())));
        }
    }

    #[test]
    fn test_file_name_convention() {
        assert_eq!(
            recipe_file_name(MavenVersion::V17),
            "Dockerfile.maven_v17-jdk-jammy"
        );
        assert_eq!(
            recipe_file_name(MavenVersion::V21),
            "Dockerfile.maven_v21-jdk-jammy"
        );
    }

    #[test]
    fn test_missing_recipe_fails_validation() {
        let store = RecipeStore::from_entries([(
            recipe_file_name(MavenVersion::V17),
            b"FROM scratch".as_slice(),
        )]);
        let err = store.validate().unwrap_err();
        assert!(matches!(
            err,
            StepError::MissingRecipe { ref file_name } if file_name == "Dockerfile.maven_v21-jdk-jammy"
        ));
        assert!(store.for_version(MavenVersion::V21).is_err());
    }

    #[test]
    fn test_empty_recipe_fails_validation() {
        let store = RecipeStore::from_entries([
            (recipe_file_name(MavenVersion::V17), b"".as_slice()),
            (recipe_file_name(MavenVersion::V21), b"FROM scratch".as_slice()),
        ]);
        assert!(store.validate().is_err());
    }
}
