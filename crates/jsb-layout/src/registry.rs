//! Layout recipes by variant and game build.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::{Error, FileVariant, LayoutRecipe, Result};

const BUILTIN: [&str; 3] = [
    include_str!("../layouts/fm24/physical_constraints.json"),
    include_str!("../layouts/fm24/weights.json"),
    include_str!("../layouts/fm24/player_ratings.json"),
];

/// Recipes keyed by `(variant, build)`.
#[derive(Debug, Clone, Default)]
pub struct LayoutRegistry {
    recipes: BTreeMap<(FileVariant, String), LayoutRecipe>,
}

impl LayoutRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The recipes shipped with the crate.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        for text in BUILTIN {
            registry.insert(LayoutRecipe::from_json(text)?);
        }
        Ok(registry)
    }

    /// Add a recipe, replacing any recipe for the same variant and build.
    pub fn insert(&mut self, recipe: LayoutRecipe) -> Option<LayoutRecipe> {
        self.recipes
            .insert((recipe.variant, recipe.build.clone()), recipe)
    }

    /// Load every `*.json` recipe below `dir`.
    ///
    /// Returns the number of recipes loaded. Files that are not recipes are
    /// skipped with a warning.
    pub fn load_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize> {
        let mut loaded = 0;
        let mut pending = vec![dir.as_ref().to_path_buf()];

        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }

                match LayoutRecipe::load(&path) {
                    Ok(recipe) => {
                        tracing::debug!(
                            path = %path.display(),
                            variant = %recipe.variant,
                            build = %recipe.build,
                            "loaded layout recipe"
                        );
                        self.insert(recipe);
                        loaded += 1;
                    }
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "skipping layout file");
                    }
                }
            }
        }

        Ok(loaded)
    }

    /// The recipe for a variant and build.
    pub fn get(&self, variant: FileVariant, build: &str) -> Result<&LayoutRecipe> {
        self.recipes
            .get(&(variant, build.to_string()))
            .ok_or_else(|| Error::UnknownBuild {
                variant: variant.to_string(),
                build: build.to_string(),
            })
    }

    /// The recipe for the newest known build of a variant.
    ///
    /// Build names sort as strings, so `fm24` comes after `fm2302`.
    pub fn latest(&self, variant: FileVariant) -> Result<&LayoutRecipe> {
        self.recipes
            .iter()
            .filter(|((v, _), _)| *v == variant)
            .map(|(_, recipe)| recipe)
            .last()
            .ok_or_else(|| Error::UnknownBuild {
                variant: variant.to_string(),
                build: "(any)".to_string(),
            })
    }

    /// The recipe for `build`, or the newest one when `build` is `None`.
    pub fn find(&self, variant: FileVariant, build: Option<&str>) -> Result<&LayoutRecipe> {
        match build {
            Some(build) => self.get(variant, build),
            None => self.latest(variant),
        }
    }

    /// Known builds of a variant, oldest first.
    pub fn builds(&self, variant: FileVariant) -> Vec<&str> {
        self.recipes
            .keys()
            .filter(|(v, _)| *v == variant)
            .map(|(_, build)| build.as_str())
            .collect()
    }

    /// All recipes, ordered by variant and build.
    pub fn recipes(&self) -> impl Iterator<Item = &LayoutRecipe> {
        self.recipes.values()
    }

    /// Number of recipes.
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    /// Whether the registry holds no recipes.
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}
