//! Match declared layers against the discovered file pool.
//!
//! Matching is exact equality between the normalised file key and the
//! lower-cased declared name (or one of its aliases). Substring containment
//! is never used: it lets `road` claim `crossroads.asc`.

use std::path::{Path, PathBuf};

use bevy::prelude::*;

use crate::discovery::DiscoveredFile;
use crate::error::{SetupError, SetupResult};
use crate::layer_spec::{LayerAliases, LayerSpec};
use crate::normalizer::normalize;
use crate::output_area::OutputArea;

/// A declared layer whose source file has been copied into the output area.
///
/// Only [`LayerResolver`] creates these, and only after the copy succeeded,
/// so anything built from a `ResolvedLayer` refers to a file that exists next
/// to the manifests.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLayer {
    spec: LayerSpec,
    file_name: String,
    copied_to: PathBuf,
}

impl ResolvedLayer {
    pub fn spec(&self) -> &LayerSpec {
        &self.spec
    }

    /// Base name of the copied file, as written into manifests.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn copied_to(&self) -> &Path {
        &self.copied_to
    }
}

pub struct LayerResolver<'a> {
    files: &'a [DiscoveredFile],
    keys: Vec<String>,
    aliases: &'a LayerAliases,
}

impl<'a> LayerResolver<'a> {
    pub fn new(files: &'a [DiscoveredFile], aliases: &'a LayerAliases) -> Self {
        let keys = files
            .iter()
            .map(|f| normalize(&f.path.to_string_lossy()))
            .collect();
        Self {
            files,
            keys,
            aliases,
        }
    }

    fn accepts(&self, declared: &str, key: &str) -> bool {
        key == declared.to_lowercase() || self.aliases.for_name(declared).iter().any(|a| a == key)
    }

    /// First file in scan order whose key matches `declared`.
    ///
    /// When several files match, the first wins and the rest are reported.
    pub fn find(&self, declared: &str) -> Option<&'a DiscoveredFile> {
        let mut matches = self
            .files
            .iter()
            .zip(&self.keys)
            .filter(|(_, key)| self.accepts(declared, key))
            .map(|(file, _)| file);
        let first = matches.next()?;
        let ignored: Vec<String> = matches.map(|f| f.path.display().to_string()).collect();
        if !ignored.is_empty() {
            warn!(
                "Layer '{}' matched {} files; using {} and ignoring {:?}",
                declared,
                ignored.len() + 1,
                first.path.display(),
                ignored
            );
        }
        Some(first)
    }

    fn copy_match(
        &self,
        spec: &LayerSpec,
        file: &DiscoveredFile,
        area: &OutputArea,
    ) -> SetupResult<ResolvedLayer> {
        let file_name = file.base_name();
        let copied_to = area.copy_in(&file.path, &file_name)?;
        info!("Layer '{}' resolved to {}", spec.name, file.path.display());
        Ok(ResolvedLayer {
            spec: spec.clone(),
            file_name,
            copied_to,
        })
    }

    /// Resolve an optional layer. A miss is logged and returns `Ok(None)`.
    pub fn resolve(
        &self,
        spec: &LayerSpec,
        area: &OutputArea,
    ) -> SetupResult<Option<ResolvedLayer>> {
        match self.find(&spec.name) {
            Some(file) => self.copy_match(spec, file, area).map(Some),
            None => {
                warn!("No input file found for layer '{}'; omitting it", spec.name);
                Ok(None)
            }
        }
    }

    /// Resolve a layer that must exist. A miss is fatal.
    pub fn resolve_mandatory(
        &self,
        spec: &LayerSpec,
        area: &OutputArea,
    ) -> SetupResult<ResolvedLayer> {
        let file = self
            .find(&spec.name)
            .ok_or_else(|| SetupError::MandatoryLayerUnmatched {
                name: spec.name.clone(),
            })?;
        self.copy_match(spec, file, area)
    }
}
