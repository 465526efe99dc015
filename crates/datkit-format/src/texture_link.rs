//! Lazily resolved references from meshes to textures by name.

use std::sync::OnceLock;

use datkit_common::ResourceId;

use crate::graph::{DirId, ResourceGraph};
use crate::texture::TextureResource;

/// A texture name that resolves against a graph at most once.
///
/// The first [`resolve`](Self::resolve) performs the lookup and remembers
/// the outcome, including "not found", for the graph it was made against.
/// Resolving against any other graph looks the name up again without
/// touching the remembered result.
#[derive(Debug, Clone, Default)]
pub struct TextureLink {
    name: String,
    resolved: OnceLock<(u64, Option<(DirId, ResourceId)>)>,
}

impl TextureLink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolved: OnceLock::new(),
        }
    }

    /// The referenced texture name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a lookup has already happened.
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Resolve the name as seen from `dir`, the directory holding the mesh.
    pub fn resolve<'g>(&self, graph: &'g ResourceGraph, dir: DirId) -> Option<&'g TextureResource> {
        let (owner, target) = *self
            .resolved
            .get_or_init(|| (graph.instance(), self.lookup(graph, dir)));
        let target = if owner == graph.instance() {
            target
        } else {
            self.lookup(graph, dir)
        };
        target.and_then(|(d, id)| graph.find::<TextureResource>(d, id))
    }

    fn lookup(&self, graph: &ResourceGraph, dir: DirId) -> Option<(DirId, ResourceId)> {
        if self.name.is_empty() {
            return None;
        }
        let found = graph.locate_texture(dir, &self.name);
        if found.is_none() {
            tracing::debug!(texture = %self.name, "texture link unresolved");
        }
        found
    }
}
