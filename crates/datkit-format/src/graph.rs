//! The resource graph: an arena of directories and their resources.
//!
//! Directories are addressed by [`DirId`], an index into the graph's arena.
//! Each directory stores its parent index, so walking to the root is a
//! bounded loop rather than a chain of shared pointers.

use std::sync::atomic::{AtomicU64, Ordering};

use datkit_common::ResourceId;

use crate::container;
use crate::options::ParseOptions;
use crate::resource::{DirectoryHeader, Resource, ResourceKind, TypedResource};
use crate::texture::TextureResource;
use crate::{FxHashMap, Result};

/// Length of the global texture key.
const TEXTURE_KEY_LEN: usize = 8;

static NEXT_GRAPH: AtomicU64 = AtomicU64::new(0);

/// Index of a directory inside a [`ResourceGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirId(u32);

impl DirId {
    /// The arena index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A child slot in a directory.
#[derive(Debug)]
pub enum Child {
    /// A nested directory.
    Directory(DirId),
    /// A decoded resource.
    Resource(Box<Resource>),
}

/// A node in the resource namespace.
#[derive(Debug)]
pub struct Directory {
    header: DirectoryHeader,
    parent: Option<DirId>,
    children: FxHashMap<(ResourceKind, ResourceId), Child>,
    order: Vec<(ResourceKind, ResourceId)>,
}

impl Directory {
    fn new(header: DirectoryHeader, parent: Option<DirId>) -> Self {
        Self {
            header,
            parent,
            children: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    /// The id this directory was opened with.
    pub fn id(&self) -> ResourceId {
        self.header.id
    }

    /// Display name, if the section carried one.
    pub fn name(&self) -> Option<&str> {
        self.header.name.as_deref()
    }

    /// The parent directory, or `None` for a root.
    pub fn parent(&self) -> Option<DirId> {
        self.parent
    }

    /// Number of children of every kind.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether this directory has no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Look up a child by kind and id.
    pub fn child(&self, kind: ResourceKind, id: ResourceId) -> Option<&Child> {
        self.children.get(&(kind, id))
    }

    /// Iterate children in the order they were first added.
    pub fn children(&self) -> impl Iterator<Item = (ResourceKind, ResourceId, &Child)> + '_ {
        self.order
            .iter()
            .filter_map(|key| self.children.get(key).map(|child| (key.0, key.1, child)))
    }

    /// Iterate the decoded (non-directory) resources in this directory.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> + '_ {
        self.children().filter_map(|(_, _, child)| match child {
            Child::Resource(r) => Some(r.as_ref()),
            Child::Directory(_) => None,
        })
    }

    /// Iterate the immediate child directories.
    pub fn directories(&self) -> impl Iterator<Item = DirId> + '_ {
        self.children().filter_map(|(_, _, child)| match child {
            Child::Directory(d) => Some(*d),
            Child::Resource(_) => None,
        })
    }
}

/// The directory tree built from one or more DAT blobs.
///
/// # Example
///
/// ```no_run
/// use datkit_format::{ParseOptions, ResourceGraph, SkeletonResource};
///
/// let data = std::fs::read("human.dat")?;
/// let graph = ResourceGraph::load(&data, &ParseOptions::new("human.dat"))?;
///
/// for root in graph.roots() {
///     for skeleton in graph.collect::<SkeletonResource>(*root) {
///         println!("{} joints", skeleton.joints.len());
///     }
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct ResourceGraph {
    instance: u64,
    directories: Vec<Directory>,
    roots: Vec<DirId>,
    textures: FxHashMap<String, (DirId, ResourceId)>,
}

impl Default for ResourceGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            instance: NEXT_GRAPH.fetch_add(1, Ordering::Relaxed),
            directories: Vec::new(),
            roots: Vec::new(),
            textures: FxHashMap::default(),
        }
    }

    /// Identifies this graph among every graph created by the process.
    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// Decode a single blob into a fresh graph.
    pub fn load(data: &[u8], options: &ParseOptions) -> Result<Self> {
        let mut graph = Self::new();
        graph.load_into(data, options)?;
        Ok(graph)
    }

    /// Decode another blob into this graph.
    ///
    /// Roots and directories whose ids match ones already present are
    /// re-opened, so a resource split over several blobs merges into one
    /// subtree. Returns the root the blob was decoded under, or `None` if
    /// the blob held no sections.
    pub fn load_into(&mut self, data: &[u8], options: &ParseOptions) -> Result<Option<DirId>> {
        container::parse(self, data, options)
    }

    /// Top-level directories, in load order.
    pub fn roots(&self) -> &[DirId] {
        &self.roots
    }

    /// The first root, for the common single-blob case.
    pub fn root(&self) -> Option<DirId> {
        self.roots.first().copied()
    }

    /// Number of directories in the arena.
    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }

    /// Borrow a directory.
    ///
    /// `dir` must come from this graph.
    pub fn directory(&self, dir: DirId) -> &Directory {
        &self.directories[dir.index()]
    }

    /// The parent of `dir`, or `None` for a root.
    pub fn parent(&self, dir: DirId) -> Option<DirId> {
        self.directory(dir).parent
    }

    /// The child directory of `dir` with the given id.
    pub fn child_directory(&self, dir: DirId, id: ResourceId) -> Option<DirId> {
        match self.directory(dir).child(ResourceKind::Directory, id)? {
            Child::Directory(d) => Some(*d),
            Child::Resource(_) => None,
        }
    }

    /// Look up a resource in `dir` by kind and id.
    pub fn get(&self, dir: DirId, kind: ResourceKind, id: ResourceId) -> Option<&Resource> {
        match self.directory(dir).child(kind, id)? {
            Child::Resource(r) => Some(r),
            Child::Directory(_) => None,
        }
    }

    /// Look up a typed resource in `dir`.
    pub fn find<T: TypedResource>(&self, dir: DirId, id: ResourceId) -> Option<&T> {
        self.get(dir, T::KIND, id).and_then(T::from_resource)
    }

    /// Every directory below `dir`, depth-first, not including `dir` itself.
    pub fn subdirectories(&self, dir: DirId) -> Vec<DirId> {
        let mut out = Vec::new();
        let mut stack: Vec<DirId> = self.directory(dir).directories().collect();
        stack.reverse();

        while let Some(next) = stack.pop() {
            out.push(next);
            let start = stack.len();
            stack.extend(self.directory(next).directories());
            stack[start..].reverse();
        }

        out
    }

    /// Every resource of kind `kind` in `dir` and its subdirectories,
    /// paired with the directory that holds it.
    pub fn collect_kind(&self, dir: DirId, kind: ResourceKind) -> Vec<(DirId, &Resource)> {
        std::iter::once(dir)
            .chain(self.subdirectories(dir))
            .flat_map(|d| {
                self.directory(d)
                    .resources()
                    .filter(move |r| r.kind() == kind)
                    .map(move |r| (d, r))
            })
            .collect()
    }

    /// Every resource of type `T` in `dir` and its subdirectories.
    pub fn collect<T: TypedResource>(&self, dir: DirId) -> Vec<&T> {
        self.collect_kind(dir, T::KIND)
            .into_iter()
            .filter_map(|(_, r)| T::from_resource(r))
            .collect()
    }

    /// Resolve a texture name as seen from `dir`.
    ///
    /// Searches `dir`, then each ancestor, then the global namespace keyed by
    /// the normalized name.
    pub fn find_texture(&self, dir: DirId, name: &str) -> Option<&TextureResource> {
        self.locate_texture(dir, name)
            .and_then(|(d, id)| self.find::<TextureResource>(d, id))
    }

    /// Like [`find_texture`](Self::find_texture), returning where the texture lives.
    pub fn locate_texture(&self, dir: DirId, name: &str) -> Option<(DirId, ResourceId)> {
        let mut current = Some(dir);
        while let Some(d) = current {
            let directory = self.directory(d);
            let local = directory
                .resources()
                .filter_map(|r| match r {
                    Resource::Texture(t) => Some(t),
                    _ => None,
                })
                .find(|t| t.name.eq_ignore_ascii_case(name));
            if let Some(texture) = local {
                return Some((d, texture.id));
            }
            current = directory.parent;
        }

        self.textures.get(&texture_key(name)).copied()
    }

    /// Slash-separated path of directory ids from the root down to `dir`.
    pub fn path(&self, dir: DirId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(dir);
        while let Some(d) = current {
            parts.push(self.directory(d).id().to_string());
            current = self.parent(d);
        }
        parts.reverse();
        parts.join("/")
    }

    /// Open a directory scope under `parent`, or at top level.
    ///
    /// An existing child (or root) with the same id is re-opened and offered
    /// the new header; otherwise a new directory is linked in.
    pub(crate) fn open_directory(&mut self, parent: Option<DirId>, header: DirectoryHeader) -> DirId {
        let existing = match parent {
            Some(p) => self.child_directory(p, header.id),
            None => self
                .roots
                .iter()
                .copied()
                .find(|r| self.directory(*r).id() == header.id),
        };

        if let Some(dir) = existing {
            self.directories[dir.index()].header.combine(header);
            return dir;
        }

        let id = header.id;
        let dir = DirId(self.directories.len() as u32);
        self.directories.push(Directory::new(header, parent));

        match parent {
            Some(p) => {
                let node = &mut self.directories[p.index()];
                let key = (ResourceKind::Directory, id);
                if node.children.insert(key, Child::Directory(dir)).is_none() {
                    node.order.push(key);
                }
            }
            None => self.roots.push(dir),
        }

        dir
    }

    /// Add a decoded resource to `dir`, merging with a same-kind, same-id
    /// child through the resource's combine hook.
    pub(crate) fn attach(&mut self, dir: DirId, resource: Resource) {
        let key = (resource.kind(), resource.id());

        if let Resource::Texture(texture) = &resource {
            self.textures
                .entry(texture_key(&texture.name))
                .or_insert((dir, texture.id));
        }

        let node = &mut self.directories[dir.index()];
        match node.children.get_mut(&key) {
            Some(Child::Resource(existing)) => {
                if let Some(incoming) = existing.combine(resource) {
                    tracing::debug!(kind = %key.0, id = %key.1, "replacing resource");
                    **existing = incoming;
                }
            }
            Some(Child::Directory(_)) => {
                tracing::warn!(id = %key.1, "resource collides with a directory slot, ignored");
            }
            None => {
                node.children.insert(key, Child::Resource(Box::new(resource)));
                node.order.push(key);
            }
        }
    }
}

/// Normalize a texture name into its global-namespace key: the file stem,
/// lowercased, cut to eight characters.
pub fn texture_key(name: &str) -> String {
    let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem = match file.rfind('.') {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    };
    stem.chars()
        .take(TEXTURE_KEY_LEN)
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(tag: &str) -> DirectoryHeader {
        DirectoryHeader {
            id: ResourceId::from_tag(tag),
            name: None,
        }
    }

    #[test]
    fn test_texture_key() {
        assert_eq!(texture_key("Textures\\GrassLong01.dds"), "grasslon");
        assert_eq!(texture_key("rock"), "rock");
        assert_eq!(texture_key(".hidden"), ".hidden");
    }

    #[test]
    fn test_reopen_child() {
        let mut graph = ResourceGraph::new();
        let root = graph.open_directory(None, header("ROOT"));
        let a = graph.open_directory(Some(root), header("CHAR"));
        let b = graph.open_directory(Some(root), header("CHAR"));

        assert_eq!(a, b);
        assert_eq!(graph.directory_count(), 2);
        assert_eq!(graph.parent(a), Some(root));
        assert_eq!(graph.child_directory(root, ResourceId::from_tag("CHAR")), Some(a));
    }

    #[test]
    fn test_reopen_root_and_keep_name() {
        let mut graph = ResourceGraph::new();
        let first = graph.open_directory(None, header("ROOT"));
        let second = graph.open_directory(
            None,
            DirectoryHeader {
                id: ResourceId::from_tag("ROOT"),
                name: Some("world".into()),
            },
        );

        assert_eq!(first, second);
        assert_eq!(graph.roots().len(), 1);
        assert_eq!(graph.directory(first).name(), Some("world"));
    }

    #[test]
    fn test_subdirectories_depth_first() {
        let mut graph = ResourceGraph::new();
        let root = graph.open_directory(None, header("ROOT"));
        let a = graph.open_directory(Some(root), header("AAAA"));
        let a1 = graph.open_directory(Some(a), header("AAA1"));
        let b = graph.open_directory(Some(root), header("BBBB"));

        assert_eq!(graph.subdirectories(root), vec![a, a1, b]);
        assert_eq!(graph.path(a1), "ROOT/AAAA/AAA1");
    }
}
