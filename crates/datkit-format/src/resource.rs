//! Decoded resources and their kind tags.

use datkit_common::ResourceId;

use crate::animation::SkeletonAnimationResource;
use crate::environment::EnvironmentResource;
use crate::info::InfoResource;
use crate::skeleton::SkeletonResource;
use crate::skeleton_mesh::SkeletonMeshResource;
use crate::texture::TextureResource;
use crate::weighted_mesh::WeightedMeshResource;
use crate::zone::{ZoneMeshResource, ZoneResource};

/// The closed set of resource kinds a directory can hold.
///
/// Together with a [`ResourceId`] this keys a directory's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Directory,
    Texture,
    Skeleton,
    SkeletonMesh,
    SkeletonAnimation,
    WeightedMesh,
    Zone,
    ZoneMesh,
    Environment,
    Info,
}

impl ResourceKind {
    /// Every kind, in display order.
    pub const ALL: [ResourceKind; 10] = [
        Self::Directory,
        Self::Texture,
        Self::Skeleton,
        Self::SkeletonMesh,
        Self::SkeletonAnimation,
        Self::WeightedMesh,
        Self::Zone,
        Self::ZoneMesh,
        Self::Environment,
        Self::Info,
    ];

    /// Get the name of this kind.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Texture => "texture",
            Self::Skeleton => "skeleton",
            Self::SkeletonMesh => "skeleton-mesh",
            Self::SkeletonAnimation => "skeleton-animation",
            Self::WeightedMesh => "weighted-mesh",
            Self::Zone => "zone",
            Self::ZoneMesh => "zone-mesh",
            Self::Environment => "environment",
            Self::Info => "info",
        }
    }

    /// Parse a kind from its name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The header of a directory section: the scope a push opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryHeader {
    pub id: ResourceId,
    /// Display name stored in the section body, if any.
    pub name: Option<String>,
}

impl DirectoryHeader {
    /// Accept a re-opened header's contents as additions.
    pub fn combine(&mut self, incoming: DirectoryHeader) {
        if self.name.is_none() {
            self.name = incoming.name;
        }
    }
}

/// A decoded section.
#[derive(Debug)]
pub enum Resource {
    Directory(DirectoryHeader),
    Texture(TextureResource),
    Skeleton(SkeletonResource),
    SkeletonMesh(SkeletonMeshResource),
    SkeletonAnimation(SkeletonAnimationResource),
    WeightedMesh(WeightedMeshResource),
    Zone(ZoneResource),
    ZoneMesh(ZoneMeshResource),
    Environment(EnvironmentResource),
    Info(InfoResource),
}

impl Resource {
    /// The kind tag of this resource.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Directory(_) => ResourceKind::Directory,
            Self::Texture(_) => ResourceKind::Texture,
            Self::Skeleton(_) => ResourceKind::Skeleton,
            Self::SkeletonMesh(_) => ResourceKind::SkeletonMesh,
            Self::SkeletonAnimation(_) => ResourceKind::SkeletonAnimation,
            Self::WeightedMesh(_) => ResourceKind::WeightedMesh,
            Self::Zone(_) => ResourceKind::Zone,
            Self::ZoneMesh(_) => ResourceKind::ZoneMesh,
            Self::Environment(_) => ResourceKind::Environment,
            Self::Info(_) => ResourceKind::Info,
        }
    }

    /// The id this resource is filed under.
    pub fn id(&self) -> ResourceId {
        match self {
            Self::Directory(r) => r.id,
            Self::Texture(r) => r.id,
            Self::Skeleton(r) => r.id,
            Self::SkeletonMesh(r) => r.id,
            Self::SkeletonAnimation(r) => r.id,
            Self::WeightedMesh(r) => r.id,
            Self::Zone(r) => r.id,
            Self::ZoneMesh(r) => r.id,
            Self::Environment(r) => r.id,
            Self::Info(r) => r.id(),
        }
    }

    /// Offer `incoming` to this resource as an addition.
    ///
    /// Returns `None` when the two were combined, or hands `incoming` back
    /// when this kind does not combine, in which case the caller replaces.
    pub fn combine(&mut self, incoming: Resource) -> Option<Resource> {
        match (self, incoming) {
            (Self::Directory(existing), Self::Directory(new)) => {
                existing.combine(new);
                None
            }
            (_, incoming) => Some(incoming),
        }
    }
}

/// A resource struct that can be looked up by type.
pub trait TypedResource: Sized {
    /// The kind tag this type is stored under.
    const KIND: ResourceKind;

    /// Borrow the typed value out of a [`Resource`] of the matching kind.
    fn from_resource(resource: &Resource) -> Option<&Self>;
}

macro_rules! typed_resource {
    ($ty:ty, $variant:ident) => {
        impl TypedResource for $ty {
            const KIND: ResourceKind = ResourceKind::$variant;

            fn from_resource(resource: &Resource) -> Option<&Self> {
                match resource {
                    Resource::$variant(r) => Some(r),
                    _ => None,
                }
            }
        }
    };
}

typed_resource!(TextureResource, Texture);
typed_resource!(SkeletonResource, Skeleton);
typed_resource!(SkeletonMeshResource, SkeletonMesh);
typed_resource!(SkeletonAnimationResource, SkeletonAnimation);
typed_resource!(WeightedMeshResource, WeightedMesh);
typed_resource!(ZoneResource, Zone);
typed_resource!(ZoneMeshResource, ZoneMesh);
typed_resource!(EnvironmentResource, Environment);
typed_resource!(InfoResource, Info);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ResourceKind::from_name("ZONE"), Some(ResourceKind::Zone));
        assert_eq!(ResourceKind::from_name("nope"), None);
    }

    #[test]
    fn test_directory_combine_accepts() {
        let mut existing = Resource::Directory(DirectoryHeader {
            id: ResourceId::from_tag("ROOT"),
            name: None,
        });
        let incoming = Resource::Directory(DirectoryHeader {
            id: ResourceId::from_tag("ROOT"),
            name: Some("root".into()),
        });

        assert!(existing.combine(incoming).is_none());
        match existing {
            Resource::Directory(h) => assert_eq!(h.name.as_deref(), Some("root")),
            _ => unreachable!(),
        }
    }
}
