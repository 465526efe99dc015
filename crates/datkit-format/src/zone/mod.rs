//! Zone definitions, zone meshes and ground queries.
//!
//! A zone definition places zone meshes in the world and carries the
//! collision data used by [`ZoneResource::ground_height`]. The collider is
//! built on first use and shared by every later query.

mod collider;
mod collision;
mod definition;
mod mesh;
mod space_tree;

use std::sync::OnceLock;

use datkit_common::glam::Affine3A;
use datkit_common::{ByteCursor, ResourceId};

pub use collider::{intersect_triangle, Ray, RayHit, ZoneCollider, DEFAULT_START_HEIGHT, GROUND_QUERY_RADIUS};
pub use collision::{
    CollisionData, CollisionGrid, CollisionGroup, CollisionMesh, CollisionObject, CollisionTriangle,
    TerrainType,
};
pub use definition::{CullingTable, ZoneObject};
pub use mesh::{triangle_tangent, ZoneMeshPart, ZoneMeshResource, ZoneVertex};
pub use space_tree::{SpaceNode, SpaceTree};

use crate::options::ParseOptions;
use crate::resource::Resource;
use crate::section::SectionHeader;
use crate::Result;

#[derive(Debug, Clone)]
pub struct ZoneResource {
    pub id: ResourceId,
    pub objects: Vec<ZoneObject>,
    pub culling_tables: Vec<CullingTable>,
    pub space_tree: Option<SpaceTree>,
    pub point_lights: Vec<ResourceId>,
    pub collision: Option<CollisionData>,
    inverse_transforms: OnceLock<Vec<Affine3A>>,
}

impl ZoneResource {
    pub fn new(
        id: ResourceId,
        objects: Vec<ZoneObject>,
        culling_tables: Vec<CullingTable>,
        space_tree: Option<SpaceTree>,
        point_lights: Vec<ResourceId>,
        collision: Option<CollisionData>,
    ) -> Self {
        Self {
            id,
            objects,
            culling_tables,
            space_tree,
            point_lights,
            collision,
            inverse_transforms: OnceLock::new(),
        }
    }

    pub fn object(&self, id: ResourceId) -> Option<&ZoneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn culling_table(&self, object: &ZoneObject) -> Option<&CullingTable> {
        object.culling.and_then(|i| self.culling_tables.get(i))
    }

    /// The collider, or `None` for zones without collision data.
    pub fn collider(&self) -> Option<ZoneCollider<'_>> {
        let data = self.collision.as_ref()?;
        let inverses = self
            .inverse_transforms
            .get_or_init(|| collider::invert_transforms(data));
        Some(ZoneCollider::new(data, inverses))
    }

    /// World Y of the ground at (x, z).
    pub fn ground_height(&self, x: f32, z: f32) -> Option<f32> {
        self.collider()?.ground_height(x, z)
    }

    /// World Y of the first ground surface at or below `y`.
    pub fn ground_height_from(&self, x: f32, y: f32, z: f32) -> Option<f32> {
        self.collider()?.ground_height_from(x, y, z)
    }
}

pub(crate) fn decode_definition(
    cursor: &mut ByteCursor<'_>,
    header: &SectionHeader,
    options: &ParseOptions,
) -> Result<Option<Resource>> {
    definition::decode(cursor, header, options)
}

pub(crate) fn decode_mesh(
    cursor: &mut ByteCursor<'_>,
    header: &SectionHeader,
    options: &ParseOptions,
) -> Result<Option<Resource>> {
    mesh::decode(cursor, header, options)
}
