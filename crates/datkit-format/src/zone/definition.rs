//! Zone definition sections (type 0x07).
//!
//! ```text
//! header   u32 object_count, object_offset, culling_count, culling_offset,
//!          tree_offset, light_offset, collision_offset
//! culling  culling_count x u32 table offsets; each table: u32 n, n x u16
//! object   u32be id, u32be mesh, vec3 position, vec3 rotation, f32 scale,
//!          f32 near, f32 far, u32 culling_offset, [u8; 4] effect,
//!          [u8; 4] environment, u32 flags, u32 reserved
//! lights   u32be ids until zero
//! ```
//!
//! Sub-structures are decoded in dependency order: culling tables first so
//! objects can resolve their table offsets, then objects, the space tree,
//! point lights and finally collision.

use datkit_common::glam::{Affine3A, EulerRot, Quat, Vec3};
use datkit_common::{ByteCursor, ResourceId};

use super::{collision, space_tree, ZoneResource};
use crate::options::ParseOptions;
use crate::resource::Resource;
use crate::section::SectionHeader;
use crate::{FxHashMap, Result};

const OBJECT_SIZE: usize = 64;
const MAX_POINT_LIGHTS: usize = 256;

/// A set of objects shown and hidden together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CullingTable {
    /// Body offset the table was stored at; objects refer to it by this.
    pub offset: u32,
    pub objects: Vec<u16>,
}

/// A placed instance of a zone mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneObject {
    pub id: ResourceId,
    pub mesh: ResourceId,
    pub position: Vec3,
    /// Yaw, pitch and roll in radians.
    pub rotation: Vec3,
    pub scale: f32,
    /// Distance at which the object starts drawing.
    pub near: f32,
    /// Distance beyond which the object is culled.
    pub far: f32,
    /// Index into [`ZoneResource::culling_tables`].
    pub culling: Option<usize>,
    pub effect: Option<ResourceId>,
    pub environment: Option<ResourceId>,
    pub flags: u32,
}

impl ZoneObject {
    /// Object space to world.
    pub fn transform(&self) -> Affine3A {
        let rotation = Quat::from_euler(EulerRot::YXZ, self.rotation.x, self.rotation.y, self.rotation.z);
        Affine3A::from_scale_rotation_translation(Vec3::splat(self.scale), rotation, self.position)
    }

    /// Whether the object is drawn at `distance` from the viewer.
    pub fn visible_at(&self, distance: f32) -> bool {
        distance >= self.near && distance <= self.far
    }
}

fn read_culling_tables(
    cursor: &mut ByteCursor<'_>,
    header: &SectionHeader,
    count: usize,
    offset: u32,
) -> Result<(Vec<CullingTable>, FxHashMap<u32, usize>)> {
    let limit = cursor.len();
    let mut tables = Vec::with_capacity(count);
    let mut by_offset = FxHashMap::default();

    cursor.seek(header.table(limit, "zone culling directory", offset, count, 4)?);
    for _ in 0..count {
        let table_offset = cursor.read_u32();
        if by_offset.contains_key(&table_offset) {
            continue;
        }

        let start = header.table(limit, "zone culling table", table_offset, 1, 4)?;
        let n = cursor.peek(start, ByteCursor::read_u32) as usize;
        let list = header.table(limit, "zone culling table", table_offset.saturating_add(4), n, 2)?;
        let objects = cursor.peek(list, |c| (0..n).map(|_| c.read_u16()).collect());

        by_offset.insert(table_offset, tables.len());
        tables.push(CullingTable {
            offset: table_offset,
            objects,
        });
    }

    Ok((tables, by_offset))
}

fn read_objects(
    cursor: &mut ByteCursor<'_>,
    header: &SectionHeader,
    count: usize,
    offset: u32,
    culling: &FxHashMap<u32, usize>,
) -> Result<Vec<ZoneObject>> {
    let limit = cursor.len();
    cursor.seek(header.table(limit, "zone objects", offset, count, OBJECT_SIZE)?);

    let mut objects = Vec::with_capacity(count);
    for _ in 0..count {
        let id = cursor.read_id_be();
        let mesh = cursor.read_id_be();
        let position = cursor.read_vec3();
        let rotation = cursor.read_vec3();
        let scale = cursor.read_f32();
        let near = cursor.read_f32();
        let far = cursor.read_f32();
        let culling_offset = cursor.read_u32();
        let effect = cursor.read_id().non_zero();
        let environment = cursor.read_id().non_zero();
        let flags = cursor.read_u32();
        cursor.advance(4);

        let culling = match culling_offset {
            0 => None,
            offset => {
                let found = culling.get(&offset).copied();
                if found.is_none() {
                    tracing::debug!(object = %id, offset, "culling table not found");
                }
                found
            }
        };

        objects.push(ZoneObject {
            id,
            mesh,
            position,
            rotation,
            scale,
            near,
            far,
            culling,
            effect,
            environment,
            flags,
        });
    }

    Ok(objects)
}

fn read_point_lights(cursor: &mut ByteCursor<'_>, header: &SectionHeader, offset: u32) -> Vec<ResourceId> {
    cursor.seek(header.at(offset));
    let mut lights = Vec::new();
    while lights.len() < MAX_POINT_LIGHTS && cursor.remaining() >= 4 {
        let id = cursor.read_id_be();
        if id.is_none() {
            break;
        }
        lights.push(id);
    }
    lights
}

pub(crate) fn decode(
    cursor: &mut ByteCursor<'_>,
    header: &SectionHeader,
    _options: &ParseOptions,
) -> Result<Option<Resource>> {
    let object_count = cursor.read_u32() as usize;
    let object_offset = cursor.read_u32();
    let culling_count = cursor.read_u32() as usize;
    let culling_offset = cursor.read_u32();
    let tree_offset = cursor.read_u32();
    let light_offset = cursor.read_u32();
    let collision_offset = cursor.read_u32();

    let (culling_tables, culling_by_offset) =
        read_culling_tables(cursor, header, culling_count, culling_offset)?;
    let objects = read_objects(cursor, header, object_count, object_offset, &culling_by_offset)?;

    let space_tree = match tree_offset {
        0 => None,
        offset => Some(space_tree::decode(cursor, header, offset, objects.len())?),
    };

    let point_lights = match light_offset {
        0 => Vec::new(),
        offset => read_point_lights(cursor, header, offset),
    };

    let collision = match collision_offset {
        0 => None,
        offset => Some(collision::decode(cursor, header, offset)?),
    };

    Ok(Some(Resource::Zone(ZoneResource::new(
        header.tag(),
        objects,
        culling_tables,
        space_tree,
        point_lights,
        collision,
    ))))
}
