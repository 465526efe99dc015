//! Zone mesh sections (type 0x08): static zone geometry, one part per
//! texture.
//!
//! ```text
//! vec3 min, max              visual bounds
//! vec3 min, max              collision bounds
//! u32  mesh_count, mesh_table
//! part name32 texture, u32 vertex_count, vertex_offset, index_count, index_offset
//! vertex vec3 position, vec3 normal, vec2 uv, rgba8 color
//! ```

use datkit_common::glam::{Vec2, Vec3};
use datkit_common::{ByteCursor, ResourceId, Rgba};

use crate::bounds::BoundingBox;
use crate::options::ParseOptions;
use crate::resource::Resource;
use crate::section::SectionHeader;
use crate::texture_link::TextureLink;
use crate::{Error, Result};

const NAME_SIZE: usize = 32;
const PART_SIZE: usize = 48;
const VERTEX_SIZE: usize = 36;
const UV_EPSILON: f32 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub color: Rgba,
}

/// Geometry drawn with a single texture.
#[derive(Debug, Clone)]
pub struct ZoneMeshPart {
    pub texture: TextureLink,
    pub vertices: Vec<ZoneVertex>,
    pub indices: Vec<u32>,
    /// One tangent per triangle.
    pub tangents: Vec<Vec3>,
}

impl ZoneMeshPart {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [&ZoneVertex; 3]> + '_ {
        self.indices.chunks_exact(3).map(|tri| {
            [
                &self.vertices[tri[0] as usize],
                &self.vertices[tri[1] as usize],
                &self.vertices[tri[2] as usize],
            ]
        })
    }
}

#[derive(Debug, Clone)]
pub struct ZoneMeshResource {
    pub id: ResourceId,
    pub bounds: BoundingBox,
    pub collision_bounds: BoundingBox,
    pub parts: Vec<ZoneMeshPart>,
}

impl ZoneMeshResource {
    /// A mesh with bounds only, used as an invisible trigger volume.
    pub fn is_hit_volume(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Tangent along increasing U for the triangle `(a, b, c)`.
///
/// Triangles whose UVs do not span an area fall back to +X.
pub fn triangle_tangent(a: &ZoneVertex, b: &ZoneVertex, c: &ZoneVertex) -> Vec3 {
    let e1 = b.position - a.position;
    let e2 = c.position - a.position;
    let d1 = b.uv - a.uv;
    let d2 = c.uv - a.uv;

    let det = d1.x * d2.y - d2.x * d1.y;
    if det.abs() < UV_EPSILON {
        return Vec3::X;
    }

    let tangent = (e1 * d2.y - e2 * d1.y) / det;
    let tangent = tangent.normalize_or_zero();
    if tangent == Vec3::ZERO {
        Vec3::X
    } else {
        tangent
    }
}

fn read_part(
    cursor: &mut ByteCursor<'_>,
    header: &SectionHeader,
    limit: usize,
    color_scale: f32,
) -> Result<ZoneMeshPart> {
    let texture = cursor.read_fixed_string(NAME_SIZE);
    let vertex_count = cursor.read_u32() as usize;
    let vertex_offset = cursor.read_u32();
    let index_count = cursor.read_u32() as usize;
    let index_offset = cursor.read_u32();

    let start = header.table(limit, "zone mesh vertices", vertex_offset, vertex_count, VERTEX_SIZE)?;
    let vertices: Vec<ZoneVertex> = cursor.peek(start, |c| {
        (0..vertex_count)
            .map(|_| ZoneVertex {
                position: c.read_vec3(),
                normal: c.read_vec3(),
                uv: c.read_vec2(),
                color: c.read_rgba8(color_scale),
            })
            .collect()
    });

    if index_count % 3 != 0 {
        tracing::warn!(
            mesh = %header.tag(),
            texture = %texture,
            index_count,
            "index count not a multiple of three, trailing indices ignored"
        );
    }

    let start = header.table(limit, "zone mesh indices", index_offset, index_count, 2)?;
    let indices = cursor.peek(start, |c| -> Result<Vec<u32>> {
        let mut indices = Vec::with_capacity(index_count);
        for _ in 0..index_count {
            let position = c.position();
            let index = c.read_u16();
            if usize::from(index) >= vertex_count {
                return Err(Error::unexpected("zone mesh index", index, position));
            }
            indices.push(u32::from(index));
        }
        Ok(indices)
    })?;

    let tangents = indices
        .chunks_exact(3)
        .map(|tri| {
            triangle_tangent(
                &vertices[tri[0] as usize],
                &vertices[tri[1] as usize],
                &vertices[tri[2] as usize],
            )
        })
        .collect();

    Ok(ZoneMeshPart {
        texture: TextureLink::new(texture),
        vertices,
        indices,
        tangents,
    })
}

pub(crate) fn decode(
    cursor: &mut ByteCursor<'_>,
    header: &SectionHeader,
    options: &ParseOptions,
) -> Result<Option<Resource>> {
    let limit = cursor.len();
    let bounds = BoundingBox::read(cursor);
    let collision_bounds = BoundingBox::read(cursor);
    let mesh_count = cursor.read_u32() as usize;
    let mesh_table = cursor.read_u32();

    let mut parts = Vec::with_capacity(mesh_count);
    if mesh_count > 0 {
        cursor.seek(header.table(limit, "zone mesh parts", mesh_table, mesh_count, PART_SIZE)?);
        let color_scale = options.zone_color_divisor();
        for _ in 0..mesh_count {
            parts.push(read_part(cursor, header, limit, color_scale)?);
        }
    }

    Ok(Some(Resource::ZoneMesh(ZoneMeshResource {
        id: header.tag(),
        bounds,
        collision_bounds,
        parts,
    })))
}
