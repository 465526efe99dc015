//! Weighted mesh sections (type 0x06): morph-style blended geometry.
//!
//! Each chunk is a full copy of the vertex positions and normals. A caller
//! picks a weight per chunk and [`WeightedMeshResource::blend`] mixes them.

use datkit_common::glam::{Vec2, Vec3};
use datkit_common::{ByteCursor, ResourceId, Rgba};

use crate::options::ParseOptions;
use crate::resource::Resource;
use crate::section::SectionHeader;
use crate::texture_link::TextureLink;
use crate::{Error, Result};

const NAME_SIZE: usize = 32;
const CHUNK_VERTEX_SIZE: usize = 24;
const WEIGHT_EPSILON: f32 = 1e-6;

/// Positions and normals for one blend target.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedChunk {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
}

/// A vertex produced by blending.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendedVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub color: Rgba,
}

#[derive(Debug, Clone)]
pub struct WeightedMeshResource {
    pub id: ResourceId,
    pub texture: TextureLink,
    pub chunks: Vec<WeightedChunk>,
    pub colors: Option<Vec<Rgba>>,
    pub uvs: Option<Vec<Vec2>>,
    pub indices: Vec<u16>,
}

impl WeightedMeshResource {
    pub fn vertex_count(&self) -> usize {
        self.chunks.first().map_or(0, |c| c.positions.len())
    }

    /// Normalize `weights` against the chunk count.
    ///
    /// Extra weights are ignored and missing ones count as zero. Weights
    /// summing to roughly zero select the first chunk alone.
    pub fn normalized_weights(&self, weights: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0; self.chunks.len()];
        for (slot, w) in out.iter_mut().zip(weights) {
            *slot = *w;
        }

        let sum: f32 = out.iter().sum();
        if sum.abs() < WEIGHT_EPSILON {
            out.fill(0.0);
            if let Some(first) = out.first_mut() {
                *first = 1.0;
            }
        } else {
            for w in &mut out {
                *w /= sum;
            }
        }
        out
    }

    /// Blend the chunks into one vertex buffer.
    pub fn blend_vertices(&self, weights: &[f32]) -> Vec<BlendedVertex> {
        let weights = self.normalized_weights(weights);

        (0..self.vertex_count())
            .map(|i| {
                let mut position = Vec3::ZERO;
                let mut normal = Vec3::ZERO;
                for (chunk, w) in self.chunks.iter().zip(&weights) {
                    position += chunk.positions[i] * *w;
                    normal += chunk.normals[i] * *w;
                }

                BlendedVertex {
                    position,
                    normal: normal.normalize_or_zero(),
                    uv: self
                        .uvs
                        .as_ref()
                        .and_then(|uv| uv.get(i).copied())
                        .unwrap_or(Vec2::ZERO),
                    color: self
                        .colors
                        .as_ref()
                        .and_then(|c| c.get(i).copied())
                        .unwrap_or(Rgba::WHITE),
                }
            })
            .collect()
    }

    /// Blend the chunks and assemble triangles.
    pub fn blend(&self, weights: &[f32]) -> Vec<[BlendedVertex; 3]> {
        let vertices = self.blend_vertices(weights);
        self.indices
            .chunks_exact(3)
            .map(|tri| tri_vertices(tri, &vertices))
            .collect()
    }
}

fn tri_vertices(tri: &[u16], vertices: &[BlendedVertex]) -> [BlendedVertex; 3] {
    [
        vertices[usize::from(tri[0])],
        vertices[usize::from(tri[1])],
        vertices[usize::from(tri[2])],
    ]
}

pub(crate) fn decode(
    cursor: &mut ByteCursor<'_>,
    header: &SectionHeader,
    _options: &ParseOptions,
) -> Result<Option<Resource>> {
    let limit = cursor.len();
    let chunk_count = usize::from(cursor.read_u16());
    let vertex_count = usize::from(cursor.read_u16());
    let index_count = cursor.read_u32() as usize;
    let chunk_table = cursor.read_u32();
    let color_offset = cursor.read_u32();
    let uv_offset = cursor.read_u32();
    let index_offset = cursor.read_u32();
    let texture = cursor.read_fixed_string(NAME_SIZE);

    cursor.seek(header.table(limit, "weighted mesh chunk table", chunk_table, chunk_count, 4)?);
    let mut chunks = Vec::with_capacity(chunk_count);
    for _ in 0..chunk_count {
        let offset = cursor.read_u32();
        let start = header.table(limit, "weighted mesh chunk", offset, vertex_count, CHUNK_VERTEX_SIZE)?;
        let chunk = cursor.peek(start, |c| {
            let mut positions = Vec::with_capacity(vertex_count);
            let mut normals = Vec::with_capacity(vertex_count);
            for _ in 0..vertex_count {
                positions.push(c.read_vec3());
                normals.push(c.read_vec3());
            }
            WeightedChunk { positions, normals }
        });
        chunks.push(chunk);
    }

    let colors = if color_offset != 0 {
        cursor.seek(header.table(limit, "weighted mesh colours", color_offset, vertex_count, 4)?);
        Some((0..vertex_count).map(|_| cursor.read_rgba8(255.0)).collect())
    } else {
        None
    };

    let uvs = if uv_offset != 0 {
        cursor.seek(header.table(limit, "weighted mesh uvs", uv_offset, vertex_count, 8)?);
        Some((0..vertex_count).map(|_| cursor.read_vec2()).collect())
    } else {
        None
    };

    if index_count % 3 != 0 {
        tracing::warn!(
            mesh = %header.tag(),
            index_count,
            "index count not a multiple of three, trailing indices ignored"
        );
    }

    cursor.seek(header.table(limit, "weighted mesh indices", index_offset, index_count, 2)?);
    let mut indices = Vec::with_capacity(index_count);
    for _ in 0..index_count {
        let position = cursor.position();
        let index = cursor.read_u16();
        if usize::from(index) >= vertex_count {
            return Err(Error::unexpected("weighted mesh index", index, position));
        }
        indices.push(index);
    }

    Ok(Some(Resource::WeightedMesh(WeightedMeshResource {
        id: header.tag(),
        texture: TextureLink::new(texture),
        chunks,
        colors,
        uvs,
        indices,
    })))
}
