//! Skeleton mesh sections (type 0x04): skinned geometry.
//!
//! ```text
//! +0   u16  flags (bit 0: symmetric)
//! +2   u16  palette_count
//! +4   u32  palette_offset      u8 joint index per palette slot
//! +8   u16  single_count
//! +10  u16  double_count
//! +12  u32  single_offset       20-byte single-joint vertices
//! +16  u32  double_offset       28-byte two-joint vertices
//! +20  u32  program_offset      u16 instruction words
//! +24  u32  program_words
//! +28  u32  flip_offset         u8 palette -> mirrored palette slot
//! +32  u16  texture_count
//! +34  u16  pad
//! +36  u32  texture_offset      32-byte texture names
//! ```
//!
//! The instruction stream draws triangle lists and strips out of the two
//! vertex blocks. A vertex reference with bit 15 set indexes the double
//! block.

use datkit_common::glam::{Vec2, Vec3};
use datkit_common::{ByteCursor, ResourceId};

use crate::options::ParseOptions;
use crate::resource::Resource;
use crate::section::SectionHeader;
use crate::texture_link::TextureLink;
use crate::{Error, Result};

const FLAG_SYMMETRIC: u16 = 0x0001;
const SINGLE_SIZE: usize = 20;
const DOUBLE_SIZE: usize = 28;
const NAME_SIZE: usize = 32;
const DOUBLE_BIT: u16 = 0x8000;
const UV_SCALE: f32 = 2048.0;

const OP_END: u16 = 0x0000;
const OP_TEXTURE: u16 = 0x0001;
const OP_TEXTURED_LIST: u16 = 0x0010;
const OP_TEXTURED_STRIP: u16 = 0x0011;
const OP_LIST: u16 = 0x0020;
const OP_STRIP: u16 = 0x0021;

/// A vertex bound to up to two joints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkinnedVertex {
    pub position: Vec3,
    /// One normal per influencing joint. Single-joint vertices repeat it.
    pub normals: [Vec3; 2],
    /// Skeleton joint indices.
    pub joints: [u8; 2],
    /// Blend weights. Single-joint vertices are `[1.0, 0.0]`.
    pub weights: [f32; 2],
    pub uv: Vec2,
}

/// A triangle list emitted by one draw instruction.
#[derive(Debug, Clone)]
pub struct SkinnedMesh {
    pub texture: Option<TextureLink>,
    pub vertices: Vec<SkinnedVertex>,
    pub indices: Vec<u32>,
    /// Whether this is the generated mirror image of the previous mesh.
    pub mirrored: bool,
}

impl SkinnedMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[derive(Debug, Clone)]
pub struct SkeletonMeshResource {
    pub id: ResourceId,
    pub symmetric: bool,
    /// Palette slot to skeleton joint.
    pub palette: Vec<u8>,
    pub textures: Vec<String>,
    pub meshes: Vec<SkinnedMesh>,
}

/// A decoded vertex before palette lookup, so the mirror pass can remap it.
#[derive(Debug, Clone, Copy)]
struct RawVertex {
    position: Vec3,
    normals: [Vec3; 2],
    slots: [u8; 2],
    weights: [f32; 2],
}

struct MeshBuilder<'a> {
    header: &'a SectionHeader,
    palette: Vec<u8>,
    flip: Vec<u8>,
    singles: Vec<RawVertex>,
    doubles: Vec<RawVertex>,
    textures: Vec<String>,
    symmetric: bool,
    meshes: Vec<SkinnedMesh>,
}

impl MeshBuilder<'_> {
    fn vertex(&self, reference: u16, position: usize) -> Result<RawVertex> {
        let (block, index) = if reference & DOUBLE_BIT != 0 {
            (&self.doubles, usize::from(reference & !DOUBLE_BIT))
        } else {
            (&self.singles, usize::from(reference))
        };
        block
            .get(index)
            .copied()
            .ok_or_else(|| Error::unexpected("skeleton mesh vertex reference", reference, position))
    }

    fn skin(&self, raw: &RawVertex, uv: Vec2, mirror: bool) -> SkinnedVertex {
        let mut slots = raw.slots;
        let mut position = raw.position;
        let mut normals = raw.normals;

        if mirror {
            slots = slots.map(|s| self.flip[usize::from(s)]);
            position.x = -position.x;
            for n in &mut normals {
                n.x = -n.x;
            }
        }

        SkinnedVertex {
            position,
            normals,
            joints: slots.map(|s| self.palette[usize::from(s)]),
            weights: raw.weights,
            uv,
        }
    }

    fn emit(&mut self, texture: Option<usize>, strip: bool, raw: &[(RawVertex, Vec2)]) {
        let mut indices = Vec::new();
        if strip {
            for k in 0..raw.len().saturating_sub(2) {
                let k = k as u32;
                if k % 2 == 0 {
                    indices.extend_from_slice(&[k, k + 1, k + 2]);
                } else {
                    indices.extend_from_slice(&[k + 1, k, k + 2]);
                }
            }
        } else {
            if raw.len() % 3 != 0 {
                tracing::warn!(
                    mesh = %self.header.tag(),
                    vertices = raw.len(),
                    "triangle list length not a multiple of three, trailing vertices dropped"
                );
            }
            indices.extend(0..(raw.len() / 3 * 3) as u32);
        }

        let link = texture.map(|t| TextureLink::new(self.textures[t].clone()));
        let vertices = raw.iter().map(|(v, uv)| self.skin(v, *uv, false)).collect();
        let mirror = self.symmetric.then(|| {
            let vertices: Vec<_> = raw.iter().map(|(v, uv)| self.skin(v, *uv, true)).collect();
            let mut indices = indices.clone();
            for tri in indices.chunks_exact_mut(3) {
                tri.swap(1, 2);
            }
            SkinnedMesh {
                texture: link.clone(),
                vertices,
                indices,
                mirrored: true,
            }
        });

        self.meshes.push(SkinnedMesh {
            texture: link,
            vertices,
            indices,
            mirrored: false,
        });
        self.meshes.extend(mirror);
    }
}

fn check_slot(slot: u8, palette_count: usize, position: usize) -> Result<u8> {
    if usize::from(slot) < palette_count {
        Ok(slot)
    } else {
        Err(Error::unexpected("skeleton mesh palette index", slot, position))
    }
}

pub(crate) fn decode(
    cursor: &mut ByteCursor<'_>,
    header: &SectionHeader,
    _options: &ParseOptions,
) -> Result<Option<Resource>> {
    let limit = cursor.len();
    let flags = cursor.read_u16();
    let palette_count = usize::from(cursor.read_u16());
    let palette_offset = cursor.read_u32();
    let single_count = usize::from(cursor.read_u16());
    let double_count = usize::from(cursor.read_u16());
    let single_offset = cursor.read_u32();
    let double_offset = cursor.read_u32();
    let program_offset = cursor.read_u32();
    let program_words = cursor.read_u32() as usize;
    let flip_offset = cursor.read_u32();
    let texture_count = usize::from(cursor.read_u16());
    cursor.advance(2);
    let texture_offset = cursor.read_u32();

    let symmetric = flags & FLAG_SYMMETRIC != 0;

    cursor.seek(header.table(limit, "skeleton mesh palette", palette_offset, palette_count, 1)?);
    let palette = cursor.read_bytes_clamped(palette_count).to_vec();

    let flip = if symmetric && flip_offset != 0 {
        cursor.seek(header.table(limit, "skeleton mesh flip table", flip_offset, palette_count, 1)?);
        let mut flip = Vec::with_capacity(palette_count);
        for _ in 0..palette_count {
            let position = cursor.position();
            flip.push(check_slot(cursor.read_u8(), palette_count, position)?);
        }
        flip
    } else {
        (0..palette_count).map(|i| i as u8).collect()
    };

    cursor.seek(header.table(limit, "skeleton mesh single vertices", single_offset, single_count, SINGLE_SIZE)?);
    let mut singles = Vec::with_capacity(single_count);
    for _ in 0..single_count {
        let position = cursor.read_vec3();
        let normal = cursor.read_packed_normal();
        let at = cursor.position();
        let slot = check_slot(cursor.read_u8(), palette_count, at)?;
        cursor.advance(1);
        singles.push(RawVertex {
            position,
            normals: [normal, normal],
            slots: [slot, slot],
            weights: [1.0, 0.0],
        });
    }

    cursor.seek(header.table(limit, "skeleton mesh double vertices", double_offset, double_count, DOUBLE_SIZE)?);
    let mut doubles = Vec::with_capacity(double_count);
    for _ in 0..double_count {
        let position = cursor.read_vec3();
        let n0 = cursor.read_packed_normal();
        let n1 = cursor.read_packed_normal();
        let at = cursor.position();
        let s0 = check_slot(cursor.read_u8(), palette_count, at)?;
        let s1 = check_slot(cursor.read_u8(), palette_count, at + 1)?;
        let w0 = f32::from(cursor.read_u8()) / 255.0;
        let w1 = f32::from(cursor.read_u8()) / 255.0;
        doubles.push(RawVertex {
            position,
            normals: [n0, n1],
            slots: [s0, s1],
            weights: [w0, w1],
        });
    }

    cursor.seek(header.table(limit, "skeleton mesh textures", texture_offset, texture_count, NAME_SIZE)?);
    let textures = (0..texture_count)
        .map(|_| cursor.read_fixed_string(NAME_SIZE))
        .collect();

    let mut builder = MeshBuilder {
        header,
        palette,
        flip,
        singles,
        doubles,
        textures,
        symmetric,
        meshes: Vec::new(),
    };

    let program_start = header.table(limit, "skeleton mesh program", program_offset, program_words, 2)?;
    let program_end = program_start + program_words * 2;
    cursor.seek(program_start);

    let mut texture: Option<usize> = None;
    while cursor.position() < program_end {
        let op_position = cursor.position();
        match cursor.read_u16() {
            OP_END => break,
            OP_TEXTURE => {
                let index = cursor.read_u16();
                if usize::from(index) >= texture_count {
                    return Err(Error::unexpected("skeleton mesh texture index", index, op_position));
                }
                texture = Some(usize::from(index));
            }
            op @ (OP_TEXTURED_LIST | OP_TEXTURED_STRIP | OP_LIST | OP_STRIP) => {
                let textured = matches!(op, OP_TEXTURED_LIST | OP_TEXTURED_STRIP);
                let strip = matches!(op, OP_TEXTURED_STRIP | OP_STRIP);
                let count = usize::from(cursor.read_u16());

                let mut raw = Vec::with_capacity(count);
                for _ in 0..count {
                    let at = cursor.position();
                    let reference = cursor.read_u16();
                    let uv = if textured {
                        let u = f32::from(cursor.read_i16()) / UV_SCALE;
                        let v = f32::from(cursor.read_i16()) / UV_SCALE;
                        Vec2::new(u, v)
                    } else {
                        Vec2::ZERO
                    };
                    raw.push((builder.vertex(reference, at)?, uv));
                }
                if cursor.position() > program_end {
                    return Err(Error::unexpected(
                        "skeleton mesh draw instruction",
                        format!("{count} vertices overrun the program"),
                        op_position,
                    ));
                }

                builder.emit(if textured { texture } else { None }, strip, &raw);
            }
            other => {
                return Err(Error::unexpected("skeleton mesh opcode", format!("{other:#06x}"), op_position));
            }
        }
    }

    Ok(Some(Resource::SkeletonMesh(SkeletonMeshResource {
        id: header.tag(),
        symmetric,
        palette: builder.palette,
        textures: builder.textures,
        meshes: builder.meshes,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{frame, header_for, ByteBuilder};

    const HEADER_SIZE: u32 = 40;

    struct Layout {
        symmetric: bool,
        program: Vec<u16>,
    }

    /// Palette of two joints (7, 9), flip swaps them. Three single vertices
    /// and one double vertex. One texture.
    fn body(layout: &Layout) -> Vec<u8> {
        let palette_offset = HEADER_SIZE;
        let flip_offset = palette_offset + 4;
        let single_offset = flip_offset + 4;
        let double_offset = single_offset + 3 * SINGLE_SIZE as u32;
        let texture_offset = double_offset + DOUBLE_SIZE as u32;
        let program_offset = texture_offset + NAME_SIZE as u32;

        let mut b = ByteBuilder::new();
        b.u16(u16::from(layout.symmetric))
            .u16(2)
            .u32(palette_offset)
            .u16(3)
            .u16(1)
            .u32(single_offset)
            .u32(double_offset)
            .u32(program_offset)
            .u32(layout.program.len() as u32)
            .u32(flip_offset)
            .u16(1)
            .u16(0)
            .u32(texture_offset);
        b.bytes(&[7, 9, 0, 0]);
        b.bytes(&[1, 0, 0, 0]);
        for (x, slot) in [(1.0, 0u8), (2.0, 0), (3.0, 1)] {
            b.vec3(x, 0.0, 0.0).i16(32767).i16(0).i16(0).u8(slot).u8(0);
        }
        b.vec3(4.0, 1.0, 0.0)
            .i16(0)
            .i16(32767)
            .i16(0)
            .i16(0)
            .i16(0)
            .i16(32767)
            .u8(0)
            .u8(1)
            .u8(255)
            .u8(0);
        b.name("skin.dds", NAME_SIZE);
        for word in &layout.program {
            b.u16(*word);
        }
        b.build()
    }

    fn run(layout: &Layout) -> Result<SkeletonMeshResource> {
        let body = body(layout);
        let data = frame("SMSH", 0x04, &body);
        let header = header_for("SMSH", 0x04, &body);
        let mut cursor = ByteCursor::new_at(&data, header.data_start());
        match decode(&mut cursor, &header, &ParseOptions::default())? {
            Some(Resource::SkeletonMesh(m)) => Ok(m),
            other => panic!("expected a skeleton mesh, got {other:?}"),
        }
    }

    fn textured(vertex_refs: &[u16]) -> Vec<u16> {
        vertex_refs
            .iter()
            .flat_map(|&r| [r, 0, 2048])
            .collect()
    }

    #[test]
    fn test_textured_list() {
        let mut program = vec![OP_TEXTURE, 0, OP_TEXTURED_LIST, 3];
        program.extend(textured(&[0, 1, 0x8000]));
        program.push(OP_END);

        let mesh = run(&Layout {
            symmetric: false,
            program,
        })
        .unwrap();

        assert_eq!(mesh.meshes.len(), 1);
        let m = &mesh.meshes[0];
        assert_eq!(m.texture.as_ref().map(TextureLink::name), Some("skin.dds"));
        assert_eq!(m.indices, vec![0, 1, 2]);
        assert_eq!(m.vertices[0].joints, [7, 7]);
        assert_eq!(m.vertices[0].uv, Vec2::new(0.0, 1.0));
        assert_eq!(m.vertices[2].joints, [7, 9]);
        assert_eq!(m.vertices[2].weights, [1.0, 0.0]);
    }

    #[test]
    fn test_strip_alternates_winding() {
        let program = vec![OP_STRIP, 4, 0, 1, 2, 0x8000, OP_END];
        let mesh = run(&Layout {
            symmetric: false,
            program,
        })
        .unwrap();

        let m = &mesh.meshes[0];
        assert!(m.texture.is_none());
        assert_eq!(m.indices, vec![0, 1, 2, 2, 1, 3]);
    }

    #[test]
    fn test_symmetric_emits_mirror() {
        let program = vec![OP_LIST, 3, 0, 1, 2, OP_END];
        let mesh = run(&Layout {
            symmetric: true,
            program,
        })
        .unwrap();

        assert_eq!(mesh.meshes.len(), 2);
        let (original, mirror) = (&mesh.meshes[0], &mesh.meshes[1]);
        assert!(mirror.mirrored);
        assert_eq!(mirror.indices, vec![0, 2, 1]);
        assert_eq!(mirror.vertices[0].position.x, -original.vertices[0].position.x);
        assert_eq!(mirror.vertices[0].normals[0].x, -1.0);
        // Slot 0 flips to slot 1, joint 7 becomes joint 9.
        assert_eq!(original.vertices[0].joints, [7, 7]);
        assert_eq!(mirror.vertices[0].joints, [9, 9]);
    }

    #[test]
    fn test_bad_vertex_reference_is_fatal() {
        let program = vec![OP_LIST, 3, 0, 1, 5, OP_END];
        let result = run(&Layout {
            symmetric: false,
            program,
        });
        assert!(matches!(result, Err(Error::UnexpectedValue { .. })));
    }

    #[test]
    fn test_unknown_opcode_is_fatal() {
        let result = run(&Layout {
            symmetric: false,
            program: vec![0x0042, OP_END],
        });
        assert!(result.is_err());
    }
}
