//! Zone collision data: meshes, transforms, groups and the block grid.
//!
//! ```text
//! header     u32 blocks_wide, blocks_long, sub_x, sub_z
//!            f32 cell_size, origin_x, origin_z
//!            u32 group_count, group_table, grid_offset
//! group      u32 n, n x { u32 transform_offset, u32 mesh_offset }
//! transform  12 x f32, column-major 3x4, collision space -> world
//! mesh       u32 vertex_count, triangle_count, vec3 vertices,
//!            { u16 a, b, c, u8 terrain, u8 flags } triangles
//! grid       (blocks_wide * sub_x) x (blocks_long * sub_z) u32 group offsets
//! ```
//!
//! Meshes, transforms and groups are shared by offset and decoded once.

use datkit_common::glam::{Affine3A, Mat3, Vec3};
use datkit_common::ByteCursor;

use crate::section::SectionHeader;
use crate::{Error, FxHashMap, Result};

const FLAG_HIT_WALL: u8 = 0x01;
const MESH_HEADER_SIZE: usize = 8;
const TRIANGLE_SIZE: usize = 8;
const VERTEX_SIZE: usize = 12;
const TRANSFORM_SIZE: usize = 48;

/// Surface material of a collision triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerrainType {
    Default,
    Stone,
    Grass,
    Dirt,
    Sand,
    Wood,
    Water,
    Snow,
    Metal,
    Lava,
    Unknown(u8),
}

impl TerrainType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Default,
            1 => Self::Stone,
            2 => Self::Grass,
            3 => Self::Dirt,
            4 => Self::Sand,
            5 => Self::Wood,
            6 => Self::Water,
            7 => Self::Snow,
            8 => Self::Metal,
            9 => Self::Lava,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionTriangle {
    pub vertices: [Vec3; 3],
    /// Unit normal, or zero for a degenerate triangle.
    pub normal: Vec3,
    pub terrain: TerrainType,
    /// Walls block movement but are never stood on.
    pub hit_wall: bool,
}

impl CollisionTriangle {
    pub fn new(vertices: [Vec3; 3], terrain: TerrainType, hit_wall: bool) -> Self {
        let [a, b, c] = vertices;
        Self {
            vertices,
            normal: (b - a).cross(c - a).normalize_or_zero(),
            terrain,
            hit_wall,
        }
    }
}

/// A triangle soup in collision space.
///
/// Triangles are ordered by descending `|normal.y|`, so flatter surfaces are
/// tested first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollisionMesh {
    pub triangles: Vec<CollisionTriangle>,
}

impl CollisionMesh {
    pub fn new(mut triangles: Vec<CollisionTriangle>) -> Self {
        triangles.sort_by(|a, b| b.normal.y.abs().total_cmp(&a.normal.y.abs()));
        Self { triangles }
    }
}

/// A mesh placed by a transform. Both are indices into [`CollisionData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionObject {
    pub mesh: usize,
    pub transform: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CollisionGroup {
    pub objects: Vec<CollisionObject>,
}

/// Maps world (x, z) to collision groups.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionGrid {
    pub blocks_wide: u32,
    pub blocks_long: u32,
    pub sub_x: u32,
    pub sub_z: u32,
    pub cell_size: f32,
    pub origin_x: f32,
    pub origin_z: f32,
    /// Row-major by z; `None` for empty cells.
    pub cells: Vec<Option<usize>>,
}

impl CollisionGrid {
    /// Cells along x.
    pub fn width(&self) -> usize {
        self.blocks_wide as usize * self.sub_x as usize
    }

    /// Cells along z.
    pub fn depth(&self) -> usize {
        self.blocks_long as usize * self.sub_z as usize
    }

    /// Whether the cell size can map world positions to cells at all.
    pub fn is_usable(&self) -> bool {
        self.cell_size.is_finite() && self.cell_size > 0.0
    }

    /// Cell coordinates of a world position. May lie outside the grid.
    ///
    /// `None` when the grid is not usable or the position does not map to a
    /// finite cell.
    pub fn cell_coords(&self, x: f32, z: f32) -> Option<(i64, i64)> {
        if !self.is_usable() {
            return None;
        }
        let fx = ((x - self.origin_x) / self.cell_size).floor();
        let fz = ((z - self.origin_z) / self.cell_size).floor();
        if !fx.is_finite() || !fz.is_finite() {
            return None;
        }
        Some((fx as i64, fz as i64))
    }

    /// The group in a cell, if the cell is inside the grid and not empty.
    pub fn group_at(&self, cx: i64, cz: i64) -> Option<usize> {
        let (x, z) = (usize::try_from(cx).ok()?, usize::try_from(cz).ok()?);
        if x >= self.width() || z >= self.depth() {
            return None;
        }
        let index = z.checked_mul(self.width())?.checked_add(x)?;
        self.cells.get(index).copied().flatten()
    }

    /// Distinct groups in the cells within `radius` of the cell holding (x, z).
    pub fn groups_near(&self, x: f32, z: f32, radius: i64) -> Vec<usize> {
        let mut groups = Vec::new();
        let Some((cx, cz)) = self.cell_coords(x, z) else {
            return groups;
        };

        let width = i64::try_from(self.width()).unwrap_or(i64::MAX);
        let depth = i64::try_from(self.depth()).unwrap_or(i64::MAX);
        let reach = |c: i64, len: i64| c >= -radius && c <= len.saturating_add(radius);
        if !reach(cx, width) || !reach(cz, depth) {
            return groups;
        }

        for dz in -radius..=radius {
            for dx in -radius..=radius {
                if let Some(g) = self.group_at(cx.saturating_add(dx), cz.saturating_add(dz)) {
                    if !groups.contains(&g) {
                        groups.push(g);
                    }
                }
            }
        }
        groups
    }
}

/// Everything the collider needs, decoded once per zone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollisionData {
    pub meshes: Vec<CollisionMesh>,
    /// Collision space to world.
    pub transforms: Vec<Affine3A>,
    pub groups: Vec<CollisionGroup>,
    pub grid: Option<CollisionGrid>,
}

struct CollisionDecoder<'c, 'a> {
    cursor: &'c mut ByteCursor<'a>,
    header: &'c SectionHeader,
    limit: usize,
    meshes: FxHashMap<u32, usize>,
    transforms: FxHashMap<u32, usize>,
    groups: FxHashMap<u32, usize>,
    data: CollisionData,
}

impl CollisionDecoder<'_, '_> {
    fn group(&mut self, offset: u32) -> Result<usize> {
        if let Some(&index) = self.groups.get(&offset) {
            return Ok(index);
        }

        let start = self.header.table(self.limit, "collision group", offset, 1, 4)?;
        let count = self.cursor.peek(start, ByteCursor::read_u32) as usize;
        let entries = self.header.table(
            self.limit,
            "collision group entries",
            offset.saturating_add(4),
            count,
            8,
        )?;

        let pairs: Vec<(u32, u32)> = self.cursor.peek(entries, |c| {
            (0..count).map(|_| (c.read_u32(), c.read_u32())).collect()
        });

        let mut objects = Vec::with_capacity(count);
        for (transform_offset, mesh_offset) in pairs {
            objects.push(CollisionObject {
                transform: self.transform(transform_offset)?,
                mesh: self.mesh(mesh_offset)?,
            });
        }

        let index = self.data.groups.len();
        self.data.groups.push(CollisionGroup { objects });
        self.groups.insert(offset, index);
        Ok(index)
    }

    fn transform(&mut self, offset: u32) -> Result<usize> {
        if let Some(&index) = self.transforms.get(&offset) {
            return Ok(index);
        }

        let start = self
            .header
            .table(self.limit, "collision transform", offset, 1, TRANSFORM_SIZE)?;
        let cols: [f32; 12] = self.cursor.peek(start, |c| std::array::from_fn(|_| c.read_f32()));
        let basis = Mat3::from_cols_slice(&cols[..9]);
        let translation = Vec3::from_slice(&cols[9..]);

        let index = self.data.transforms.len();
        self.data
            .transforms
            .push(Affine3A::from_mat3_translation(basis, translation));
        self.transforms.insert(offset, index);
        Ok(index)
    }

    fn mesh(&mut self, offset: u32) -> Result<usize> {
        if let Some(&index) = self.meshes.get(&offset) {
            return Ok(index);
        }

        let start = self
            .header
            .table(self.limit, "collision mesh", offset, 1, MESH_HEADER_SIZE)?;
        let (vertex_count, triangle_count) = self
            .cursor
            .peek(start, |c| (c.read_u32() as usize, c.read_u32() as usize));
        let total = MESH_HEADER_SIZE
            .saturating_add(vertex_count.saturating_mul(VERTEX_SIZE))
            .saturating_add(triangle_count.saturating_mul(TRIANGLE_SIZE));
        self.header
            .table(self.limit, "collision mesh", offset, 1, total)?;

        let tag = self.header.tag();
        let mesh = self.cursor.peek(start + MESH_HEADER_SIZE, |c| -> Result<CollisionMesh> {
            let vertices: Vec<Vec3> = (0..vertex_count).map(|_| c.read_vec3()).collect();
            let mut triangles = Vec::with_capacity(triangle_count);

            for _ in 0..triangle_count {
                let position = c.position();
                let corners = [c.read_u16(), c.read_u16(), c.read_u16()];
                let terrain_index = c.read_u8();
                let flags = c.read_u8();

                let mut points = [Vec3::ZERO; 3];
                for (point, &index) in points.iter_mut().zip(&corners) {
                    *point = *vertices.get(usize::from(index)).ok_or_else(|| {
                        Error::unexpected("collision triangle vertex", index, position)
                    })?;
                }

                let terrain = TerrainType::from_u8(terrain_index);
                if let TerrainType::Unknown(raw) = terrain {
                    tracing::warn!(zone = %tag, terrain = raw, "unknown terrain type");
                }

                triangles.push(CollisionTriangle::new(points, terrain, flags & FLAG_HIT_WALL != 0));
            }

            Ok(CollisionMesh::new(triangles))
        })?;

        let index = self.data.meshes.len();
        self.data.meshes.push(mesh);
        self.meshes.insert(offset, index);
        Ok(index)
    }
}

/// Decode the collision block at body offset `offset`.
pub(crate) fn decode(
    cursor: &mut ByteCursor<'_>,
    header: &SectionHeader,
    offset: u32,
) -> Result<CollisionData> {
    let limit = cursor.len();
    cursor.seek(header.table(limit, "collision header", offset, 1, 40)?);

    let blocks_wide = cursor.read_u32();
    let blocks_long = cursor.read_u32();
    let sub_x = cursor.read_u32();
    let sub_z = cursor.read_u32();
    let cell_size = cursor.read_f32();
    let origin_x = cursor.read_f32();
    let origin_z = cursor.read_f32();
    let group_count = cursor.read_u32() as usize;
    let group_table = cursor.read_u32();
    let grid_offset = cursor.read_u32();

    let mut decoder = CollisionDecoder {
        cursor,
        header,
        limit,
        meshes: FxHashMap::default(),
        transforms: FxHashMap::default(),
        groups: FxHashMap::default(),
        data: CollisionData::default(),
    };

    let table = header.table(limit, "collision group table", group_table, group_count, 4)?;
    let group_offsets: Vec<u32> = decoder
        .cursor
        .peek(table, |c| (0..group_count).map(|_| c.read_u32()).collect());
    for group_offset in group_offsets {
        decoder.group(group_offset)?;
    }

    let mut grid = CollisionGrid {
        blocks_wide,
        blocks_long,
        sub_x,
        sub_z,
        cell_size,
        origin_x,
        origin_z,
        cells: Vec::new(),
    };
    let cell_count = grid.width().saturating_mul(grid.depth());

    let grid = if grid_offset != 0 && cell_count > 0 {
        let start = header.table(limit, "collision grid", grid_offset, cell_count, 4)?;
        let cell_offsets: Vec<u32> = decoder
            .cursor
            .peek(start, |c| (0..cell_count).map(|_| c.read_u32()).collect());

        grid.cells.reserve(cell_count);
        for cell in cell_offsets {
            let group = match cell {
                0 => None,
                offset => Some(decoder.group(offset)?),
            };
            grid.cells.push(group);
        }
        Some(grid)
    } else {
        None
    };

    let mut data = decoder.data;
    data.grid = grid;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> CollisionTriangle {
        CollisionTriangle::new(
            [Vec3::from(a), Vec3::from(b), Vec3::from(c)],
            TerrainType::Default,
            false,
        )
    }

    #[test]
    fn test_triangles_sorted_by_flatness() {
        let wall = tri([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]);
        let floor = tri([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]);
        let slope = tri([0.0, 0.0, 0.0], [0.0, 1.0, 1.0], [1.0, 0.0, 0.0]);

        let mesh = CollisionMesh::new(vec![wall, slope, floor]);
        for pair in mesh.triangles.windows(2) {
            assert!(pair[0].normal.y.abs() >= pair[1].normal.y.abs());
        }
        assert_eq!(mesh.triangles[0], floor);
        assert_eq!(mesh.triangles[2], wall);
    }

    #[test]
    fn test_grid_lookup() {
        let grid = CollisionGrid {
            blocks_wide: 1,
            blocks_long: 1,
            sub_x: 2,
            sub_z: 2,
            cell_size: 10.0,
            origin_x: -10.0,
            origin_z: 0.0,
            cells: vec![Some(0), None, None, Some(1)],
        };

        assert_eq!(grid.cell_coords(-5.0, 5.0), Some((0, 0)));
        assert_eq!(grid.group_at(0, 0), Some(0));
        assert_eq!(grid.group_at(1, 1), Some(1));
        assert_eq!(grid.group_at(2, 0), None);
        assert_eq!(grid.group_at(-1, 0), None);
        assert_eq!(grid.groups_near(-5.0, 5.0, 0), vec![0]);
        assert_eq!(grid.groups_near(-5.0, 5.0, 2), vec![0, 1]);
    }

    fn one_cell(cell_size: f32) -> CollisionGrid {
        CollisionGrid {
            blocks_wide: 1,
            blocks_long: 1,
            sub_x: 1,
            sub_z: 1,
            cell_size,
            origin_x: 0.0,
            origin_z: 0.0,
            cells: vec![Some(0)],
        }
    }

    #[test]
    fn test_grid_rejects_unmappable_positions() {
        let grid = one_cell(10.0);
        assert_eq!(grid.groups_near(5.0, 5.0, 2), vec![0]);
        assert_eq!(grid.groups_near(-15.0, 5.0, 2), vec![0]);
        assert!(grid.groups_near(-35.0, 5.0, 2).is_empty());

        for (x, z) in [
            (1e30, 0.0),
            (-1e30, 0.0),
            (0.0, f32::MAX),
            (f32::NAN, 0.0),
            (0.0, f32::INFINITY),
        ] {
            assert!(grid.groups_near(x, z, 2).is_empty(), "({x}, {z})");
        }
        assert_eq!(grid.cell_coords(f32::NAN, 0.0), None);
    }

    #[test]
    fn test_degenerate_cell_size() {
        for size in [0.0, -10.0, f32::NAN, f32::INFINITY] {
            let grid = one_cell(size);
            assert!(!grid.is_usable(), "{size}");
            assert_eq!(grid.cell_coords(5.0, 5.0), None);
            assert!(grid.groups_near(5.0, 5.0, 2).is_empty());
        }

        let tiny = one_cell(f32::from_bits(1));
        assert!(tiny.is_usable());
        assert!(tiny.groups_near(5.0, 5.0, 2).is_empty());
        assert_eq!(tiny.groups_near(0.0, 0.0, 2), vec![0]);
    }

    #[test]
    fn test_terrain_unknown() {
        assert_eq!(TerrainType::from_u8(2), TerrainType::Grass);
        assert_eq!(TerrainType::from_u8(200), TerrainType::Unknown(200));
    }
}
