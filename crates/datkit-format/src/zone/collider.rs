//! Ray queries against zone collision data.

use datkit_common::glam::{Affine3A, Vec3};

use super::collision::{CollisionData, CollisionMesh, CollisionTriangle, TerrainType};

/// Height ground queries start from when the caller gives none.
pub const DEFAULT_START_HEIGHT: f32 = 100_000.0;

/// Grid cells searched around the query position, in each direction.
pub const GROUND_QUERY_RADIUS: i64 = 2;

const PARALLEL_EPSILON: f32 = 1e-5;
const EDGE_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// A ray pointing straight down from `(x, y, z)`.
    pub fn down(x: f32, y: f32, z: f32) -> Self {
        Self::new(Vec3::new(x, y, z), Vec3::NEG_Y)
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    fn transformed(&self, transform: &Affine3A) -> Self {
        Self {
            origin: transform.transform_point3(self.origin),
            direction: transform.transform_vector3(self.direction),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Distance along the world ray, in units of its direction.
    pub distance: f32,
    /// World-space hit point.
    pub point: Vec3,
    pub terrain: TerrainType,
}

/// Plane intersection followed by the inside test. Returns the ray parameter.
pub fn intersect_triangle(ray: &Ray, triangle: &CollisionTriangle) -> Option<f32> {
    let n = triangle.normal;
    let denom = n.dot(ray.direction);
    if denom.abs() <= PARALLEL_EPSILON {
        return None;
    }

    let [a, b, c] = triangle.vertices;
    let t = n.dot(a - ray.origin) / denom;
    if t < 0.0 {
        return None;
    }

    let p = ray.at(t);
    let inside = [(a, b), (b, c), (c, a)]
        .into_iter()
        .all(|(from, to)| (to - from).cross(p - from).dot(n) >= -EDGE_EPSILON);
    inside.then_some(t)
}

fn nearest_in_mesh(ray: &Ray, mesh: &CollisionMesh) -> Option<(f32, TerrainType)> {
    mesh.triangles
        .iter()
        .filter(|tri| !tri.hit_wall)
        .filter_map(|tri| intersect_triangle(ray, tri).map(|t| (t, tri.terrain)))
        .min_by(|a, b| a.0.total_cmp(&b.0))
}

/// Borrowed view over a zone's collision data.
#[derive(Debug, Clone, Copy)]
pub struct ZoneCollider<'a> {
    data: &'a CollisionData,
    /// World to collision space, parallel to `data.transforms`.
    inverses: &'a [Affine3A],
}

impl<'a> ZoneCollider<'a> {
    pub(crate) fn new(data: &'a CollisionData, inverses: &'a [Affine3A]) -> Self {
        Self { data, inverses }
    }

    pub fn data(&self) -> &'a CollisionData {
        self.data
    }

    /// Groups worth testing for a ray starting over (x, z).
    ///
    /// A grid whose cell size cannot place positions is treated as absent.
    fn candidate_groups(&self, x: f32, z: f32) -> Vec<usize> {
        match &self.data.grid {
            Some(grid) if grid.is_usable() => grid.groups_near(x, z, GROUND_QUERY_RADIUS),
            _ => (0..self.data.groups.len()).collect(),
        }
    }

    /// Nearest non-wall hit along `ray`.
    ///
    /// Candidate groups are picked from the grid around the ray origin, so
    /// rays should be close to vertical.
    pub fn raycast(&self, ray: &Ray) -> Option<RayHit> {
        if !ray.origin.is_finite() || !ray.direction.is_finite() {
            return None;
        }

        let mut best: Option<(f32, TerrainType)> = None;

        for group in self.candidate_groups(ray.origin.x, ray.origin.z) {
            let Some(group) = self.data.groups.get(group) else {
                continue;
            };
            for object in &group.objects {
                let (Some(mesh), Some(inverse)) =
                    (self.data.meshes.get(object.mesh), self.inverses.get(object.transform))
                else {
                    continue;
                };

                // An affine map keeps the ray parameter, so t is comparable
                // across objects.
                let local = ray.transformed(inverse);
                if let Some(hit) = nearest_in_mesh(&local, mesh) {
                    if best.map_or(true, |(t, _)| hit.0 < t) {
                        best = Some(hit);
                    }
                }
            }
        }

        best.map(|(distance, terrain)| RayHit {
            distance,
            point: ray.at(distance),
            terrain,
        })
    }

    /// World Y of the ground below (x, z), searching down from
    /// [`DEFAULT_START_HEIGHT`].
    pub fn ground_height(&self, x: f32, z: f32) -> Option<f32> {
        self.ground_height_from(x, DEFAULT_START_HEIGHT, z)
    }

    /// World Y of the first ground surface at or below `y`.
    pub fn ground_height_from(&self, x: f32, y: f32, z: f32) -> Option<f32> {
        self.raycast(&Ray::down(x, y, z)).map(|hit| hit.point.y)
    }
}

/// Inverse of every transform, in the same order.
pub(crate) fn invert_transforms(data: &CollisionData) -> Vec<Affine3A> {
    data.transforms
        .iter()
        .map(|transform| {
            if transform.matrix3.determinant().abs() <= f32::EPSILON {
                tracing::warn!("singular collision transform, using identity");
                Affine3A::IDENTITY
            } else {
                transform.inverse()
            }
        })
        .collect()
}
