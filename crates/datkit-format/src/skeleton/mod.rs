//! Skeleton sections (type 0x03).
//!
//! ```text
//! header   u32 joint_count, joint_offset, ref_count, ref_offset, bbox_offset
//! joint    quat rotation (x, y, z, w), vec3 translation, u8 parent, 3 pad
//! ref      [u8; 4] id, u16 joint, u16 flags, vec3 offset
//! bbox     vec3 min, vec3 max; the list ends at a min.x of 0xFFFFFFFF
//! ```

mod pose;

pub use pose::{JointTransform, Pose};

use datkit_common::glam::{Quat, Vec3};
use datkit_common::{ByteCursor, ResourceId};

use crate::bounds::BoundingBox;
use crate::options::ParseOptions;
use crate::resource::Resource;
use crate::section::SectionHeader;
use crate::{Error, Result};

const JOINT_SIZE: usize = 32;
const REFERENCE_SIZE: usize = 20;
const BOX_SIZE: usize = 24;
const BOX_TERMINATOR: u32 = 0xFFFF_FFFF;

/// One joint of the hierarchy, in its parent's space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joint {
    pub rotation: Quat,
    pub translation: Vec3,
    /// `None` for a root joint.
    pub parent: Option<usize>,
}

/// A named attachment point on a joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointReference {
    pub id: ResourceId,
    pub joint: usize,
    pub flags: u16,
    /// Offset from the joint, in joint space.
    pub offset: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonResource {
    pub id: ResourceId,
    pub joints: Vec<Joint>,
    pub references: Vec<JointReference>,
    pub bounds: Vec<BoundingBox>,
    /// Vertical extent of the attachment points in the rest pose.
    ///
    /// Only computed when the skeleton has at least two references.
    pub height: Option<f32>,
}

impl SkeletonResource {
    /// Find an attachment point by id.
    pub fn reference(&self, id: ResourceId) -> Option<&JointReference> {
        self.references.iter().find(|r| r.id == id)
    }

    /// The rest pose.
    pub fn t_pose(&self) -> Pose {
        Pose::t_pose(&self.joints)
    }

    /// Indices of joints with no parent.
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.joints
            .iter()
            .enumerate()
            .filter(|(_, j)| j.parent.is_none())
            .map(|(i, _)| i)
    }
}

fn reference_height(joints: &[Joint], references: &[JointReference]) -> Option<f32> {
    if references.len() < 2 {
        return None;
    }

    let pose = Pose::t_pose(joints);
    let (min, max) = references
        .iter()
        .filter_map(|r| pose.joint(r.joint).map(|t| t.transform_point(r.offset).y))
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), y| {
            (lo.min(y), hi.max(y))
        });

    (min <= max).then(|| max - min)
}

pub(crate) fn decode(
    cursor: &mut ByteCursor<'_>,
    header: &SectionHeader,
    _options: &ParseOptions,
) -> Result<Option<Resource>> {
    let limit = cursor.len();
    let joint_count = cursor.read_u32() as usize;
    let joint_offset = cursor.read_u32();
    let ref_count = cursor.read_u32() as usize;
    let ref_offset = cursor.read_u32();
    let bbox_offset = cursor.read_u32();

    cursor.seek(header.table(limit, "skeleton joints", joint_offset, joint_count, JOINT_SIZE)?);
    let mut joints = Vec::with_capacity(joint_count);
    for index in 0..joint_count {
        let rotation = cursor.read_quat();
        let translation = cursor.read_vec3();
        let parent = usize::from(cursor.read_u8());
        cursor.advance(3);

        let parent = if parent == index {
            None
        } else if parent >= joint_count {
            tracing::warn!(
                skeleton = %header.tag(),
                joint = index,
                parent,
                "joint parent out of range, treating as root"
            );
            None
        } else {
            Some(parent)
        };

        joints.push(Joint {
            rotation,
            translation,
            parent,
        });
    }

    cursor.seek(header.table(limit, "skeleton references", ref_offset, ref_count, REFERENCE_SIZE)?);
    let mut references = Vec::with_capacity(ref_count);
    for _ in 0..ref_count {
        let position = cursor.position();
        let id = cursor.read_id();
        let joint = usize::from(cursor.read_u16());
        let flags = cursor.read_u16();
        let offset = cursor.read_vec3();

        if joint >= joint_count {
            return Err(Error::unexpected("skeleton reference joint", joint, position));
        }

        references.push(JointReference {
            id,
            joint,
            flags,
            offset,
        });
    }

    let mut bounds = Vec::new();
    if bbox_offset != 0 {
        cursor.seek(header.at(bbox_offset));
        while cursor.remaining() >= BOX_SIZE {
            let first = cursor.peek(cursor.position(), ByteCursor::read_u32);
            if first == BOX_TERMINATOR {
                break;
            }
            bounds.push(BoundingBox::read(cursor));
        }
    }

    let height = reference_height(&joints, &references);

    Ok(Some(Resource::Skeleton(SkeletonResource {
        id: header.tag(),
        joints,
        references,
        bounds,
        height,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{frame, header_for, ByteBuilder};

    fn write_joint(b: &mut ByteBuilder, parent: u8, translation: [f32; 3]) {
        b.f32(0.0)
            .f32(0.0)
            .f32(0.0)
            .f32(1.0)
            .vec3(translation[0], translation[1], translation[2])
            .u8(parent)
            .zeros(3);
    }

    fn run(body: &[u8]) -> Result<SkeletonResource> {
        let data = frame("SKEL", 0x03, body);
        let header = header_for("SKEL", 0x03, body);
        let mut cursor = ByteCursor::new_at(&data, header.data_start());
        match decode(&mut cursor, &header, &ParseOptions::default())? {
            Some(Resource::Skeleton(s)) => Ok(s),
            other => panic!("expected a skeleton, got {other:?}"),
        }
    }

    #[test]
    fn test_self_parent_is_root() {
        let mut b = ByteBuilder::new();
        b.u32(2).u32(20).u32(0).u32(0).u32(0);
        write_joint(&mut b, 0, [0.0, 0.0, 0.0]);
        write_joint(&mut b, 1, [0.0, 1.0, 0.0]);

        let skeleton = run(&b.build()).unwrap();
        assert_eq!(skeleton.joints.len(), 2);
        assert_eq!(skeleton.joints[0].parent, None);
        assert_eq!(skeleton.joints[1].parent, None);
        assert_eq!(skeleton.roots().count(), 2);
        assert_eq!(skeleton.height, None);
    }

    #[test]
    fn test_height_from_references() {
        let mut b = ByteBuilder::new();
        b.u32(2).u32(20).u32(2).u32(84).u32(124);
        write_joint(&mut b, 0, [0.0, 0.5, 0.0]);
        write_joint(&mut b, 0, [0.0, 1.0, 0.0]);
        // Feet at the root, head on the child with a small offset.
        b.tag("FEET").u16(0).u16(0).vec3(0.0, -0.5, 0.0);
        b.tag("HEAD").u16(1).u16(0).vec3(0.0, 0.25, 0.0);
        // One box, then the terminator.
        b.vec3(-1.0, 0.0, -1.0).vec3(1.0, 2.0, 1.0);
        b.u32(BOX_TERMINATOR).zeros(20);

        let skeleton = run(&b.build()).unwrap();
        assert_eq!(skeleton.joints[1].parent, Some(0));
        assert_eq!(skeleton.bounds.len(), 1);
        assert_eq!(skeleton.bounds[0].max, Vec3::new(1.0, 2.0, 1.0));
        // Feet: 0.5 - 0.5 = 0.0. Head: 0.5 + 1.0 + 0.25 = 1.75.
        let height = skeleton.height.unwrap();
        assert!((height - 1.75).abs() < 1e-6);
        assert!(skeleton.reference(ResourceId::from_tag("HEAD")).is_some());
    }

    #[test]
    fn test_joint_table_past_section_is_fatal() {
        let mut b = ByteBuilder::new();
        b.u32(1000).u32(20).u32(0).u32(0).u32(0);
        assert!(matches!(run(&b.build()), Err(Error::UnexpectedValue { .. })));
    }

    #[test]
    fn test_reference_to_missing_joint_is_fatal() {
        let mut b = ByteBuilder::new();
        b.u32(1).u32(20).u32(1).u32(52).u32(0);
        write_joint(&mut b, 0, [0.0, 0.0, 0.0]);
        b.tag("HAND").u16(4).u16(0).vec3(0.0, 0.0, 0.0);
        assert!(run(&b.build()).is_err());
    }
}
