//! Forward kinematics over a joint hierarchy.

use datkit_common::glam::{Quat, Vec3};

use super::Joint;

/// A joint's world-space transform.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointTransform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl JointTransform {
    /// Compose a child's local transform onto this (parent) transform.
    pub fn then(&self, rotation: Quat, translation: Vec3) -> Self {
        Self {
            position: self.position + self.rotation * translation,
            rotation: self.rotation * rotation,
        }
    }

    /// World position of a point given in this joint's local space.
    pub fn transform_point(&self, offset: Vec3) -> Vec3 {
        self.position + self.rotation * offset
    }
}

/// World transforms for every joint of a skeleton.
#[derive(Debug, Clone, Default)]
pub struct Pose {
    transforms: Vec<JointTransform>,
}

impl Pose {
    /// Build the rest pose, root to leaves.
    ///
    /// Joints may be stored in any order. A parent chain that loops back on
    /// itself is cut where the loop closes and that joint is treated as a root.
    pub fn t_pose(joints: &[Joint]) -> Self {
        let mut world: Vec<Option<JointTransform>> = vec![None; joints.len()];
        let mut chain = Vec::new();

        for start in 0..joints.len() {
            chain.clear();
            let mut anchor = None;
            let mut current = Some(start);

            while let Some(i) = current {
                if let Some(done) = world[i] {
                    anchor = Some(done);
                    break;
                }
                if chain.contains(&i) {
                    tracing::warn!(joint = i, "joint hierarchy loops, treating as root");
                    break;
                }
                chain.push(i);
                current = joints[i].parent;
            }

            let mut parent = anchor;
            for &i in chain.iter().rev() {
                let joint = &joints[i];
                let transform = match parent {
                    Some(p) => p.then(joint.rotation, joint.translation),
                    None => JointTransform {
                        position: joint.translation,
                        rotation: joint.rotation,
                    },
                };
                world[i] = Some(transform);
                parent = Some(transform);
            }
        }

        Self {
            transforms: world.into_iter().map(Option::unwrap_or_default).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn joint(&self, index: usize) -> Option<&JointTransform> {
        self.transforms.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &JointTransform> {
        self.transforms.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn joint(parent: Option<usize>, rotation: Quat, translation: Vec3) -> Joint {
        Joint {
            rotation,
            translation,
            parent,
        }
    }

    #[test]
    fn test_chain() {
        let joints = [
            joint(None, Quat::from_rotation_z(FRAC_PI_2), Vec3::new(0.0, 1.0, 0.0)),
            joint(Some(0), Quat::IDENTITY, Vec3::new(1.0, 0.0, 0.0)),
            joint(Some(1), Quat::IDENTITY, Vec3::new(1.0, 0.0, 0.0)),
        ];
        let pose = Pose::t_pose(&joints);

        // The root's quarter turn about Z maps +X onto +Y.
        let tip = pose.joint(2).unwrap().position;
        assert!(tip.abs_diff_eq(Vec3::new(0.0, 3.0, 0.0), 1e-5));
    }

    #[test]
    fn test_out_of_order_storage() {
        let joints = [
            joint(Some(1), Quat::IDENTITY, Vec3::new(0.0, 2.0, 0.0)),
            joint(None, Quat::IDENTITY, Vec3::new(0.0, 1.0, 0.0)),
        ];
        let pose = Pose::t_pose(&joints);
        assert_eq!(pose.joint(0).unwrap().position, Vec3::new(0.0, 3.0, 0.0));
    }

    #[test]
    fn test_loop_is_cut() {
        let joints = [
            joint(Some(1), Quat::IDENTITY, Vec3::X),
            joint(Some(0), Quat::IDENTITY, Vec3::X),
        ];
        let pose = Pose::t_pose(&joints);
        assert_eq!(pose.len(), 2);
        assert!(pose.iter().all(|t| t.position.is_finite()));
    }
}
