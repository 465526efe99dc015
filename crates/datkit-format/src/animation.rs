//! Skeleton animation sections (type 0x05).
//!
//! ```text
//! header  u32 curve_count, u32 frame_count, f32 frame_scale,
//!         u32 table_offset, u32 data_offset
//! entry   u32 joint, u16 constant_mask, u16 pad, 10 x u32 component
//! ```
//!
//! Components are rotation x, y, z, w, translation x, y, z and scale x, y, z.
//! When bit `i` of the mask is set component `i` holds f32 bits; otherwise it
//! is a byte offset into the data block where `frame_count` floats follow.

use std::collections::BTreeMap;

use datkit_common::glam::{Quat, Vec3};
use datkit_common::{ByteCursor, ResourceId};

use crate::options::ParseOptions;
use crate::resource::Resource;
use crate::section::SectionHeader;
use crate::Result;

const ENTRY_SIZE: usize = 48;
const COMPONENTS: usize = 10;

/// A joint's local transform at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSample {
    pub rotation: Quat,
    pub translation: Vec3,
    pub scale: Vec3,
}

impl Default for JointSample {
    fn default() -> Self {
        Self {
            rotation: Quat::IDENTITY,
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl JointSample {
    fn from_components(c: [f32; COMPONENTS]) -> Self {
        Self {
            rotation: Quat::from_xyzw(c[0], c[1], c[2], c[3]),
            translation: Vec3::new(c[4], c[5], c[6]),
            scale: Vec3::new(c[7], c[8], c[9]),
        }
    }

    /// Interpolate towards `other`: linear for translation and scale,
    /// shortest-arc normalized linear for rotation.
    pub fn interpolate(&self, other: &Self, t: f32) -> Self {
        Self {
            rotation: nlerp(self.rotation, other.rotation, t),
            translation: self.translation.lerp(other.translation, t),
            scale: self.scale.lerp(other.scale, t),
        }
    }
}

/// Normalized linear quaternion interpolation along the shorter arc.
pub fn nlerp(a: Quat, b: Quat, t: f32) -> Quat {
    let b = if a.dot(b) < 0.0 { -b } else { b };
    (a * (1.0 - t) + b * t).normalize()
}

/// Per-frame local transforms of one joint.
///
/// Holds a single sample when every component of the joint is constant.
#[derive(Debug, Clone, PartialEq)]
pub struct JointTrack {
    pub frames: Vec<JointSample>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonAnimationResource {
    pub id: ResourceId,
    pub frame_count: u32,
    /// Seconds per frame.
    pub frame_scale: f32,
    /// Tracks keyed by joint index. Joints without a track are not animated.
    pub tracks: BTreeMap<usize, JointTrack>,
}

impl SkeletonAnimationResource {
    /// Length of the animation in seconds.
    pub fn duration(&self) -> f32 {
        self.frame_count.saturating_sub(1) as f32 * self.frame_scale
    }

    /// Sample a joint at `time` seconds, clamped to the first and last frame.
    pub fn sample(&self, joint: usize, time: f32) -> Option<JointSample> {
        let frames = &self.tracks.get(&joint)?.frames;
        let last = frames.len().checked_sub(1)?;

        let position = if self.frame_scale > 0.0 {
            (time / self.frame_scale).clamp(0.0, last as f32)
        } else {
            0.0
        };
        let i0 = position.floor() as usize;
        let i1 = (i0 + 1).min(last);
        let t = position - i0 as f32;

        Some(frames[i0].interpolate(&frames[i1], t))
    }

    /// Sample every animated joint at `time` seconds.
    pub fn sample_pose(&self, time: f32) -> Vec<(usize, JointSample)> {
        self.tracks
            .keys()
            .filter_map(|&joint| self.sample(joint, time).map(|s| (joint, s)))
            .collect()
    }
}

enum Component {
    Constant(f32),
    Curve(Vec<f32>),
}

impl Component {
    fn at(&self, frame: usize) -> f32 {
        match self {
            Self::Constant(v) => *v,
            Self::Curve(values) => values.get(frame).copied().unwrap_or(0.0),
        }
    }
}

pub(crate) fn decode(
    cursor: &mut ByteCursor<'_>,
    header: &SectionHeader,
    _options: &ParseOptions,
) -> Result<Option<Resource>> {
    let limit = cursor.len();
    let curve_count = cursor.read_u32() as usize;
    let frame_count = cursor.read_u32();
    let frame_scale = cursor.read_f32();
    let table_offset = cursor.read_u32();
    let data_offset = cursor.read_u32();

    let frames = (frame_count as usize).max(1);
    let mut tracks = BTreeMap::new();

    cursor.seek(header.table(limit, "animation entries", table_offset, curve_count, ENTRY_SIZE)?);
    for _ in 0..curve_count {
        let joint = cursor.read_u32() as usize;
        let constant_mask = cursor.read_u16();
        cursor.advance(2);

        let mut components = Vec::with_capacity(COMPONENTS);
        for i in 0..COMPONENTS {
            let raw = cursor.read_u32();
            if constant_mask & (1 << i) != 0 {
                components.push(Component::Constant(f32::from_bits(raw)));
                continue;
            }

            let start = header.table(
                limit,
                "animation curve",
                data_offset.saturating_add(raw),
                frames,
                4,
            )?;
            let values = cursor.peek(start, |c| (0..frames).map(|_| c.read_f32()).collect());
            components.push(Component::Curve(values));
        }

        // A track without curves holds one sample whatever the frame count.
        let track_frames = if components.iter().all(|c| matches!(c, Component::Constant(_))) {
            1
        } else {
            frames
        };
        let samples = (0..track_frames)
            .map(|f| {
                let mut c = [0.0f32; COMPONENTS];
                for (slot, component) in c.iter_mut().zip(&components) {
                    *slot = component.at(f);
                }
                JointSample::from_components(c)
            })
            .collect();

        if tracks.insert(joint, JointTrack { frames: samples }).is_some() {
            tracing::warn!(animation = %header.tag(), joint, "duplicate joint track, keeping the last");
        }
    }

    Ok(Some(Resource::SkeletonAnimation(SkeletonAnimationResource {
        id: header.tag(),
        frame_count,
        frame_scale,
        tracks,
    })))
}
