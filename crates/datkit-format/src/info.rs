//! Info sections (type 0x0A): character and mount metadata.

use std::f32::consts::TAU;

use datkit_common::{ByteCursor, ResourceId};

use crate::options::ParseOptions;
use crate::resource::Resource;
use crate::section::SectionHeader;
use crate::{Error, Result};

/// Section tag that selects the mount layout.
pub const MOUNT_TAG: ResourceId = ResourceId::from_bytes(*b"MNT ");

const NO_JOINT: u8 = 0xFF;

/// How a character moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementType {
    Walk,
    Fly,
    Swim,
    Stationary,
}

impl TryFrom<u8> for MovementType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Walk),
            1 => Ok(Self::Fly),
            2 => Ok(Self::Swim),
            3 => Ok(Self::Stationary),
            other => Err(Error::UnknownMovementType(other)),
        }
    }
}

/// Preferred attack range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeType {
    #[default]
    Unset,
    Melee,
    Ranged,
    Magic,
}

impl From<u8> for RangeType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Melee,
            2 => Self::Ranged,
            3 => Self::Magic,
            _ => Self::Unset,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MountInfo {
    pub id: ResourceId,
    /// Seat rotation in radians, `0..2π`.
    pub rotation: f32,
    pub pose_type: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharacterInfo {
    pub id: ResourceId,
    pub movement_type: MovementType,
    pub movement_character: u8,
    pub weapon_anim_type: u8,
    pub weapon_anim_subtype: u8,
    pub combat_shake: f32,
    pub standard_joint: Option<u8>,
    pub range_type: RangeType,
    pub scale: f32,
    pub static_npc_scale: Option<f32>,
}

/// A decoded info section.
#[derive(Debug, Clone, PartialEq)]
pub enum InfoResource {
    Mount(MountInfo),
    Character(CharacterInfo),
}

impl InfoResource {
    pub fn id(&self) -> ResourceId {
        match self {
            Self::Mount(m) => m.id,
            Self::Character(c) => c.id,
        }
    }
}

pub(crate) fn decode(
    cursor: &mut ByteCursor<'_>,
    header: &SectionHeader,
    _options: &ParseOptions,
) -> Result<Option<Resource>> {
    let id = header.tag();

    if id == MOUNT_TAG {
        let rotation = f32::from(cursor.read_u16()) / 65536.0 * TAU;
        let pose_type = cursor.read_u8();
        return Ok(Some(Resource::Info(InfoResource::Mount(MountInfo {
            id,
            rotation,
            pose_type,
        }))));
    }

    let movement_type = MovementType::try_from(cursor.read_u8())?;
    let movement_character = cursor.read_u8();
    let weapon_anim_type = cursor.read_u8();
    let weapon_anim_subtype = cursor.read_u8();
    let combat_shake = cursor.read_f32();
    let standard_joint = cursor.read_u8();
    let range_type = RangeType::from(cursor.read_u8());
    cursor.advance(2);
    let scale = cursor.read_f32();
    let static_npc_scale = cursor.read_optional_f32();

    Ok(Some(Resource::Info(InfoResource::Character(CharacterInfo {
        id,
        movement_type,
        movement_character,
        weapon_anim_type,
        weapon_anim_subtype,
        combat_shake,
        standard_joint: (standard_joint != NO_JOINT).then_some(standard_joint),
        range_type,
        scale,
        static_npc_scale,
    }))))
}
