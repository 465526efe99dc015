//! Environment sections (type 0x09): lighting, fog and sky.

use datkit_common::{ByteCursor, ResourceId, Rgba};

use crate::options::ParseOptions;
use crate::resource::Resource;
use crate::section::SectionHeader;
use crate::Result;

/// Number of sky gradient slices.
pub const SKY_SLICES: usize = 8;

/// Light and fog settings for one class of geometry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightConfig {
    pub sun: Rgba,
    pub moon: Rgba,
    pub ambient: Rgba,
    pub fog: Rgba,
    pub fog_start: f32,
    pub fog_end: f32,
    pub diffuse_multiplier: f32,
}

impl LightConfig {
    fn read(cursor: &mut ByteCursor<'_>) -> Self {
        Self {
            sun: cursor.read_rgba8(255.0),
            moon: cursor.read_rgba8(255.0),
            ambient: cursor.read_rgba8(255.0),
            fog: cursor.read_rgba8(255.0),
            fog_start: cursor.read_f32(),
            fog_end: cursor.read_f32(),
            diffuse_multiplier: cursor.read_f32(),
        }
    }
}

/// One horizontal band of the sky gradient.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SkySlice {
    pub color: Rgba,
    pub elevation: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentResource {
    pub id: ResourceId,
    pub indoor: bool,
    /// Lighting applied to placed models.
    pub model_light: LightConfig,
    /// Lighting applied to terrain.
    pub terrain_light: LightConfig,
    pub clear_color: Rgba,
    pub draw_distance: f32,
    pub sky: [SkySlice; SKY_SLICES],
}

pub(crate) fn decode(
    cursor: &mut ByteCursor<'_>,
    header: &SectionHeader,
    _options: &ParseOptions,
) -> Result<Option<Resource>> {
    let indoor = cursor.read_u32() != 0;
    let model_light = LightConfig::read(cursor);
    let terrain_light = LightConfig::read(cursor);
    let clear_color = cursor.read_rgba8(255.0);
    let draw_distance = cursor.read_f32();

    let mut sky = [SkySlice::default(); SKY_SLICES];
    for slice in &mut sky {
        slice.color = cursor.read_rgba8(255.0);
        slice.elevation = cursor.read_f32();
    }

    Ok(Some(Resource::Environment(EnvironmentResource {
        id: header.tag(),
        indoor,
        model_light,
        terrain_light,
        clear_color,
        draw_distance,
        sky,
    })))
}
