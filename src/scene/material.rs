use super::TextureId;

/// Linear RGB.
pub type Color = [f32; 3];

pub const WHITE: Color = [1.0, 1.0, 1.0];
pub const BLACK: Color = [0.0, 0.0, 0.0];

const REPLACEMENT_METALNESS: f32 = 0.2;
const REPLACEMENT_ROUGHNESS: f32 = 0.6;

/// Converts a packed sRGB hex color (`0xRRGGBB`) to linear RGB.
pub fn color_from_hex(hex: u32) -> Color {
    let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xFF) as f32 / 255.0);
    [channel(16), channel(8), channel(0)]
}

fn srgb_to_linear(c: f32) -> f32 {
    if c < 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// The physically-based material every renderable part ends up with.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardMaterial {
    pub color: Color,
    pub map: Option<TextureId>,
    pub metalness: f32,
    pub roughness: f32,
    pub emissive: Color,
    pub opacity: f32,
    pub transparent: bool,
    pub double_sided: bool,
}

impl Default for StandardMaterial {
    fn default() -> Self {
        Self {
            color: WHITE,
            map: None,
            metalness: 0.0,
            roughness: 1.0,
            emissive: BLACK,
            opacity: 1.0,
            transparent: false,
            double_sided: false,
        }
    }
}

/// Material kinds an imported model can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceMaterial {
    Standard(StandardMaterial),
    /// Shading-free material (`KHR_materials_unlit`).
    Unlit {
        color: Option<Color>,
        map: Option<TextureId>,
    },
}

impl SourceMaterial {
    pub fn is_standard(&self) -> bool {
        matches!(self, Self::Standard(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Standard(_) => "standard",
            Self::Unlit { .. } => "unlit",
        }
    }

    /// Maps any supported material onto the canonical standard material.
    /// Non-standard kinds keep only their base color and texture map.
    pub fn normalize(self) -> StandardMaterial {
        match self {
            Self::Standard(material) => material,
            Self::Unlit { color, map } => StandardMaterial {
                color: color.unwrap_or(WHITE),
                map,
                metalness: REPLACEMENT_METALNESS,
                roughness: REPLACEMENT_ROUGHNESS,
                ..StandardMaterial::default()
            },
        }
    }

    pub(crate) fn offset_textures(&mut self, offset: usize) {
        let map = match self {
            Self::Standard(material) => &mut material.map,
            Self::Unlit { map, .. } => map,
        };
        if let Some(id) = map {
            id.0 += offset;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_convert_to_linear() {
        assert_eq!(color_from_hex(0xFFFFFF), WHITE);
        assert_eq!(color_from_hex(0x000000), BLACK);
        let grey = color_from_hex(0x444444);
        assert!((grey[0] - 0.0578).abs() < 1e-3);
        assert_eq!(grey[0], grey[1]);
        assert_eq!(grey[1], grey[2]);
    }

    #[test]
    fn standard_material_passes_through_unchanged() {
        let material = StandardMaterial {
            color: [0.1, 0.2, 0.3],
            metalness: 0.9,
            roughness: 0.1,
            double_sided: true,
            ..StandardMaterial::default()
        };
        assert_eq!(
            SourceMaterial::Standard(material.clone()).normalize(),
            material
        );
    }

    #[test]
    fn unlit_material_keeps_color_and_map() {
        let normalized = SourceMaterial::Unlit {
            color: Some([0.5, 0.25, 0.0]),
            map: Some(TextureId(3)),
        }
        .normalize();
        assert_eq!(normalized.color, [0.5, 0.25, 0.0]);
        assert_eq!(normalized.map, Some(TextureId(3)));
        assert_eq!(normalized.metalness, 0.2);
        assert_eq!(normalized.roughness, 0.6);
        assert_eq!(normalized.opacity, 1.0);
        assert!(!normalized.transparent);
    }

    #[test]
    fn unlit_material_without_color_becomes_white() {
        let normalized = SourceMaterial::Unlit {
            color: None,
            map: None,
        }
        .normalize();
        assert_eq!(normalized.color, WHITE);
        assert_eq!(normalized.map, None);
    }
}
