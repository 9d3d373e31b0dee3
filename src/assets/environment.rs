use super::AssetError;
use image::imageops::{self, FilterType};
use image::Rgba32FImage;
use std::path::Path;

const MAX_RADIANCE_WIDTH: u32 = 2048;
const IRRADIANCE_SIZE: (u32, u32) = (64, 32);
const IRRADIANCE_BLUR_SIGMA: f32 = 2.0;

/// Linear RGBA32F pixels, row-major from the top.
#[derive(Debug, Clone, PartialEq)]
pub struct HdrImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<f32>,
}

impl From<Rgba32FImage> for HdrImage {
    fn from(image: Rgba32FImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            rgba: image.into_raw(),
        }
    }
}

/// Equirectangular environment: the sharp image for background and
/// reflections plus a small blurred copy for diffuse lighting.
#[derive(Debug, Clone)]
pub struct EnvironmentMap {
    pub name: String,
    pub radiance: HdrImage,
    pub irradiance: HdrImage,
}

pub fn decode_environment(bytes: &[u8], path: &Path) -> Result<EnvironmentMap, AssetError> {
    let decoded = image::load_from_memory(bytes).map_err(|source| AssetError::Image {
        path: path.display().to_string(),
        source,
    })?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(AssetError::EmptyImage {
            path: path.display().to_string(),
        });
    }

    let mut radiance = decoded.to_rgba32f();
    if radiance.width() > MAX_RADIANCE_WIDTH {
        let height = (radiance.height() as u64 * MAX_RADIANCE_WIDTH as u64 / radiance.width() as u64)
            .max(1) as u32;
        radiance = imageops::resize(&radiance, MAX_RADIANCE_WIDTH, height, FilterType::Triangle);
    }

    let (width, height) = IRRADIANCE_SIZE;
    let small = imageops::resize(&radiance, width, height, FilterType::Triangle);
    let irradiance = imageops::blur(&small, IRRADIANCE_BLUR_SIGMA);

    let name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("environment")
        .to_string();
    log::info!(
        "Decoded environment {} ({}x{})",
        name,
        radiance.width(),
        radiance.height()
    );
    Ok(EnvironmentMap {
        name,
        radiance: radiance.into(),
        irradiance: irradiance.into(),
    })
}
