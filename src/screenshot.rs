use image::RgbaImage;
use screenshots::Screen;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Screenshot {
    pub image: RgbaImage,
    /// Physical pixels per logical pointer unit.
    pub scale_factor: f32,
}

impl Screenshot {
    /// Maps a pixel position in the image to pointer coordinates.
    pub fn to_pointer_coords(&self, x: i32, y: i32) -> (i32, i32) {
        if self.scale_factor <= 0.0 || self.scale_factor == 1.0 {
            return (x, y);
        }
        (
            (x as f32 / self.scale_factor).round() as i32,
            (y as f32 / self.scale_factor).round() as i32,
        )
    }
}

#[derive(Error, Debug)]
pub enum ScreenshotError {
    #[error("Failed to capture screenshot: {0}")]
    CaptureError(String),
    #[error("No screens found")]
    NoScreensFound,
}

fn primary_screen() -> Result<Screen, ScreenshotError> {
    // for now, just take the first screen
    Screen::all()
        .map_err(|e| ScreenshotError::CaptureError(e.to_string()))?
        .into_iter()
        .next()
        .ok_or(ScreenshotError::NoScreensFound)
}

pub fn take_screenshot() -> Result<Screenshot, ScreenshotError> {
    let screen = primary_screen()?;
    let image = screen
        .capture()
        .map_err(|e| ScreenshotError::CaptureError(e.to_string()))?;
    Ok(Screenshot {
        image,
        scale_factor: screen.display_info.scale_factor,
    })
}

/// Captures a rectangle given in pointer coordinates.
pub fn take_region_screenshot(
    x: i32,
    y: i32,
    width: u32,
    height: u32,
) -> Result<Screenshot, ScreenshotError> {
    let screen = primary_screen()?;
    let image = screen
        .capture_area(x, y, width, height)
        .map_err(|e| ScreenshotError::CaptureError(e.to_string()))?;
    Ok(Screenshot {
        image,
        scale_factor: screen.display_info.scale_factor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_pixels_back_to_pointer_space() {
        let shot = Screenshot {
                image: RgbaImage::new(1, 1),
            scale_factor: 2.0,
        };
        assert_eq!(shot.to_pointer_coords(301, 100), (151, 50));

        let unscaled = Screenshot {
            scale_factor: 1.0,
            ..shot
        };
        assert_eq!(unscaled.to_pointer_coords(301, 100), (301, 100));
    }
}
