use winit::dpi::PhysicalSize;

/// Window size in logical pixels plus the pixel ratio used for the drawing buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub pixel_ratio: f64,
}

impl Viewport {
    /// `scale_factor` is the device pixel ratio; the drawing buffer uses at most `max_pixel_ratio`.
    pub fn from_window(physical: PhysicalSize<u32>, scale_factor: f64, max_pixel_ratio: f64) -> Self {
        let scale_factor = if scale_factor > 0.0 { scale_factor } else { 1.0 };

        Self {
            width: physical.width as f64 / scale_factor,
            height: physical.height as f64 / scale_factor,
            pixel_ratio: scale_factor.min(max_pixel_ratio),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn aspect(&self) -> f32 {
        (self.width / self.height) as f32
    }

    pub fn drawing_buffer_size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(
            ((self.width * self.pixel_ratio).round() as u32).max(1),
            ((self.height * self.pixel_ratio).round() as u32).max(1),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_density_uses_window_size() {
        let viewport = Viewport::from_window(PhysicalSize::new(1280, 720), 1.0, 2.0);

        assert_eq!(viewport.width, 1280.0);
        assert_eq!(viewport.height, 720.0);
        assert!((viewport.aspect() - 16.0 / 9.0).abs() < 1e-6);
        assert_eq!(viewport.drawing_buffer_size(), PhysicalSize::new(1280, 720));
    }

    #[test]
    fn high_density_is_capped() {
        let viewport = Viewport::from_window(PhysicalSize::new(3000, 2000), 3.0, 2.0);

        assert_eq!(viewport.width, 1000.0);
        assert_eq!(viewport.height, 2000.0 / 3.0);
        assert_eq!(viewport.pixel_ratio, 2.0);
        assert_eq!(viewport.drawing_buffer_size(), PhysicalSize::new(2000, 1333));
    }

    #[test]
    fn retina_density_is_kept() {
        let viewport = Viewport::from_window(PhysicalSize::new(2880, 1800), 2.0, 2.0);
        assert_eq!(viewport.drawing_buffer_size(), PhysicalSize::new(2880, 1800));
        assert!((viewport.aspect() - 1.6).abs() < 1e-6);
    }

    #[test]
    fn minimised_window_is_empty() {
        let viewport = Viewport::from_window(PhysicalSize::new(0, 0), 1.0, 2.0);
        assert!(viewport.is_empty());
        assert_eq!(viewport.drawing_buffer_size(), PhysicalSize::new(1, 1));
    }
}
