use serde::{Deserialize, Serialize};

use crate::scene::SceneState;

/// Display size of the drawing surface, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn is_drawable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Everything the glow renderer needs for one frame. The renderer keeps no
/// state of its own; it draws one layered gradient per centre.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GlowFrame {
    pub centers: Vec<(f64, f64)>,
    pub intensity: f64,
}

impl GlowFrame {
    /// Projects the scene's normalized points onto `viewport`. The frame is
    /// empty when nothing would be visible.
    pub fn project(scene: &SceneState, intensity: f64, viewport: Viewport) -> Self {
        if scene.image.is_none()
            || intensity.is_nan()
            || intensity <= 0.0
            || !viewport.is_drawable()
        {
            return Self::default();
        }

        Self {
            centers: scene
                .points
                .iter()
                .map(|point| point.to_pixels(viewport.width, viewport.height))
                .collect(),
            intensity: intensity.min(1.0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ImageHandle, Point};

    fn scene() -> SceneState {
        SceneState {
            image: Some(ImageHandle::new(b"face".to_vec())),
            points: vec![Point { x: 0.25, y: 0.5 }, Point { x: 0.75, y: 0.5 }],
            locked: true,
            active_slot: None,
        }
    }

    #[test]
    fn projects_points_to_pixels() {
        let frame = GlowFrame::project(&scene(), 0.8, Viewport::new(400.0, 200.0));
        assert_eq!(frame.centers, vec![(100.0, 100.0), (300.0, 100.0)]);
        assert_eq!(frame.intensity, 0.8);
    }

    #[test]
    fn glow_off_yields_empty_frame() {
        assert!(GlowFrame::project(&scene(), 0.0, Viewport::new(400.0, 200.0)).is_empty());
        assert!(GlowFrame::project(&scene(), f64::NAN, Viewport::new(400.0, 200.0)).is_empty());
        assert!(GlowFrame::project(&scene(), 0.5, Viewport::new(0.0, 200.0)).is_empty());
        assert!(
            GlowFrame::project(&SceneState::default(), 0.5, Viewport::new(400.0, 200.0))
                .is_empty()
        );
    }
}
