//! Clears every frame to a slowly cycling color. No geometry.

use std::f32::consts::TAU;

use cadence_app::{AppContext, Renderer};
use cadence_frame::ColorTarget;
use cadence_gpu::{VulkanApi, VulkanCommandList};
use glam::Vec3;

/// Seconds for one full cycle through the hues.
const PERIOD: f32 = 6.0;

pub struct ClearColor {
    time: f32,
}

/// Three phase-shifted sine waves, one per channel.
fn color_at(time: f32) -> [f32; 4] {
    let phase = Vec3::splat(time / PERIOD * TAU) + Vec3::new(0.0, TAU / 3.0, 2.0 * TAU / 3.0);
    let rgb = Vec3::new(phase.x.sin(), phase.y.sin(), phase.z.sin()) * 0.5 + Vec3::splat(0.5);
    rgb.extend(1.0).to_array()
}

impl Renderer for ClearColor {
    fn init(_ctx: &mut AppContext) -> anyhow::Result<Self> {
        Ok(Self { time: 0.0 })
    }

    fn update(&mut self, _ctx: &AppContext, dt: f32) {
        self.time = (self.time + dt) % PERIOD;
    }

    fn clear_color(&self) -> [f32; 4] {
        color_at(self.time)
    }

    fn render(
        &mut self,
        _commands: &mut VulkanCommandList,
        _target: &ColorTarget<VulkanApi>,
    ) -> cadence_frame::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_stay_in_range() {
        for step in 0..60u8 {
            let color = color_at(f32::from(step) * 0.1);
            assert!(color.iter().all(|c| (0.0..=1.0).contains(c)), "{color:?}");
            assert!((color[3] - 1.0).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn cycle_repeats() {
        let start = color_at(0.0);
        let later = color_at(PERIOD);
        for (a, b) in start.iter().zip(later) {
            assert!((a - b).abs() < 1e-4);
        }
    }
}
