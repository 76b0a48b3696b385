//! Per-frame command recording.

use tracing::{trace, warn};

use crate::backend::{ColorTarget, CommandList, GpuApi, ResourceState};
use crate::error::{FrameError, Result};
use crate::slots::RecordingSlot;

/// Content drawn into each frame.
pub trait SceneContent<A: GpuApi> {
    /// Color the target is cleared to before drawing.
    fn clear_color(&self) -> [f32; 4];

    /// Record draw commands. The target is already bound and cleared.
    fn draw(&mut self, commands: &mut A::CommandList, target: &ColorTarget<A>) -> Result<()>;
}

/// A fixed clear color and nothing else.
impl<A: GpuApi> SceneContent<A> for [f32; 4] {
    fn clear_color(&self) -> [f32; 4] {
        *self
    }

    fn draw(&mut self, _commands: &mut A::CommandList, _target: &ColorTarget<A>) -> Result<()> {
        Ok(())
    }
}

/// Builds the single command list submitted for a frame.
///
/// The list always brackets the scene with a presentable → render target
/// transition and its inverse, and is always closed, even when recording fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandRecorder;

/// Recording progress, used to unwind a list that failed part-way.
struct Progress<A: GpuApi> {
    image: A::Image,
    state: ResourceState,
    rendering: bool,
}

impl<A: GpuApi> Progress<A> {
    fn transition(&mut self, commands: &mut A::CommandList, to: ResourceState) -> Result<()> {
        if self.state == to {
            return Err(FrameError::RecordingFailure(format!(
                "image is already in {to:?}"
            )));
        }
        commands.transition(self.image, self.state, to)?;
        self.state = to;
        Ok(())
    }
}

impl CommandRecorder {
    pub const fn new() -> Self {
        Self
    }

    /// Record and close the frame's commands into `slot`.
    ///
    /// Any failure is reported as [`FrameError::RecordingFailure`], except device
    /// loss, which is passed through unchanged.
    pub fn record<A: GpuApi>(
        &self,
        slot: &mut RecordingSlot<'_, A>,
        target: &ColorTarget<A>,
        depth: Option<A::RenderTargetView>,
        scene: &mut dyn SceneContent<A>,
    ) -> Result<A::CommandList> {
        let mut commands = slot.begin_commands().map_err(into_recording_failure)?;
        let mut progress = Progress::<A> {
            image: target.image,
            state: ResourceState::Present,
            rendering: false,
        };

        let body = Self::record_body(&mut commands, &mut progress, target, depth, scene);
        if let Err(err) = body {
            Self::unwind(&mut commands, &progress);
            return Err(into_recording_failure(err));
        }

        commands.finish().map_err(into_recording_failure)?;
        trace!(
            slot = slot.index(),
            image_index = target.image_index,
            "command list closed"
        );
        Ok(commands)
    }

    fn record_body<A: GpuApi>(
        commands: &mut A::CommandList,
        progress: &mut Progress<A>,
        target: &ColorTarget<A>,
        depth: Option<A::RenderTargetView>,
        scene: &mut dyn SceneContent<A>,
    ) -> Result<()> {
        progress.transition(commands, ResourceState::RenderTarget)?;

        commands.begin_rendering(target, depth, scene.clear_color())?;
        progress.rendering = true;
        scene.draw(commands, target)?;
        commands.end_rendering()?;
        progress.rendering = false;

        progress.transition(commands, ResourceState::Present)
    }

    /// Close a list that failed part-way. Secondary errors are logged only.
    fn unwind<A: GpuApi>(commands: &mut A::CommandList, progress: &Progress<A>) {
        if progress.rendering {
            if let Err(err) = commands.end_rendering() {
                warn!(%err, "failed to end rendering on abandoned command list");
            }
        }
        if let Err(err) = commands.finish() {
            warn!(%err, "failed to close abandoned command list");
        }
    }
}

fn into_recording_failure(err: FrameError) -> FrameError {
    match err {
        FrameError::DeviceLost(_) | FrameError::RecordingFailure(_) => err,
        other => FrameError::RecordingFailure(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_loss_passes_through() {
        let lost = FrameError::DeviceLost("gone".to_string());
        assert_eq!(into_recording_failure(lost.clone()), lost);
    }

    #[test]
    fn other_errors_become_recording_failures() {
        let err = into_recording_failure(FrameError::Backend("oom".to_string()));
        assert!(matches!(err, FrameError::RecordingFailure(msg) if msg.contains("oom")));
    }
}
