//! Swapchain image set.
//!
//! The presentation engine decides which image comes next. The index is
//! re-queried every frame and is never derived from the frame cursor.

use cadence_core::Extent2d;
use tracing::{debug, trace, warn};

use crate::backend::{AcquiredImage, ColorTarget, GpuApi, PresentStatus, Presenter};
use crate::error::{FrameError, Result};

/// Presentable images plus bookkeeping for the one borrowed by the current frame.
pub struct SwapchainImageSet<A: GpuApi> {
    presenter: A::Presenter,
    borrowed: Option<AcquiredImage<A>>,
}

impl<A: GpuApi> SwapchainImageSet<A> {
    /// Wrap a presenter.
    pub const fn new(presenter: A::Presenter) -> Self {
        Self {
            presenter,
            borrowed: None,
        }
    }

    /// Borrow the next image for the frame recorded in `slot`.
    ///
    /// An index outside the set is handed straight back through `queue`.
    pub fn acquire_next(&mut self, queue: &mut A::Queue, slot: usize) -> Result<u32> {
        if let Some(borrowed) = self.borrowed {
            return Err(FrameError::Backend(format!(
                "image {} is still borrowed by an unfinished frame",
                borrowed.index
            )));
        }

        let acquired = self.presenter.acquire(slot)?;
        let count = self.presenter.image_count();
        if acquired.index as usize >= count {
            if let Err(err) = self.presenter.release(queue, acquired) {
                warn!(image_index = acquired.index, %err, "failed to release out-of-range image");
            }
            return Err(FrameError::InvalidImageIndex {
                index: acquired.index,
                count,
            });
        }

        trace!(slot, image_index = acquired.index, "image acquired");
        self.borrowed = Some(acquired);
        Ok(acquired.index)
    }

    /// Index of the image borrowed by the current frame.
    pub fn current_image_index(&self) -> Option<u32> {
        self.borrowed.map(|image| image.index)
    }

    /// Sync token of the borrowed image, for the frame's submission.
    pub fn borrowed_sync(&self, image_index: u32) -> Result<A::ImageSync> {
        match self.borrowed {
            Some(image) if image.index == image_index => Ok(image.sync),
            _ => Err(FrameError::ImageNotBorrowed(image_index)),
        }
    }

    /// Render target view for `image_index`.
    pub fn render_target_view(&self, image_index: u32) -> Result<A::RenderTargetView> {
        self.presenter
            .render_target_view(image_index)
            .ok_or_else(|| self.out_of_range(image_index))
    }

    /// Depth attachment view, if the set has one.
    pub fn depth_view(&self) -> Option<A::RenderTargetView> {
        self.presenter.depth_view()
    }

    /// Everything needed to bind `image_index` as the frame's output.
    pub fn color_target(&self, image_index: u32) -> Result<ColorTarget<A>> {
        let image = self
            .presenter
            .image(image_index)
            .ok_or_else(|| self.out_of_range(image_index))?;
        Ok(ColorTarget {
            image_index,
            image,
            view: self.render_target_view(image_index)?,
            extent: self.presenter.extent(),
        })
    }

    /// Present the borrowed image and give it back to the presentation engine.
    pub fn present(&mut self, queue: &mut A::Queue, image_index: u32) -> Result<PresentStatus> {
        let image = match self.borrowed {
            Some(image) if image.index == image_index => image,
            _ => return Err(FrameError::ImageNotBorrowed(image_index)),
        };
        self.borrowed = None;

        let status = self.presenter.present(queue, image)?;
        if status.needs_resize() {
            debug!(image_index, ?status, "swapchain wants to be re-created");
        }
        Ok(status)
    }

    /// Give back the borrowed image of an abandoned frame, if any.
    pub fn abandon(&mut self, queue: &mut A::Queue) -> Result<()> {
        if let Some(image) = self.borrowed.take() {
            debug!(image_index = image.index, "releasing image of abandoned frame");
            self.presenter.release(queue, image)?;
        }
        Ok(())
    }

    /// Re-create the images. All in-flight frames must have been drained.
    pub fn resize(&mut self, extent: Extent2d) -> Result<()> {
        if let Some(image) = self.borrowed {
            return Err(FrameError::Backend(format!(
                "cannot resize while image {} is borrowed",
                image.index
            )));
        }
        self.presenter.resize(extent)
    }

    /// Number of images.
    pub fn image_count(&self) -> usize {
        self.presenter.image_count()
    }

    /// Current image size.
    pub fn extent(&self) -> Extent2d {
        self.presenter.extent()
    }

    /// The wrapped presenter.
    pub const fn presenter(&self) -> &A::Presenter {
        &self.presenter
    }

    fn out_of_range(&self, index: u32) -> FrameError {
        FrameError::InvalidImageIndex {
            index,
            count: self.presenter.image_count(),
        }
    }
}
