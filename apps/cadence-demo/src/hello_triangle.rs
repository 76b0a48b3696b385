//! A single colored triangle from a host-visible vertex buffer.

use std::mem::{offset_of, size_of};

use ash::vk;
use bytemuck::{Pod, Zeroable};
use cadence_app::{AppContext, Renderer};
use cadence_core::Extent2d;
use cadence_frame::ColorTarget;
use cadence_gpu::{
    GpuBuffer, GraphicsPipeline, GraphicsPipelineConfig, ShaderStage, VulkanApi,
    VulkanCommandList,
};
use glam::{Vec3, Vec4};
use gpu_allocator::MemoryLocation;
use tracing::{info, warn};

const CLEAR_COLOR: [f32; 4] = [0.0, 0.2, 0.4, 1.0];

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: [f32; 4],
}

impl Vertex {
    fn new(position: Vec3, color: Vec4) -> Self {
        Self {
            position: position.to_array(),
            color: color.to_array(),
        }
    }

    fn bindings() -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }]
    }

    fn attributes() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Self, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32B32A32_SFLOAT,
                offset: offset_of!(Self, color) as u32,
            },
        ]
    }
}

/// Triangle corners, stretched vertically by the aspect ratio.
fn triangle(aspect: f32) -> [Vertex; 3] {
    [
        Vertex::new(Vec3::new(0.0, 0.25 * aspect, 0.0), Vec4::new(1.0, 0.0, 0.0, 1.0)),
        Vertex::new(Vec3::new(0.25, -0.25 * aspect, 0.0), Vec4::new(0.0, 1.0, 0.0, 1.0)),
        Vertex::new(Vec3::new(-0.25, -0.25 * aspect, 0.0), Vec4::new(0.0, 0.0, 1.0, 1.0)),
    ]
}

pub struct HelloTriangle {
    pipeline: GraphicsPipeline,
    vertices: GpuBuffer,
}

impl Renderer for HelloTriangle {
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
        let data = triangle(ctx.extent().aspect_ratio());
        let mut vertices = ctx.gpu.allocator().lock().create_buffer(
            size_of::<[Vertex; 3]>() as u64,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            MemoryLocation::CpuToGpu,
            "triangle_vertices",
        )?;
        vertices.write(&data)?;

        let shader = cadence_shaders::hello_triangle();
        let config = GraphicsPipelineConfig {
            stages: vec![
                ShaderStage::vertex(shader, cadence_shaders::HELLO_TRIANGLE_VERTEX_ENTRY),
                ShaderStage::fragment(shader, cadence_shaders::HELLO_TRIANGLE_FRAGMENT_ENTRY),
            ],
            vertex_bindings: Vertex::bindings(),
            vertex_attributes: Vertex::attributes(),
            cull_mode: vk::CullModeFlags::NONE,
            color_formats: vec![ctx.color_format()],
            depth_format: ctx.depth_format(),
            ..Default::default()
        };

        // SAFETY: the device is valid and the shader is validated SPIR-V
        let pipeline = match unsafe { GraphicsPipeline::new(ctx.gpu.device(), &config, &[], &[]) }
        {
            Ok(pipeline) => pipeline,
            Err(e) => {
                if let Err(free_err) = ctx.gpu.allocator().lock().free_buffer(&mut vertices) {
                    warn!("Failed to free vertex buffer: {free_err}");
                }
                return Err(e.into());
            }
        };

        info!("Triangle pipeline created");
        Ok(Self { pipeline, vertices })
    }

    fn clear_color(&self) -> [f32; 4] {
        CLEAR_COLOR
    }

    fn render(
        &mut self,
        commands: &mut VulkanCommandList,
        _target: &ColorTarget<VulkanApi>,
    ) -> cadence_frame::Result<()> {
        let device = commands.device();
        let cmd = commands.handle();
        unsafe {
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline.pipeline);
            device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertices.buffer], &[0]);
            device.cmd_draw(cmd, 3, 1, 0, 0);
        }
        Ok(())
    }

    fn on_resize(&mut self, _ctx: &mut AppContext, extent: Extent2d) -> anyhow::Result<()> {
        // Frames are drained before a resize, so the buffer is idle.
        self.vertices.write(&triangle(extent.aspect_ratio()))?;
        Ok(())
    }

    fn destroy(&mut self, ctx: &mut AppContext) {
        unsafe { self.pipeline.destroy(ctx.gpu.device()) };
        if let Err(e) = ctx.gpu.allocator().lock().free_buffer(&mut self.vertices) {
            warn!("Failed to free vertex buffer: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_shader_inputs() {
        assert_eq!(size_of::<Vertex>(), 28);
        let attributes = Vertex::attributes();
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[1].offset, 12);
        assert_eq!(Vertex::bindings()[0].stride, 28);
    }

    #[test]
    fn triangle_scales_with_aspect() {
        let square = triangle(1.0);
        let wide = triangle(16.0 / 9.0);
        assert_eq!(square[0].position, [0.0, 0.25, 0.0]);
        assert!(wide[0].position[1] > square[0].position[1]);
        assert_eq!(wide[1].position[0], 0.25);
        assert_eq!(wide[2].color, [0.0, 0.0, 1.0, 1.0]);
    }
}
