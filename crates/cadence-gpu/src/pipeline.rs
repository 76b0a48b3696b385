//! Graphics pipeline creation for dynamic rendering.

use std::ffi::CStr;

use ash::vk;

use crate::error::{GpuError, Result};

/// One programmable stage of a pipeline.
///
/// Stages that share `code` share a shader module, so a module with several
/// entry points is only loaded once.
#[derive(Clone, Copy)]
pub struct ShaderStage {
    pub stage: vk::ShaderStageFlags,
    pub code: &'static [u32],
    pub entry: &'static CStr,
}

impl ShaderStage {
    pub const fn vertex(code: &'static [u32], entry: &'static CStr) -> Self {
        Self {
            stage: vk::ShaderStageFlags::VERTEX,
            code,
            entry,
        }
    }

    pub const fn fragment(code: &'static [u32], entry: &'static CStr) -> Self {
        Self {
            stage: vk::ShaderStageFlags::FRAGMENT,
            code,
            entry,
        }
    }
}

/// Graphics pipeline configuration.
#[derive(Clone)]
pub struct GraphicsPipelineConfig {
    pub stages: Vec<ShaderStage>,
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub topology: vk::PrimitiveTopology,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub color_formats: Vec<vk::Format>,
    /// Depth attachment format. Depth testing is enabled when set.
    pub depth_format: Option<vk::Format>,
}

impl Default for GraphicsPipelineConfig {
    fn default() -> Self {
        Self {
            stages: Vec::new(),
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            color_formats: vec![vk::Format::B8G8R8A8_SRGB],
            depth_format: None,
        }
    }
}

/// Shader modules created for one pipeline, destroyed once it is built.
struct ShaderModules<'a> {
    device: &'a ash::Device,
    modules: Vec<(*const u32, vk::ShaderModule)>,
}

impl<'a> ShaderModules<'a> {
    fn load(
        device: &'a ash::Device,
        stages: &[ShaderStage],
    ) -> Result<(Self, Vec<vk::ShaderModule>)> {
        let mut loaded = Self {
            device,
            modules: Vec::new(),
        };
        let mut per_stage = Vec::with_capacity(stages.len());

        for stage in stages {
            let key = stage.code.as_ptr();
            let module = match loaded.modules.iter().find(|(code, _)| *code == key) {
                Some(&(_, module)) => module,
                None => {
                    let info = vk::ShaderModuleCreateInfo::default().code(stage.code);
                    let module = unsafe { device.create_shader_module(&info, None) }
                        .map_err(|e| GpuError::ShaderModule(format!("{:?}: {e}", stage.stage)))?;
                    loaded.modules.push((key, module));
                    module
                }
            };
            per_stage.push(module);
        }

        Ok((loaded, per_stage))
    }
}

impl Drop for ShaderModules<'_> {
    fn drop(&mut self) {
        for &(_, module) in &self.modules {
            unsafe { self.device.destroy_shader_module(module, None) };
        }
    }
}

/// A graphics pipeline and its layout.
pub struct GraphicsPipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Create a pipeline for dynamic rendering (Vulkan 1.3).
    ///
    /// Viewport and scissor are dynamic state.
    ///
    /// # Safety
    /// The device must be valid and shader code must be valid SPIR-V.
    pub unsafe fn new(
        device: &ash::Device,
        config: &GraphicsPipelineConfig,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> Result<Self> {
        if config.stages.is_empty() {
            return Err(GpuError::PipelineCreation("no shader stages".to_string()));
        }
        let (_modules, per_stage) = ShaderModules::load(device, &config.stages)?;

        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(descriptor_set_layouts)
            .push_constant_ranges(push_constant_ranges);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .map_err(|e| GpuError::PipelineCreation(e.to_string()))?;

        match unsafe { Self::create(device, config, &per_stage, layout) } {
            Ok(pipeline) => Ok(Self { pipeline, layout }),
            Err(e) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                Err(e)
            }
        }
    }

    unsafe fn create(
        device: &ash::Device,
        config: &GraphicsPipelineConfig,
        modules: &[vk::ShaderModule],
        layout: vk::PipelineLayout,
    ) -> Result<vk::Pipeline> {
        let stages: Vec<_> = config
            .stages
            .iter()
            .zip(modules)
            .map(|(stage, &module)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(stage.stage)
                    .module(module)
                    .name(stage.entry)
            })
            .collect();

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&config.vertex_bindings)
            .vertex_attribute_descriptions(&config.vertex_attributes);
        let input_assembly =
            vk::PipelineInputAssemblyStateCreateInfo::default().topology(config.topology);
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(config.cull_mode)
            .front_face(config.front_face)
            .line_width(1.0);
        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth = config.depth_format.is_some();
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(depth)
            .depth_write_enable(depth)
            .depth_compare_op(vk::CompareOp::LESS);

        let blend_attachments = vec![
            vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA);
            config.color_formats.len()
        ];
        let color_blending =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&config.color_formats);
        if let Some(depth_format) = config.depth_format {
            rendering_info = rendering_info.depth_attachment_format(depth_format);
        }

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .push_next(&mut rendering_info);

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        }
        .map_err(|(_, e)| GpuError::PipelineCreation(e.to_string()))?;

        pipelines
            .first()
            .copied()
            .ok_or_else(|| GpuError::PipelineCreation("driver returned no pipeline".to_string()))
    }

    /// Destroy the pipeline.
    ///
    /// # Safety
    /// The device must be valid and the pipeline must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.layout, None);
        }
    }
}
