use std::sync::Arc;

use cgmath::Matrix4;
use vulkano::buffer::{BufferUsage, CpuAccessibleBuffer, CpuBufferPool, TypedBufferAccess};
use vulkano::command_buffer::{
    AutoCommandBufferBuilder, CommandBufferInheritanceInfo, CommandBufferUsage,
    SecondaryAutoCommandBuffer,
};
use vulkano::descriptor_set::{PersistentDescriptorSet, WriteDescriptorSet};
use vulkano::device::Queue;
use vulkano::pipeline::graphics::depth_stencil::DepthStencilState;
use vulkano::pipeline::graphics::input_assembly::InputAssemblyState;
use vulkano::pipeline::graphics::rasterization::{CullMode, RasterizationState};
use vulkano::pipeline::graphics::vertex_input::BuffersDefinition;
use vulkano::pipeline::graphics::viewport::{Viewport, ViewportState};
use vulkano::pipeline::{GraphicsPipeline, Pipeline, PipelineBindPoint};
use vulkano::render_pass::{RenderPass, Subpass};

use crate::error::{DrawError, GfxError};
use crate::scene_pkg::mesh::{Mesh, Vertex};

/// Records the depth-only draw for one object into the shadow map.
/// Only positions are bound; color state does not exist in this pass.
pub struct Object3DShadowPass {
    gfx_queue: Arc<Queue>,
    pipeline_depth: Arc<GraphicsPipeline>,
    subpass: Subpass,
    vertex_buffer: Arc<CpuAccessibleBuffer<[Vertex]>>,
    index_buffer: Arc<CpuAccessibleBuffer<[u16]>>,
    uniform_data_buffer: CpuBufferPool<vs_depth::ty::Data>,
}

impl Object3DShadowPass {
    pub fn new(
        gfx_queue: Arc<Queue>,
        render_pass: Arc<RenderPass>,
        mesh: &Mesh,
    ) -> Result<Object3DShadowPass, GfxError> {
        let subpass = Subpass::from(render_pass, 0)
            .ok_or_else(|| GfxError::creation("shadow subpass", "render pass has no subpass 0"))?;

        let vertex_buffer = CpuAccessibleBuffer::from_iter(
            gfx_queue.device().clone(),
            BufferUsage {
                vertex_buffer: true,
                ..BufferUsage::empty()
            },
            false,
            mesh.vertices.iter().copied(),
        )
        .map_err(|e| GfxError::creation("shadow vertex buffer", e))?;

        let index_buffer = CpuAccessibleBuffer::from_iter(
            gfx_queue.device().clone(),
            BufferUsage {
                index_buffer: true,
                ..BufferUsage::empty()
            },
            false,
            mesh.indices.iter().copied(),
        )
        .map_err(|e| GfxError::creation("shadow index buffer", e))?;

        let uniform_data_buffer = CpuBufferPool::<vs_depth::ty::Data>::new(
            gfx_queue.device().clone(),
            BufferUsage {
                uniform_buffer: true,
                ..BufferUsage::empty()
            },
        );

        let pipeline_depth = Object3DShadowPass::create_depth_pipeline(&gfx_queue, subpass.clone())?;

        Ok(Object3DShadowPass {
            gfx_queue,
            pipeline_depth,
            subpass,
            vertex_buffer,
            index_buffer,
            uniform_data_buffer,
        })
    }

    pub fn draw(
        &self,
        viewport_dimensions: [u32; 2],
        model: Matrix4<f32>,
        light_vp: Matrix4<f32>,
    ) -> Result<SecondaryAutoCommandBuffer, DrawError> {
        let uniform_buffer_subbuffer = self
            .uniform_data_buffer
            .from_data(vs_depth::ty::Data {
                model: model.into(),
                light_vp: light_vp.into(),
            })
            .map_err(|e| DrawError::command("shadow uniform upload", e))?;

        let layout = self
            .pipeline_depth
            .layout()
            .set_layouts()
            .get(0)
            .ok_or(DrawError::MissingSetLayout { index: 0 })?;
        let set = PersistentDescriptorSet::new(
            layout.clone(),
            [WriteDescriptorSet::buffer(0, uniform_buffer_subbuffer)],
        )
        .map_err(|e| DrawError::command("shadow descriptor set", e))?;

        let mut builder = AutoCommandBufferBuilder::secondary(
            self.gfx_queue.device().clone(),
            self.gfx_queue.queue_family_index(),
            CommandBufferUsage::MultipleSubmit,
            CommandBufferInheritanceInfo {
                render_pass: Some(self.subpass.clone().into()),
                ..Default::default()
            },
        )
        .map_err(|e| DrawError::command("shadow command buffer", e))?;
        builder
            .set_viewport(
                0,
                [Viewport {
                    origin: [0.0, 0.0],
                    dimensions: [viewport_dimensions[0] as f32, viewport_dimensions[1] as f32],
                    depth_range: 0.0..1.0,
                }],
            )
            .bind_pipeline_graphics(self.pipeline_depth.clone())
            .bind_descriptor_sets(
                PipelineBindPoint::Graphics,
                self.pipeline_depth.layout().clone(),
                0,
                set,
            )
            .bind_vertex_buffers(0, self.vertex_buffer.clone())
            .bind_index_buffer(self.index_buffer.clone())
            .draw_indexed(self.index_buffer.len() as u32, 1, 0, 0, 0)
            .map_err(|e| DrawError::command("shadow draw", e))?;
        builder
            .build()
            .map_err(|e| DrawError::command("shadow command buffer build", e))
    }

    fn create_depth_pipeline(
        gfx_queue: &Arc<Queue>,
        subpass: Subpass,
    ) -> Result<Arc<GraphicsPipeline>, GfxError> {
        let vs = vs_depth::load(gfx_queue.device().clone())
            .map_err(|e| GfxError::creation("shadow vertex shader", e))?;
        let fs = fs_depth::load(gfx_queue.device().clone())
            .map_err(|e| GfxError::creation("shadow fragment shader", e))?;
        let vs_entry = vs
            .entry_point("main")
            .ok_or_else(|| GfxError::creation("shadow vertex shader", "missing entry point"))?;
        let fs_entry = fs
            .entry_point("main")
            .ok_or_else(|| GfxError::creation("shadow fragment shader", "missing entry point"))?;

        // Front-face culling pushes self-shadowing acne onto surfaces
        // the light cannot see.
        GraphicsPipeline::start()
            .vertex_input_state(BuffersDefinition::new().vertex::<Vertex>())
            .vertex_shader(vs_entry, ())
            .input_assembly_state(InputAssemblyState::new())
            .viewport_state(ViewportState::viewport_dynamic_scissor_irrelevant())
            .fragment_shader(fs_entry, ())
            .depth_stencil_state(DepthStencilState::simple_depth_test())
            .rasterization_state(RasterizationState::default().cull_mode(CullMode::Front))
            .render_pass(subpass)
            .build(gfx_queue.device().clone())
            .map_err(|e| GfxError::creation("shadow pipeline", e))
    }
}

mod vs_depth {
    vulkano_shaders::shader! {
            ty: "vertex",
            src: "
#version 450

layout(location = 0) in vec3 position;

layout(set = 0, binding = 0) uniform Data {
    mat4 model;
    mat4 light_vp;
} uniforms;

void main() {
    gl_Position = uniforms.light_vp * uniforms.model * vec4(position, 1.0);
}",
    types_meta: {
        use bytemuck::{Pod, Zeroable};

        #[derive(Clone, Copy, Zeroable, Pod)]
    }
        }
}

mod fs_depth {
    vulkano_shaders::shader! {
        ty: "fragment",
        src: "
#version 450


void main() {
}"
    }
}
