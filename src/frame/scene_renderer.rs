use std::sync::Arc;

use log::warn;
use vulkano::device::Queue;
use vulkano::format::Format;
use vulkano::image::view::ImageView;
use vulkano::image::{AttachmentImage, ImageUsage, ImageViewAbstract};
use vulkano::sync::GpuFuture;

use crate::error::GfxError;
use crate::scene_pkg::scene::Scene;

use super::forward_pass::forward_renderer::ForwardRenderer;
use super::frame_plan::FramePlanner;
use super::lens_flare_pass::lens_flare_renderer::LensFlareRenderer;
use super::shadow_pass::shadow_map_renderer::ShadowMapRenderer;

/// Counters accumulated across the session, exposed to the HUD.
#[derive(Clone, Copy, Debug, Default)]
pub struct RenderStats {
    pub frames: u64,
    pub shadow_passes: u64,
    /// Draw calls recorded for the most recent frame.
    pub last_draw_calls: usize,
}

/// Runs the passes a frame plan calls for: the one-time shadow bake,
/// the forward color pass, and the lens flare composite. When the lens
/// flare is declared, the forward pass targets an offscreen image the
/// composite samples; otherwise it writes the swapchain image directly.
pub struct SceneRenderer {
    gfx_queue: Arc<Queue>,
    output_format: Format,
    planner: FramePlanner,
    shadow_map_renderer: Option<ShadowMapRenderer>,
    forward_renderer: ForwardRenderer,
    lens_flare_renderer: Option<LensFlareRenderer>,

    scene_color: Option<Arc<ImageView<AttachmentImage>>>,
    fallback_shadow: Arc<ImageView<AttachmentImage>>,

    pub stats: RenderStats,
}

impl SceneRenderer {
    pub fn new(
        gfx_queue: Arc<Queue>,
        scene: &Scene,
        output_format: Format,
        max_anisotropy: Option<f32>,
    ) -> Result<SceneRenderer, GfxError> {
        let mut planner = FramePlanner::new(scene.shadows.enabled);

        // A failed shadow allocation degrades to an unshadowed session
        // instead of refusing to start.
        let shadow_map_renderer = if scene.shadows.enabled && scene.light.is_some() {
            match ShadowMapRenderer::new(gfx_queue.clone(), scene) {
                Ok(renderer) => Some(renderer),
                Err(err) => {
                    warn!("shadow map unavailable, rendering without shadows: {}", err);
                    planner.disable_shadows();
                    None
                }
            }
        } else {
            None
        };

        let forward_renderer =
            ForwardRenderer::new(gfx_queue.clone(), scene, output_format, max_anisotropy)?;

        let lens_flare_renderer = if scene.light.as_ref().map_or(false, |light| light.lens_flare) {
            Some(LensFlareRenderer::new(gfx_queue.clone(), output_format)?)
        } else {
            None
        };

        let fallback_shadow = ImageView::new_default(
            AttachmentImage::with_usage(
                gfx_queue.device().clone(),
                [1, 1],
                Format::D16_UNORM,
                ImageUsage {
                    sampled: true,
                    ..ImageUsage::empty()
                },
            )
            .map_err(|e| GfxError::creation("fallback shadow image", e))?,
        )
        .map_err(|e| GfxError::creation("fallback shadow image view", e))?;

        Ok(SceneRenderer {
            gfx_queue,
            output_format,
            planner,
            shadow_map_renderer,
            forward_renderer,
            lens_flare_renderer,
            scene_color: None,
            fallback_shadow,
            stats: RenderStats::default(),
        })
    }

    /// Renders one frame into `final_image`, chained after
    /// `before_future`. Without an active camera only the clear runs.
    pub fn draw<F: GpuFuture + 'static>(
        &mut self,
        scene: &Scene,
        final_image: Arc<dyn ImageViewAbstract + 'static>,
        before_future: F,
    ) -> Result<Box<dyn GpuFuture>, GfxError> {
        let mut future: Box<dyn GpuFuture> = before_future.boxed();
        let mut draw_calls = 0;

        let mut plan = match self.planner.plan(scene) {
            Some(plan) => plan,
            None => {
                // Blank frame: clear the swapchain image and stop.
                self.forward_renderer.begin_render_pass(final_image)?;
                future = self.forward_renderer.end_render_pass(future)?;
                self.stats.frames += 1;
                self.stats.last_draw_calls = 0;
                return Ok(future);
            }
        };

        if plan.bake_shadow_map {
            if let Some(shadow_renderer) = &mut self.shadow_map_renderer {
                match shadow_renderer.begin_render_pass() {
                    Ok(()) => {
                        draw_calls += shadow_renderer.draw(scene);
                        future = shadow_renderer.end_render_pass(future)?;
                        self.stats.shadow_passes += 1;
                    }
                    Err(err) => {
                        warn!("shadow bake failed, rendering without shadows: {}", err);
                        self.planner.disable_shadows();
                        self.shadow_map_renderer = None;
                        // The map was never written; this frame's
                        // forward pass must not sample it as baked.
                        plan.shadows_active = false;
                    }
                }
            }
        }

        let shadow_image: Arc<dyn ImageViewAbstract + 'static> = match &self.shadow_map_renderer {
            Some(renderer) => renderer.shadow_image.clone(),
            None => self.fallback_shadow.clone(),
        };

        let forward_target: Arc<dyn ImageViewAbstract + 'static> =
            if self.lens_flare_renderer.is_some() {
                self.scene_color_for(final_image.dimensions().width_height())?
            } else {
                final_image.clone()
            };

        self.forward_renderer.begin_render_pass(forward_target)?;
        draw_calls += self.forward_renderer.draw(scene, &plan, shadow_image);
        future = self.forward_renderer.end_render_pass(future)?;

        if let Some(flare_renderer) = &mut self.lens_flare_renderer {
            let scene_color = self
                .scene_color
                .clone()
                .ok_or_else(|| GfxError::creation("lens flare input", "missing scene color"))?;
            flare_renderer.begin_render_pass(final_image)?;
            draw_calls += flare_renderer.draw(scene_color, plan.lens_flare.as_ref());
            future = flare_renderer.end_render_pass(future)?;
        }

        self.stats.frames += 1;
        self.stats.last_draw_calls = draw_calls;
        Ok(future)
    }

    fn scene_color_for(
        &mut self,
        dimensions: [u32; 2],
    ) -> Result<Arc<dyn ImageViewAbstract + 'static>, GfxError> {
        let matches = self
            .scene_color
            .as_ref()
            .map_or(false, |view| view.dimensions().width_height() == dimensions);
        if !matches {
            let image = AttachmentImage::with_usage(
                self.gfx_queue.device().clone(),
                dimensions,
                self.output_format,
                ImageUsage {
                    sampled: true,
                    ..ImageUsage::empty()
                },
            )
            .map_err(|e| GfxError::creation("scene color image", e))?;
            let view = ImageView::new_default(image)
                .map_err(|e| GfxError::creation("scene color image view", e))?;
            self.scene_color = Some(view);
        }
        self.scene_color
            .clone()
            .map(|view| view as Arc<dyn ImageViewAbstract + 'static>)
            .ok_or_else(|| GfxError::creation("scene color image", "missing after creation"))
    }
}
