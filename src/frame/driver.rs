use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::{debug, error, warn};
use vulkano::swapchain::{acquire_next_image, AcquireError, PresentInfo};
use vulkano::sync::{self, FlushError, GpuFuture};
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::CursorGrabMode;

use crate::config::input::InputState;
use crate::config::vulkan::GfxContext;
use crate::error::GfxError;
use crate::scene_pkg::scene::Scene;

use super::hud::Hud;
use super::scene_renderer::SceneRenderer;

/// Update steps are clamped so a long stall (debugger, window drag)
/// does not teleport every strategy.
const MAX_DELTA_TIME: f32 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Running,
    /// The presentation surface is gone; updates and rendering are
    /// suspended until it comes back.
    Paused,
    Disposed,
}

/// The frame lifecycle machine. Kept separate from the event loop so
/// the transition rules hold without a window or device.
pub struct FrameDriver {
    state: DriverState,
}

impl FrameDriver {
    pub fn new() -> FrameDriver {
        FrameDriver {
            state: DriverState::Uninitialized,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn should_render(&self) -> bool {
        self.state == DriverState::Running
    }

    pub fn start(&mut self) -> bool {
        if self.state != DriverState::Uninitialized {
            return false;
        }
        self.state = DriverState::Running;
        true
    }

    pub fn context_lost(&mut self) -> bool {
        if self.state != DriverState::Running {
            return false;
        }
        debug!("render context lost, pausing");
        self.state = DriverState::Paused;
        true
    }

    pub fn context_restored(&mut self) -> bool {
        if self.state != DriverState::Paused {
            return false;
        }
        debug!("render context restored, resuming");
        self.state = DriverState::Running;
        true
    }

    pub fn dispose(&mut self) {
        self.state = DriverState::Disposed;
    }
}

impl Default for FrameDriver {
    fn default() -> FrameDriver {
        FrameDriver::new()
    }
}

/// Owns the window event loop: feeds input to the scene, steps the
/// strategies with a clamped delta, renders through the scene renderer
/// and presents. Swapchain loss pauses the driver; once the swapchain
/// is rebuilt the renderers are recreated, which also re-bakes the
/// shadow map.
pub fn run(
    scene: Scene,
    input: Arc<Mutex<InputState>>,
    mut hud: Hud,
    title: &str,
) -> Result<(), GfxError> {
    let event_loop = EventLoop::new();
    let mut gfx = GfxContext::new(&event_loop, title)?;

    let window = gfx.surface.window();
    if window.set_cursor_grab(CursorGrabMode::Confined).is_err() {
        warn!("cursor grab unavailable, mouse look may escape the window");
    }
    window.set_cursor_visible(false);

    let scene = Arc::new(Mutex::new(scene));
    let mut renderer = {
        let scene_locked = scene
            .lock()
            .map_err(|_| GfxError::creation("scene lock", "poisoned"))?;
        SceneRenderer::new(
            gfx.queue.clone(),
            &scene_locked,
            gfx.swapchain.image_format(),
            gfx.max_anisotropy,
        )?
    };

    let mut driver = FrameDriver::new();
    driver.start();

    let mut recreate_swapchain = false;
    let mut previous_frame_end: Option<Box<dyn GpuFuture>> =
        Some(sync::now(gfx.device.clone()).boxed());
    let mut last_frame = Instant::now();

    event_loop.run(move |event, _, control_flow| {
        if let Ok(mut input_locked) = input.lock() {
            input_locked.handle_event(&event);
        }

        match event {
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } => {
                driver.dispose();
                *control_flow = ControlFlow::Exit;
            }
            Event::WindowEvent {
                event: WindowEvent::Resized(_),
                ..
            } => {
                recreate_swapchain = true;
            }
            Event::RedrawEventsCleared => {
                let dimensions = gfx.surface.window().inner_size();
                if dimensions.width == 0 || dimensions.height == 0 {
                    return;
                }
                if driver.state() == DriverState::Disposed {
                    return;
                }
                if let Some(future) = previous_frame_end.as_mut() {
                    future.cleanup_finished();
                }

                if recreate_swapchain {
                    match gfx.recreate_swapchain() {
                        Ok(true) => {
                            recreate_swapchain = false;
                            if driver.context_restored() {
                                // The surface came back: rebuild the GPU
                                // side, including a fresh shadow bake.
                                let scene_locked = match scene.lock() {
                                    Ok(locked) => locked,
                                    Err(_) => return,
                                };
                                match SceneRenderer::new(
                                    gfx.queue.clone(),
                                    &scene_locked,
                                    gfx.swapchain.image_format(),
                                    gfx.max_anisotropy,
                                ) {
                                    Ok(new_renderer) => renderer = new_renderer,
                                    Err(err) => {
                                        error!("could not rebuild renderer: {}", err);
                                        driver.dispose();
                                        *control_flow = ControlFlow::Exit;
                                        return;
                                    }
                                }
                            }
                        }
                        Ok(false) => return,
                        Err(err) => {
                            error!("could not recreate swapchain: {}", err);
                            driver.dispose();
                            *control_flow = ControlFlow::Exit;
                            return;
                        }
                    }
                }

                if !driver.should_render() {
                    return;
                }

                let (image_num, suboptimal, acquire_future) =
                    match acquire_next_image(gfx.swapchain.clone(), None) {
                        Ok(r) => r,
                        Err(AcquireError::OutOfDate) => {
                            driver.context_lost();
                            recreate_swapchain = true;
                            return;
                        }
                        Err(err) => {
                            error!("could not acquire swapchain image: {}", err);
                            return;
                        }
                    };
                if suboptimal {
                    recreate_swapchain = true;
                }

                let now = Instant::now();
                let delta_time = now
                    .duration_since(last_frame)
                    .as_secs_f32()
                    .min(MAX_DELTA_TIME);
                last_frame = now;

                {
                    let mut scene_locked = match scene.lock() {
                        Ok(locked) => locked,
                        Err(_) => return,
                    };
                    scene_locked.update(delta_time);
                }
                hud.update(delta_time);

                let before_future = match previous_frame_end.take() {
                    Some(future) => future.join(acquire_future),
                    None => sync::now(gfx.device.clone()).boxed().join(acquire_future),
                };

                let scene_locked = match scene.lock() {
                    Ok(locked) => locked,
                    Err(_) => return,
                };
                let after_future = match renderer.draw(
                    &scene_locked,
                    gfx.images[image_num].clone(),
                    before_future,
                ) {
                    Ok(future) => future,
                    Err(err) => {
                        error!("frame aborted: {}", err);
                        previous_frame_end = Some(sync::now(gfx.device.clone()).boxed());
                        return;
                    }
                };
                drop(scene_locked);

                let present_future = after_future
                    .then_swapchain_present(
                        gfx.queue.clone(),
                        PresentInfo {
                            index: image_num,
                            ..PresentInfo::swapchain(gfx.swapchain.clone())
                        },
                    )
                    .then_signal_fence_and_flush();

                match present_future {
                    Ok(future) => {
                        previous_frame_end = Some(future.boxed());
                    }
                    Err(FlushError::OutOfDate) => {
                        driver.context_lost();
                        recreate_swapchain = true;
                        previous_frame_end = Some(sync::now(gfx.device.clone()).boxed());
                    }
                    Err(err) => {
                        error!("could not flush frame: {}", err);
                        previous_frame_end = Some(sync::now(gfx.device.clone()).boxed());
                    }
                }

                hud.draw(&renderer.stats, gfx.surface.window());
            }
            _ => (),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_only_from_uninitialized() {
        let mut driver = FrameDriver::new();
        assert_eq!(driver.state(), DriverState::Uninitialized);
        assert!(!driver.should_render());

        assert!(driver.start());
        assert_eq!(driver.state(), DriverState::Running);
        assert!(driver.should_render());

        assert!(!driver.start());
    }

    #[test]
    fn context_loss_pauses_and_restore_resumes() {
        let mut driver = FrameDriver::new();
        driver.start();

        assert!(driver.context_lost());
        assert_eq!(driver.state(), DriverState::Paused);
        assert!(!driver.should_render());

        // Losing an already-lost context changes nothing.
        assert!(!driver.context_lost());

        assert!(driver.context_restored());
        assert!(driver.should_render());
    }

    #[test]
    fn restore_requires_a_prior_loss() {
        let mut driver = FrameDriver::new();
        driver.start();
        assert!(!driver.context_restored());
        assert_eq!(driver.state(), DriverState::Running);
    }

    #[test]
    fn dispose_is_terminal() {
        let mut driver = FrameDriver::new();
        driver.start();
        driver.dispose();
        assert_eq!(driver.state(), DriverState::Disposed);

        assert!(!driver.start());
        assert!(!driver.context_lost());
        assert!(!driver.context_restored());
        assert!(!driver.should_render());
    }
}
