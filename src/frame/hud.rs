use std::time::Duration;

use log::info;
use winit::window::Window;

use super::scene_renderer::RenderStats;

/// A passive overlay: `update` runs with the scene update, before the
/// frame renders; `draw` runs after presentation with that frame's
/// counters. Elements never touch GPU state.
pub trait HudElement {
    fn update(&mut self, delta_time: f32);
    fn draw(&mut self, stats: &RenderStats, window: &Window);
}

#[derive(Default)]
pub struct Hud {
    elements: Vec<Box<dyn HudElement>>,
}

impl Hud {
    pub fn new() -> Hud {
        Hud::default()
    }

    pub fn with_element(mut self, element: Box<dyn HudElement>) -> Hud {
        self.elements.push(element);
        self
    }

    pub fn update(&mut self, delta_time: f32) {
        for element in &mut self.elements {
            element.update(delta_time);
        }
    }

    pub fn draw(&mut self, stats: &RenderStats, window: &Window) {
        for element in &mut self.elements {
            element.draw(stats, window);
        }
    }
}

/// Averages the frame rate over one-second windows and writes it to the
/// window title.
pub struct FpsCounter {
    title: String,
    elapsed: f32,
    frames: u32,
}

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

impl FpsCounter {
    pub fn new(title: &str) -> FpsCounter {
        FpsCounter {
            title: title.to_string(),
            elapsed: 0.0,
            frames: 0,
        }
    }
}

impl HudElement for FpsCounter {
    fn update(&mut self, delta_time: f32) {
        self.elapsed += delta_time;
    }

    fn draw(&mut self, stats: &RenderStats, window: &Window) {
        self.frames += 1;
        if self.elapsed < REPORT_INTERVAL.as_secs_f32() {
            return;
        }

        let fps = self.frames as f32 / self.elapsed;
        window.set_title(&format!(
            "{} | {:.0} fps | {} draws",
            self.title, fps, stats.last_draw_calls
        ));
        info!(
            "{:.1} fps, {} draw calls, {} frames total",
            fps, stats.last_draw_calls, stats.frames
        );
        self.elapsed = 0.0;
        self.frames = 0;
    }
}
