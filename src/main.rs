use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use log::error;

use ember3d::config::demo_scene::demo_scene;
use ember3d::config::input::InputState;
use ember3d::frame::driver;
use ember3d::frame::hud::{FpsCounter, Hud};
use ember3d::scene_pkg::scene::Scene;

const TITLE: &str = "ember3d";

fn main() -> ExitCode {
    env_logger::init();

    let input = Arc::new(Mutex::new(InputState::new()));
    let descriptor = demo_scene(input.clone(), 1920.0 / 1080.0);

    let scene = match Scene::init(descriptor) {
        Ok(scene) => scene,
        Err(err) => {
            error!("could not build scene: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let hud = Hud::new().with_element(Box::new(FpsCounter::new(TITLE)));

    if let Err(err) = driver::run(scene, input, hud, TITLE) {
        error!("{}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
