//! Drone Viewer
//!
//! Interactive viewer for a drone model:
//! - Loads a glTF model and an equirectangular environment in the background
//! - Lights the model with a shadow-casting spot light and image-based light
//! - Orbits the camera with damping; click a part to isolate it and read
//!   its description

mod app;
mod assets;
mod config;
mod describe;
mod interaction;
mod render;
mod scene;
mod session;
mod ui;

use std::process::ExitCode;

fn main() -> ExitCode {
    app::run()
}
