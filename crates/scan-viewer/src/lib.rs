//! Point-cloud scan viewer library.
//!
//! Loads a PLY scan and a list of marker coordinates, frames the camera on
//! the scan and renders the markers as lit spheres with screen-space glows.

pub mod app;
pub mod bounds;
pub mod camera;
pub mod config;
pub mod coords;
pub mod data;
pub mod error;
pub mod markers;
pub mod net;
pub mod render_loop;
pub mod renderer;
pub mod scene;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;
