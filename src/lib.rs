mod app;
mod class_map;
mod engine;
mod model;
mod preprocess;
mod weights;

pub mod config;
pub mod error;
pub mod prediction;

pub use app::run;
pub use engine::predict;
