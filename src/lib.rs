pub mod app;
pub mod audio;
pub mod config;
pub mod distortion;
pub mod engine;
pub mod error;
pub mod frame;
pub mod fx;
pub mod logging;
pub mod messages;
pub mod pipeline;
pub mod render;
pub mod segmentation;
pub mod shared;
pub mod terminal;
pub mod video;
