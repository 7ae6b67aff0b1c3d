pub mod app;
pub mod collect;
pub mod config;
pub mod domain;
pub mod error;
pub mod exif;
pub mod fetch;
pub mod fs_util;
pub mod kaggle;
pub mod layout;
pub mod manifest;
pub mod mask;
pub mod output;
pub mod registry;
pub mod sampler;
