#![allow(dead_code)]

pub mod synthetic_image;
pub mod temp_dir;
