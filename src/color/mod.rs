pub mod bezier;
pub mod mapping;

pub use mapping::{color_for_density, hsv_to_rgb, low_quality_color, pack_rgba, unpack_rgba};
