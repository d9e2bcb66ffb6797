pub mod png;

pub use png::save_png;
