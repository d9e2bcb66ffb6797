use std::path::Path;

use image::{ImageError, RgbaImage};

/// Enregistre un tampon de pixels RGBA8 empaquetés au format PNG.
///
/// Les pixels sont en little-endian (octets r, g, b, a) : la réinterprétation
/// en octets est directe, sans réarrangement.
pub fn save_png(pixels: &[u32], width: u32, height: u32, output: &Path) -> Result<(), ImageError> {
    assert_eq!(
        pixels.len(),
        width as usize * height as usize,
        "Taille du tampon de pixels invalide"
    );

    let bytes: &[u8] = bytemuck::cast_slice(pixels);
    let img = RgbaImage::from_raw(width, height, bytes.to_vec()).ok_or_else(|| {
        ImageError::from(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Impossible de créer l'image depuis le tampon",
        ))
    })?;

    // Avec image 0.25, save() détecte automatiquement le format depuis l'extension
    img.save(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::pack_rgba;

    #[test]
    fn test_save_png_roundtrip() {
        let dir = std::env::temp_dir();
        let path = dir.join("attractor_io_test.png");

        let pixels: Vec<u32> = (0..16 * 16)
            .map(|i| pack_rgba((i % 256) as u8, 0, 128, 255))
            .collect();
        save_png(&pixels, 16, 16, &path).unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (16, 16));
        assert_eq!(img.get_pixel(1, 0).0, [1, 0, 128, 255]);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    #[should_panic]
    fn test_save_png_rejects_wrong_buffer_size() {
        let pixels = vec![0u32; 10];
        let _ = save_png(&pixels, 16, 16, Path::new("/tmp/never_written.png"));
    }
}
