use egui::ColorImage;

/// Convertit un tampon de pixels RGBA8 empaquetés en ColorImage egui.
///
/// Les pixels sont en little-endian (octets r, g, b, a) : la réinterprétation
/// en octets suffit, aucun réarrangement de canaux.
pub fn pixels_to_color_image(pixels: &[u32], width: u32, height: u32) -> ColorImage {
    debug_assert_eq!(pixels.len(), width as usize * height as usize);
    let bytes: &[u8] = bytemuck::cast_slice(pixels);
    ColorImage::from_rgba_unmultiplied([width as usize, height as usize], bytes)
}
