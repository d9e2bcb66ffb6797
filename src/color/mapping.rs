//! Fonction de transfert densité -> couleur.
//!
//! La densité d'un pixel est rapportée au maximum courant en échelle
//! logarithmique, puis trois courbes de Bézier figées déforment la
//! saturation, le mélange vers le fond et l'opacité. Variante basse qualité :
//! couleur HSV plate, pleine opacité, quel que soit le compte.

use super::bezier::{DENSITY_CURVE, OPACITY_CURVE, SATURATION_CURVE};

/// Emballe (r, g, b, a) en RGBA8 little-endian (octets r, g, b, a en mémoire).
#[inline]
pub fn pack_rgba(r: u8, g: u8, b: u8, a: u8) -> u32 {
    ((a as u32) << 24) | ((b as u32) << 16) | ((g as u32) << 8) | r as u32
}

/// Déballe un pixel RGBA8 empaqueté en (r, g, b, a).
#[inline]
pub fn unpack_rgba(pixel: u32) -> [u8; 4] {
    [
        (pixel & 0xFF) as u8,
        ((pixel >> 8) & 0xFF) as u8,
        ((pixel >> 16) & 0xFF) as u8,
        ((pixel >> 24) & 0xFF) as u8,
    ]
}

#[inline]
fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Conversion HSV -> RGB (algorithme à six secteurs).
///
/// Entrées écrêtées à [0, 359] × [0, 100] × [0, 100] ; s == 0 court-circuite
/// vers le gris.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (u8, u8, u8) {
    let h = h.clamp(0.0, 359.0);
    let s = s.clamp(0.0, 100.0) / 100.0;
    let v = v.clamp(0.0, 100.0) / 100.0;

    if s == 0.0 {
        let gray = (v * 255.0).round() as u8;
        return (gray, gray, gray);
    }

    let h = h / 60.0;
    let i = h.floor();
    let f = h - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    let (r, g, b) = match i as i32 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    (
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    )
}

/// Couleur d'un pixel en fonction de sa densité.
///
/// - densité nulle : le fond est retourné tel quel, alpha compris ;
/// - sinon : ratio = ln(densité) / ln(max), saturation atténuée par la
///   courbe de saturation, RGB mélangé vers le fond par la courbe de
///   densité, alpha tiré de la courbe d'opacité appliquée à `progress`.
///
/// `max_density <= 1` est écrêté à 1.01 pour éviter la division par
/// ln(1) = 0 ; jamais propagé comme erreur. `progress <= 0` vaut pleine
/// opacité (chemin non progressif) ; le chemin de fondu du scheduler passe
/// la vraie progression dans (0, 1].
pub fn color_for_density(
    density: u32,
    max_density: u32,
    hue: f64,
    saturation: f64,
    brightness: f64,
    progress: f64,
    background: [u8; 4],
) -> u32 {
    if density == 0 {
        return pack_rgba(background[0], background[1], background[2], background[3]);
    }

    let mdens = if max_density <= 1 {
        1.01f64.ln()
    } else {
        (max_density as f64).ln()
    };
    let ratio = (density as f64).ln() / mdens;

    let sat = saturation - clamp01(SATURATION_CURVE.eval(ratio)) * saturation;
    let (r, g, b) = hsv_to_rgb(hue, sat, brightness);

    // Mélange vers le fond piloté par la densité.
    let blend = clamp01(DENSITY_CURVE.eval(ratio));
    let blended_r = (r as f64 * blend + background[0] as f64 * (1.0 - blend)).round() as u8;
    let blended_g = (g as f64 * blend + background[1] as f64 * (1.0 - blend)).round() as u8;
    let blended_b = (b as f64 * blend + background[2] as f64 * (1.0 - blend)).round() as u8;

    let progress = if progress <= 0.0 { 1.0 } else { progress };
    let alpha = (OPACITY_CURVE.eval(progress) * 255.0).round() as u8;

    pack_rgba(blended_r, blended_g, blended_b, alpha)
}

/// Variante basse qualité : HSV -> RGB de la couleur de base, pleine
/// opacité, indépendamment du compte du pixel.
pub fn low_quality_color(hue: f64, saturation: f64, brightness: f64) -> u32 {
    let (r, g, b) = hsv_to_rgb(hue, saturation, brightness);
    pack_rgba(r, g, b, 255)
}
