//! Lissage stochastique et projection vers l'espace pixel.
//!
//! Chaque point brut de l'application est perturbé de ±0.2/scale avant
//! projection, pour casser l'agrégation visible des orbites (anti-aliasing
//! statistique). La source aléatoire est injectable : les tests utilisent une
//! graine fixe, la production une graine tirée de l'entropie système.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Source de bits uniformes pour le lissage.
///
/// Le flux exact n'est pas contractuel : seule l'uniformité compte. Les tests
/// ne doivent vérifier que des propriétés statistiques et de bornes.
pub trait JitterSource {
    /// Un tirage uniforme dans [0, 1).
    fn next_f64(&mut self) -> f64;
}

impl JitterSource for SmallRng {
    fn next_f64(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Source de production, graine tirée de l'entropie système.
pub fn default_jitter() -> SmallRng {
    SmallRng::from_entropy()
}

/// Source déterministe pour les tests.
pub fn seeded_jitter(seed: u64) -> SmallRng {
    SmallRng::seed_from_u64(seed)
}

/// Perturbation de ±0.2/scale, signe équiprobable.
#[inline]
pub fn smooth<J: JitterSource>(value: f64, scale: f64, rng: &mut J) -> f64 {
    let sign = if rng.next_f64() < 0.5 { -0.2 } else { 0.2 };
    value + sign / scale
}

/// Projette un point simulé vers les coordonnées pixel.
///
/// `left`/`top` décalent le centre de projection en fraction des dimensions.
/// Retourne `None` pour un point hors cadre : c'est un cas attendu et
/// fréquent, pas une erreur.
#[inline]
pub fn project(
    x: f64,
    y: f64,
    scale: f64,
    width: u32,
    height: u32,
    left: f64,
    top: f64,
) -> Option<(u32, u32)> {
    let screen_x = (x * scale).round();
    let screen_y = (y * scale).round();
    let px = (screen_x + width as f64 / 2.0 + left * width as f64).floor();
    let py = (screen_y + height as f64 / 2.0 + top * height as f64).floor();

    if px >= 0.0 && px < width as f64 && py >= 0.0 && py < height as f64 {
        Some((px as u32, py as u32))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smooth_offsets_by_fixed_magnitude() {
        let mut rng = seeded_jitter(7);
        for _ in 0..1000 {
            let v = smooth(0.5, 150.0, &mut rng);
            let delta = (v - 0.5).abs();
            assert!((delta - 0.2 / 150.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_smooth_uses_both_signs() {
        let mut rng = seeded_jitter(42);
        let mut negative = 0;
        let mut positive = 0;
        for _ in 0..1000 {
            if smooth(0.0, 1.0, &mut rng) < 0.0 {
                negative += 1;
            } else {
                positive += 1;
            }
        }
        // Équiprobable à grosse maille ; on ne vérifie pas le flux exact.
        assert!(negative > 300 && positive > 300);
    }

    #[test]
    fn test_smooth_differs_across_seeds() {
        let mut a = seeded_jitter(1);
        let mut b = seeded_jitter(2);
        let seq_a: Vec<f64> = (0..16).map(|_| smooth(0.0, 1.0, &mut a)).collect();
        let seq_b: Vec<f64> = (0..16).map(|_| smooth(0.0, 1.0, &mut b)).collect();
        assert_ne!(seq_a, seq_b);
    }

    #[test]
    fn test_project_center() {
        // Le point (0, 0) tombe au centre du cadre.
        assert_eq!(project(0.0, 0.0, 150.0, 64, 64, 0.0, 0.0), Some((32, 32)));
    }

    #[test]
    fn test_project_out_of_bounds_is_dropped() {
        // Un point très éloigné est silencieusement abandonné.
        assert_eq!(project(10.0, 0.0, 150.0, 64, 64, 0.0, 0.0), None);
        assert_eq!(project(0.0, -10.0, 150.0, 64, 64, 0.0, 0.0), None);
    }

    #[test]
    fn test_project_offset_moves_center() {
        // left = 0.25 décale le centre d'un quart de largeur.
        assert_eq!(project(0.0, 0.0, 150.0, 64, 64, 0.25, 0.0), Some((48, 32)));
        assert_eq!(project(0.0, 0.0, 150.0, 64, 64, 0.0, -0.25), Some((32, 16)));
    }

    #[test]
    fn test_project_never_indexes_outside() {
        // Propriété de bornes : toute projection acceptée est dans le cadre.
        let mut rng = seeded_jitter(99);
        for _ in 0..10_000 {
            let x = rng.next_f64() * 8.0 - 4.0;
            let y = rng.next_f64() * 8.0 - 4.0;
            if let Some((px, py)) = project(x, y, 150.0, 48, 32, 0.1, -0.1) {
                assert!(px < 48 && py < 32);
            }
        }
    }
}
