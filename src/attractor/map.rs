//! Évaluateur des applications itérées chaotiques.
//!
//! Fonction pure : pour un état (x, y) et quatre coefficients réels, retourne
//! l'état suivant. Aucun effet de bord, aucune condition d'erreur (sin/cos et
//! termes affines restent finis pour toute entrée finie).

use super::types::AttractorKind;

/// Un pas de l'application choisie.
///
/// - Clifford : x' = sin(a·y) + c·cos(a·x), y' = sin(b·x) + d·cos(b·y)
/// - De Jong  : x' = sin(a·y) − cos(b·x),  y' = sin(c·x) − cos(d·y)
#[inline]
pub fn step(kind: AttractorKind, x: f64, y: f64, a: f64, b: f64, c: f64, d: f64) -> (f64, f64) {
    match kind {
        AttractorKind::Clifford => (
            (a * y).sin() + c * (a * x).cos(),
            (b * x).sin() + d * (b * y).cos(),
        ),
        AttractorKind::DeJong => (
            (a * y).sin() - (b * x).cos(),
            (c * x).sin() - (d * y).cos(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clifford_from_origin() {
        // Depuis (0, 0) : x' = sin(0) + c·cos(0) = c, y' = sin(0) + d·cos(0) = d
        let (x, y) = step(AttractorKind::Clifford, 0.0, 0.0, 2.0, -2.0, 1.0, -1.0);
        assert_eq!(x, 1.0);
        assert_eq!(y, -1.0);
    }

    #[test]
    fn test_dejong_from_origin() {
        // Depuis (0, 0) : x' = sin(0) − cos(0) = −1, y' = sin(0) − cos(0) = −1
        let (x, y) = step(AttractorKind::DeJong, 0.0, 0.0, 1.4, -2.3, 2.4, -2.1);
        assert_eq!(x, -1.0);
        assert_eq!(y, -1.0);
    }

    #[test]
    fn test_step_is_deterministic() {
        // Sorties bit-identiques pour des entrées identiques.
        let first = step(AttractorKind::Clifford, 0.3, -0.7, 2.0, -2.0, 1.0, -1.0);
        for _ in 0..100 {
            let again = step(AttractorKind::Clifford, 0.3, -0.7, 2.0, -2.0, 1.0, -1.0);
            assert_eq!(first.0.to_bits(), again.0.to_bits());
            assert_eq!(first.1.to_bits(), again.1.to_bits());
        }
    }

    #[test]
    fn test_step_stays_finite() {
        // L'orbite reste finie et bornée (|x'| <= 1 + |c|, |y'| <= 1 + |d|).
        let (mut x, mut y) = (0.1, 0.1);
        for _ in 0..10_000 {
            let (nx, ny) = step(AttractorKind::Clifford, x, y, 2.0, -2.0, 1.0, -1.0);
            assert!(nx.is_finite() && ny.is_finite());
            assert!(nx.abs() <= 2.0 && ny.abs() <= 2.0);
            x = nx;
            y = ny;
        }
    }
}
