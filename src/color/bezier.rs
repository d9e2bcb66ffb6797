//! Courbes d'assouplissement cubiques de Bézier (style CSS `cubic-bezier`).
//!
//! Les points de contrôle sont des constantes de forme figées, réglées pour
//! l'effet visuel, pas des paramètres utilisateur. L'inversion x -> t
//! utilise quelques itérations de Newton-Raphson, suffisantes pour un usage
//! colorimétrique.

/// Courbe de Bézier cubique ancrée en (0,0) et (1,1), définie par deux
/// points de contrôle (x1, y1) et (x2, y2).
#[derive(Clone, Copy, Debug)]
pub struct CubicBezier {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

/// Saturation atténuée avec la densité.
pub const SATURATION_CURVE: CubicBezier = CubicBezier::new(0.79, -0.34, 0.54, 1.18);
/// Facteur de mélange vers le fond selon la densité.
pub const DENSITY_CURVE: CubicBezier = CubicBezier::new(0.75, 0.38, 0.24, 1.33);
/// Opacité en fonction de la progression du run.
pub const OPACITY_CURVE: CubicBezier = CubicBezier::new(0.24, 0.27, 0.13, 0.89);

impl CubicBezier {
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    #[inline]
    fn coeff_a(a1: f64, a2: f64) -> f64 {
        1.0 - 3.0 * a2 + 3.0 * a1
    }

    #[inline]
    fn coeff_b(a1: f64, a2: f64) -> f64 {
        3.0 * a2 - 6.0 * a1
    }

    #[inline]
    fn coeff_c(a1: f64) -> f64 {
        3.0 * a1
    }

    #[inline]
    fn sample(t: f64, a1: f64, a2: f64) -> f64 {
        ((Self::coeff_a(a1, a2) * t + Self::coeff_b(a1, a2)) * t + Self::coeff_c(a1)) * t
    }

    #[inline]
    fn slope(t: f64, a1: f64, a2: f64) -> f64 {
        3.0 * Self::coeff_a(a1, a2) * t * t + 2.0 * Self::coeff_b(a1, a2) * t + Self::coeff_c(a1)
    }

    /// Inverse x -> t par Newton-Raphson (4 itérations).
    fn t_for_x(&self, x: f64) -> f64 {
        let mut t = x;
        for _ in 0..4 {
            let s = Self::slope(t, self.x1, self.x2);
            if s == 0.0 {
                return t;
            }
            let current_x = Self::sample(t, self.x1, self.x2) - x;
            t -= current_x / s;
        }
        t
    }

    /// Évalue la courbe en x. Hors de [0, 1], la sortie est écrêtée à 0/1.
    ///
    /// Les ordonnées de contrôle peuvent sortir de [0, 1] : la valeur
    /// retournée peut alors dépasser cet intervalle et doit être écrêtée par
    /// l'appelant si nécessaire.
    pub fn eval(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        if x >= 1.0 {
            return 1.0;
        }
        Self::sample(self.t_for_x(x), self.y1, self.y2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_are_clamped() {
        for curve in [SATURATION_CURVE, DENSITY_CURVE, OPACITY_CURVE] {
            assert_eq!(curve.eval(0.0), 0.0);
            assert_eq!(curve.eval(1.0), 1.0);
            assert_eq!(curve.eval(-3.5), 0.0);
            assert_eq!(curve.eval(42.0), 1.0);
        }
    }

    #[test]
    fn test_linear_curve_is_identity() {
        let linear = CubicBezier::new(0.25, 0.25, 0.75, 0.75);
        for i in 0..=20 {
            let x = i as f64 / 20.0;
            assert!((linear.eval(x) - x).abs() < 1e-6);
        }
    }

    #[test]
    fn test_opacity_curve_is_monotonic() {
        let mut previous = OPACITY_CURVE.eval(0.0);
        for i in 1..=100 {
            let value = OPACITY_CURVE.eval(i as f64 / 100.0);
            assert!(value >= previous);
            previous = value;
        }
    }

    #[test]
    fn test_curves_never_produce_nan() {
        for curve in [SATURATION_CURVE, DENSITY_CURVE, OPACITY_CURVE] {
            for i in 0..=1000 {
                let x = i as f64 / 1000.0;
                assert!(curve.eval(x).is_finite());
            }
        }
    }
}
