use serde::{Deserialize, Serialize};

/// Facteur d'échelle de base : la valeur `scale` des paramètres est un
/// multiplicateur relatif appliqué à cette constante avant projection.
pub const BASE_SCALE: f64 = 150.0;

/// Budget de points par défaut en mode haute qualité.
pub const DEFAULT_POINTS: u64 = 20_000_000;

/// Budget de points en mode basse qualité (aperçu rapide).
pub const LOW_QUALITY_POINTS: u64 = 5_000;

/// Intervalle de rapport de progression (en %) par mode de qualité.
pub const HIGH_QUALITY_INTERVAL: u32 = 1;
pub const LOW_QUALITY_INTERVAL: u32 = 25;

/// Familles d'attracteurs prises en charge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttractorKind {
    Clifford,
    DeJong,
}

impl AttractorKind {
    pub fn from_cli_name(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "clifford" => Some(AttractorKind::Clifford),
            "dejong" | "de-jong" | "de_jong" => Some(AttractorKind::DeJong),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AttractorKind::Clifford => "Clifford",
            AttractorKind::DeJong => "De Jong",
        }
    }

    pub fn all() -> &'static [AttractorKind] {
        &[AttractorKind::Clifford, AttractorKind::DeJong]
    }
}

/// Niveau de qualité d'un rendu.
///
/// `Low` : peu de points, couleur plate par pixel occupé, mises à jour
/// grossières. `High` : budget complet, colorisation log-densité, mises à
/// jour fréquentes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityMode {
    Low,
    High,
}

impl QualityMode {
    pub fn from_cli_name(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(QualityMode::Low),
            "high" => Some(QualityMode::High),
            _ => None,
        }
    }

    /// Budget de points par défaut pour ce mode.
    pub fn default_points(self) -> u64 {
        match self {
            QualityMode::Low => LOW_QUALITY_POINTS,
            QualityMode::High => DEFAULT_POINTS,
        }
    }

    /// Intervalle de progression (en %) pour ce mode.
    pub fn progress_interval(self) -> u32 {
        match self {
            QualityMode::Low => LOW_QUALITY_INTERVAL,
            QualityMode::High => HIGH_QUALITY_INTERVAL,
        }
    }
}

/// Paramètres immuables d'une simulation d'attracteur.
///
/// Un nouveau run démarre à chaque changement : la structure est copiée dans
/// la simulation et n'est jamais mutée par celle-ci.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttractorParams {
    pub kind: AttractorKind,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    /// Teinte [0, 360)
    pub hue: f64,
    /// Saturation [0, 100]
    pub saturation: f64,
    /// Brillance/valeur [0, 100]
    pub brightness: f64,
    /// Couleur de fond RGBA8, alpha inclus.
    pub background: [u8; 4],
    /// Multiplicateur d'échelle relatif (appliqué à BASE_SCALE), > 0.
    pub scale: f64,
    /// Décalage horizontal du centre, en fraction de la largeur.
    pub left: f64,
    /// Décalage vertical du centre, en fraction de la hauteur.
    pub top: f64,
}

impl Default for AttractorParams {
    fn default() -> Self {
        default_params(AttractorKind::Clifford)
    }
}

/// Paramètres par défaut pour une famille d'attracteur donnée.
pub fn default_params(kind: AttractorKind) -> AttractorParams {
    let (a, b, c, d) = match kind {
        AttractorKind::Clifford => (2.0, -2.0, 1.0, -1.0),
        AttractorKind::DeJong => (1.4, -2.3, 2.4, -2.1),
    };
    AttractorParams {
        kind,
        a,
        b,
        c,
        d,
        hue: 333.0,
        saturation: 100.0,
        brightness: 100.0,
        background: [0, 0, 0, 255],
        scale: 1.0,
        left: 0.0,
        top: 0.0,
    }
}

impl AttractorParams {
    /// Échelle effective de projection (BASE_SCALE * scale relatif).
    pub fn effective_scale(&self) -> f64 {
        BASE_SCALE * self.scale
    }

    /// Valide les paramètres avant de démarrer un run.
    pub fn validate(&self, width: u32, height: u32) -> Result<(), RunError> {
        if width == 0 || height == 0 {
            return Err(RunError::InvalidParams(format!(
                "surface de rendu vide: {width}x{height}"
            )));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(RunError::InvalidParams(format!(
                "échelle invalide: {}",
                self.scale
            )));
        }
        for (name, v) in [("a", self.a), ("b", self.b), ("c", self.c), ("d", self.d)] {
            if !v.is_finite() {
                return Err(RunError::InvalidParams(format!(
                    "paramètre {name} non fini: {v}"
                )));
            }
        }
        Ok(())
    }
}

/// Erreur fatale d'un run : paramètres malformés ou backend indisponible.
///
/// Signalée une seule fois ; le run passe en état `Failed` et n'émet plus
/// aucun checkpoint ensuite.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunError {
    InvalidParams(String),
    BackendUnavailable(String),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::InvalidParams(msg) => write!(f, "paramètres invalides: {msg}"),
            RunError::BackendUnavailable(msg) => write!(f, "backend indisponible: {msg}"),
        }
    }
}

impl std::error::Error for RunError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_surface() {
        let params = AttractorParams::default();
        assert!(params.validate(0, 64).is_err());
        assert!(params.validate(64, 0).is_err());
        assert!(params.validate(64, 64).is_ok());
    }

    #[test]
    fn test_validate_rejects_non_finite_coefficients() {
        let mut params = AttractorParams::default();
        params.b = f64::NAN;
        assert!(params.validate(64, 64).is_err());
        params.b = f64::INFINITY;
        assert!(params.validate(64, 64).is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_scale() {
        let mut params = AttractorParams::default();
        params.scale = 0.0;
        assert!(params.validate(64, 64).is_err());
        params.scale = -1.0;
        assert!(params.validate(64, 64).is_err());
    }

    #[test]
    fn test_kind_from_cli_name() {
        assert_eq!(
            AttractorKind::from_cli_name("clifford"),
            Some(AttractorKind::Clifford)
        );
        assert_eq!(
            AttractorKind::from_cli_name("De-Jong"),
            Some(AttractorKind::DeJong)
        );
        assert_eq!(AttractorKind::from_cli_name("lorenz"), None);
    }
}
