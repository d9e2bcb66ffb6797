//! Backend synchrone : la simulation complète dans le thread appelant.
//!
//! C'est le chemin de la CLI et des tests d'intégration. Les points de
//! contrôle intermédiaires sont calculés mais seuls les derniers pixels
//! sont retournés.

use tracing::info;

use crate::attractor::{
    default_jitter, AttractorParams, BufferSink, QualityMode, RunError, RunHandle, RunState,
    Simulation,
};

/// Résultat d'un rendu synchrone mené à terme.
pub struct SyncRender {
    pub pixels: Vec<u32>,
    pub width: u32,
    pub height: u32,
    pub max_density: u32,
    pub points_done: u64,
}

/// Exécute un run complet et retourne le tampon final.
///
/// Seuls des paramètres malformés font échouer l'appel ; une annulation est
/// impossible ici puisque la poignée n'est jamais exposée.
pub fn render_sync(
    params: AttractorParams,
    width: u32,
    height: u32,
    total_points: u64,
    quality: QualityMode,
) -> Result<SyncRender, RunError> {
    let mut sim = Simulation::new(
        params,
        width,
        height,
        total_points,
        quality,
        default_jitter(),
        RunHandle::new(),
    )?;

    let mut sink = BufferSink::default();
    sim.run_to_completion(&mut sink);
    debug_assert_eq!(*sim.run_state(), RunState::Completed);

    info!(
        points = sim.points_done(),
        max_density = sim.max_density(),
        "rendu synchrone terminé"
    );

    Ok(SyncRender {
        pixels: sink.pixels,
        width,
        height,
        max_density: sim.max_density(),
        points_done: sim.points_done(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attractor::{default_params, AttractorKind};
    use crate::color::pack_rgba;

    #[test]
    fn test_sync_render_completes_and_populates_pixels() {
        let mut params = default_params(AttractorKind::Clifford);
        params.a = 1.0;
        params.b = 2.0;
        params.c = 3.0;
        params.d = 4.0;

        let render = render_sync(params, 64, 64, 100_000, QualityMode::High).unwrap();
        assert_eq!(render.points_done, 100_000);
        assert_eq!(render.pixels.len(), 64 * 64);
        assert!(render.max_density >= 1);

        let bg = pack_rgba(0, 0, 0, 255);
        assert!(render.pixels.iter().any(|&p| p != bg));
    }

    #[test]
    fn test_sync_render_rejects_bad_params() {
        let mut params = default_params(AttractorKind::DeJong);
        params.scale = -2.0;
        assert!(render_sync(params, 64, 64, 1_000, QualityMode::High).is_err());
    }

    #[test]
    fn test_sync_render_low_quality() {
        let params = default_params(AttractorKind::DeJong);
        let render = render_sync(params, 32, 32, 5_000, QualityMode::Low).unwrap();
        assert_eq!(render.points_done, 5_000);
    }
}
