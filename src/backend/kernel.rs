//! Noyau parallèle : plusieurs voies d'itération indépendantes, réduction
//! séparée, un seul tampon final.
//!
//! Chaque voie possède sa propre trajectoire, sa propre source de lissage et
//! son propre histogramme : aucun état mutable n'est partagé pendant
//! l'itération. Les histogrammes sont ensuite fusionnés par la réduction
//! rayon, puis le tampon de pixels est dérivé une seule fois du total.
//! C'est le chemin recommandé pour les gros budgets en une passe.

use rayon::prelude::*;
use tracing::info;

use crate::attractor::{
    default_jitter, render_pixels, AttractorParams, DensityGrid, JitterSource, QualityMode,
    RunError,
};
use crate::attractor::jitter::{project, smooth};
use crate::attractor::map::step;

use super::sync::SyncRender;

/// Itère une trajectoire complète dans un histogramme local.
fn iterate_lane<J: JitterSource>(
    params: &AttractorParams,
    width: u32,
    height: u32,
    points: u64,
    mut jitter: J,
) -> DensityGrid {
    let mut grid = DensityGrid::new(width, height);
    let scale = params.effective_scale();
    let mut x = jitter.next_f64() * 2.0 - 1.0;
    let mut y = jitter.next_f64() * 2.0 - 1.0;

    for _ in 0..points {
        let (nx, ny) = step(params.kind, x, y, params.a, params.b, params.c, params.d);
        x = smooth(nx, scale, &mut jitter);
        y = smooth(ny, scale, &mut jitter);
        if let Some((px, py)) = project(x, y, scale, width, height, params.left, params.top) {
            grid.accumulate(px, py);
        }
    }
    grid
}

/// Rendu en une passe sur toutes les voies disponibles.
///
/// Le budget est réparti équitablement entre les voies, le reste allant à la
/// première. Chaque voie démarre d'un germe propre : la réunion des
/// trajectoires échantillonne le même attracteur que la trajectoire unique
/// du scheduler, les transitoires initiaux en plus.
pub fn render_parallel(
    params: AttractorParams,
    width: u32,
    height: u32,
    total_points: u64,
    quality: QualityMode,
) -> Result<SyncRender, RunError> {
    params.validate(width, height)?;
    if total_points == 0 {
        return Err(RunError::InvalidParams("budget de points nul".into()));
    }

    let lanes = rayon::current_num_threads().max(1) as u64;
    let per_lane = total_points / lanes;
    let remainder = total_points % lanes;

    let grid = (0..lanes)
        .into_par_iter()
        .map(|lane| {
            let points = if lane == 0 { per_lane + remainder } else { per_lane };
            iterate_lane(&params, width, height, points, default_jitter())
        })
        .reduce(
            || DensityGrid::new(width, height),
            |mut acc, grid| {
                acc.merge(&grid);
                acc
            },
        );

    let mut pixels = Vec::new();
    render_pixels(&grid, &params, quality, 1.0, &mut pixels);

    info!(
        lanes,
        points = total_points,
        max_density = grid.max_density(),
        "rendu parallèle terminé"
    );

    Ok(SyncRender {
        pixels,
        width,
        height,
        max_density: grid.max_density(),
        points_done: total_points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attractor::{default_params, seeded_jitter, AttractorKind};
    use crate::color::pack_rgba;

    #[test]
    fn test_lane_accumulates_expected_point_count() {
        let params = default_params(AttractorKind::Clifford);
        let grid = iterate_lane(&params, 64, 64, 10_000, seeded_jitter(3));
        // Tous les points projetés dans le cadre sont comptés, aucun au-delà.
        let total: u64 = grid.counts().iter().map(|&c| c as u64).sum();
        assert!(total <= 10_000);
        assert!(total > 0);
    }

    #[test]
    fn test_parallel_render_populates_pixels() {
        let mut params = default_params(AttractorKind::Clifford);
        params.a = 1.0;
        params.b = 2.0;
        params.c = 3.0;
        params.d = 4.0;

        let render = render_parallel(params, 64, 64, 200_000, QualityMode::High).unwrap();
        assert_eq!(render.points_done, 200_000);
        assert_eq!(render.pixels.len(), 64 * 64);
        assert!(render.max_density >= 1);

        let bg = pack_rgba(0, 0, 0, 255);
        assert!(render.pixels.iter().any(|&p| p != bg));
    }

    #[test]
    fn test_parallel_render_rejects_zero_budget() {
        let params = default_params(AttractorKind::DeJong);
        assert!(render_parallel(params, 64, 64, 0, QualityMode::High).is_err());
    }

    #[test]
    fn test_merged_density_matches_lane_sum() {
        let params = default_params(AttractorKind::DeJong);
        let a = iterate_lane(&params, 32, 32, 5_000, seeded_jitter(1));
        let b = iterate_lane(&params, 32, 32, 5_000, seeded_jitter(2));
        let sum_a: u64 = a.counts().iter().map(|&c| c as u64).sum();
        let sum_b: u64 = b.counts().iter().map(|&c| c as u64).sum();

        let mut merged = DensityGrid::new(32, 32);
        merged.merge(&a);
        merged.merge(&b);
        let total: u64 = merged.counts().iter().map(|&c| c as u64).sum();
        assert_eq!(total, sum_a + sum_b);
    }
}
