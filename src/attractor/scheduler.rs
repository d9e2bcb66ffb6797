//! Ordonnanceur progressif : la simulation avance par lots bornés.
//!
//! La machine à états d'un run est explicite (`SimulationState` + compteur de
//! points) et reprise par appels répétés de `process_batch` depuis une boucle
//! pilote externe (callback de frame, timer ou thread dédié). Le cœur ignore
//! donc complètement la façon dont l'hôte planifie ses tours.
//!
//! À chaque frontière d'intervalle de rapport (multiple du compte de points)
//! ou au dernier point, un tampon de pixels frais est dérivé de l'histogramme
//! via la fonction de transfert et poussé dans le `PixelSink`. L'annulation
//! n'est observée qu'aux frontières de lot : un lot entamé va toujours à son
//! terme, ce qui borne la latence d'annulation à un lot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::color::{color_for_density, low_quality_color, pack_rgba};

use super::density::{DensityGrid, SimulationState};
use super::jitter::{project, smooth, JitterSource};
use super::map::step;
use super::types::{AttractorParams, QualityMode, RunError};

/// Taille de lot selon le mode de qualité.
///
/// Basse qualité : lots grossiers (~1/10 du total) pour peu de mises à jour
/// bon marché. Haute qualité : lots fins (~1/1000) pour un retour fréquent.
pub fn batch_size(total_points: u64, quality: QualityMode) -> u64 {
    match quality {
        QualityMode::Low => (total_points / 10).max(10_000),
        QualityMode::High => (total_points / 1_000).max(1_000),
    }
}

/// Intervalle de rapport en points, depuis un pourcentage du total.
pub fn report_interval(total_points: u64, interval_pct: u32) -> u64 {
    (total_points * interval_pct as u64 / 100).max(1)
}

/// Dérive un tampon de pixels complet de l'histogramme dans `out`.
///
/// Recalcul intégral à chaque appel, aucun état conservé entre deux tampons.
/// Basse qualité : couleur plate par cellule occupée. Haute qualité :
/// transfert log-densité, avec `progress <= 0` valant pleine opacité.
pub fn render_pixels(
    grid: &DensityGrid,
    params: &AttractorParams,
    quality: QualityMode,
    progress: f64,
    out: &mut Vec<u32>,
) {
    let background = params.background;
    let bg_pixel = pack_rgba(background[0], background[1], background[2], background[3]);
    let max_density = grid.max_density();

    out.clear();
    out.reserve(grid.counts().len());

    match quality {
        QualityMode::Low => {
            let flat = low_quality_color(params.hue, params.saturation, params.brightness);
            out.extend(
                grid.counts()
                    .iter()
                    .map(|&density| if density > 0 { flat } else { bg_pixel }),
            );
        }
        QualityMode::High => {
            out.extend(grid.counts().iter().map(|&density| {
                if density > 0 {
                    color_for_density(
                        density,
                        max_density,
                        params.hue,
                        params.saturation,
                        params.brightness,
                        progress,
                        background,
                    )
                } else {
                    bg_pixel
                }
            }));
        }
    }
}

/// Point de contrôle émis vers l'hôte à chaque intervalle de rapport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Checkpoint {
    /// Fraction de progression dans [0, 1].
    pub progress: f64,
    /// Vrai exactement quand `points_done == total_points`.
    pub is_final: bool,
    pub max_density: u32,
}

/// Réceptacle du tampon de pixels dérivé à chaque point de contrôle.
///
/// Le scheduler ne sait pas si sa sortie part vers un simple Vec, un canal
/// inter-threads ou une région mémoire partagée.
pub trait PixelSink {
    fn write(&mut self, pixels: &[u32], width: u32, height: u32, checkpoint: Checkpoint);
}

/// Sink trivial : conserve le dernier tampon reçu.
#[derive(Default)]
pub struct BufferSink {
    pub pixels: Vec<u32>,
    pub last: Option<Checkpoint>,
    pub checkpoints: u32,
}

impl PixelSink for BufferSink {
    fn write(&mut self, pixels: &[u32], _width: u32, _height: u32, checkpoint: Checkpoint) {
        self.pixels.clear();
        self.pixels.extend_from_slice(pixels);
        self.last = Some(checkpoint);
        self.checkpoints += 1;
    }
}

/// Poignée d'annulation coopérative d'un run.
///
/// Clonable ; le drapeau est observé aux frontières de lot uniquement.
/// Supplanter un run (nouveaux paramètres) doit annuler l'ancienne poignée
/// avant de construire la nouvelle simulation : il n'y a jamais plus d'un
/// écrivain vivant par histogramme.
#[derive(Clone, Debug, Default)]
pub struct RunHandle {
    cancelled: Arc<AtomicBool>,
}

impl RunHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// État terminal ou courant d'un run.
#[derive(Clone, Debug, PartialEq)]
pub enum RunState {
    Running,
    Completed,
    Cancelled,
    Failed(RunError),
}

/// Une simulation progressive d'attracteur.
///
/// Possède son histogramme et son état de point ; un appel de
/// `process_batch` avance d'au plus un lot et émet les points de contrôle
/// franchis pendant ce lot.
pub struct Simulation<J: JitterSource> {
    params: AttractorParams,
    width: u32,
    height: u32,
    total_points: u64,
    batch: u64,
    interval: u64,
    quality: QualityMode,
    scale: f64,
    state: SimulationState,
    grid: DensityGrid,
    scratch: Vec<u32>,
    jitter: J,
    handle: RunHandle,
    run_state: RunState,
}

impl<J: JitterSource> Simulation<J> {
    /// Construit un nouveau run. Seuls des paramètres malformés échouent.
    pub fn new(
        params: AttractorParams,
        width: u32,
        height: u32,
        total_points: u64,
        quality: QualityMode,
        mut jitter: J,
        handle: RunHandle,
    ) -> Result<Self, RunError> {
        params.validate(width, height)?;
        if total_points == 0 {
            return Err(RunError::InvalidParams("budget de points nul".into()));
        }

        // Point de départ aléatoire dans [-1, 1] × [-1, 1].
        let x = jitter.next_f64() * 2.0 - 1.0;
        let y = jitter.next_f64() * 2.0 - 1.0;

        let scale = params.effective_scale();
        debug!(
            kind = params.kind.name(),
            total_points,
            width,
            height,
            ?quality,
            "démarrage d'un run"
        );

        Ok(Self {
            batch: batch_size(total_points, quality),
            interval: report_interval(total_points, quality.progress_interval()),
            scale,
            state: SimulationState { x, y, points_done: 0 },
            grid: DensityGrid::new(width, height),
            scratch: Vec::new(),
            params,
            width,
            height,
            total_points,
            quality,
            jitter,
            handle,
            run_state: RunState::Running,
        })
    }

    pub fn handle(&self) -> RunHandle {
        self.handle.clone()
    }

    pub fn run_state(&self) -> &RunState {
        &self.run_state
    }

    pub fn points_done(&self) -> u64 {
        self.state.points_done
    }

    pub fn max_density(&self) -> u32 {
        self.grid.max_density()
    }

    pub fn grid(&self) -> &DensityGrid {
        &self.grid
    }

    /// Avance d'un tour coopératif : au plus un lot d'itérations.
    ///
    /// L'annulation est vérifiée ici, avant d'entamer le lot ; une fois le
    /// lot commencé il va jusqu'au bout. Après annulation, plus aucun point
    /// de contrôle n'est émis et les tampons possédés sont relâchés.
    pub fn process_batch<S: PixelSink>(&mut self, sink: &mut S) -> &RunState {
        if self.run_state != RunState::Running {
            return &self.run_state;
        }
        if self.handle.is_cancelled() {
            self.release_buffers();
            self.run_state = RunState::Cancelled;
            debug!("run annulé à la frontière de lot");
            return &self.run_state;
        }

        let end = (self.state.points_done + self.batch).min(self.total_points);
        while self.state.points_done < end {
            let (nx, ny) = step(
                self.params.kind,
                self.state.x,
                self.state.y,
                self.params.a,
                self.params.b,
                self.params.c,
                self.params.d,
            );
            self.state.x = smooth(nx, self.scale, &mut self.jitter);
            self.state.y = smooth(ny, self.scale, &mut self.jitter);

            if let Some((px, py)) = project(
                self.state.x,
                self.state.y,
                self.scale,
                self.width,
                self.height,
                self.params.left,
                self.params.top,
            ) {
                self.grid.accumulate(px, py);
            }

            self.state.points_done += 1;

            let done = self.state.points_done == self.total_points;
            if done || self.state.points_done % self.interval == 0 {
                self.emit_checkpoint(sink, done);
            }
        }

        if self.state.points_done == self.total_points {
            self.run_state = RunState::Completed;
        }
        &self.run_state
    }

    /// Boucle jusqu'à l'état terminal (backend synchrone et tests).
    pub fn run_to_completion<S: PixelSink>(&mut self, sink: &mut S) -> &RunState {
        while self.run_state == RunState::Running {
            self.process_batch(sink);
        }
        &self.run_state
    }

    /// Dérive un tampon frais de l'histogramme et l'émet.
    fn emit_checkpoint<S: PixelSink>(&mut self, sink: &mut S, is_final: bool) {
        let progress = self.state.points_done as f64 / self.total_points as f64;
        let mut scratch = std::mem::take(&mut self.scratch);
        render_pixels(&self.grid, &self.params, self.quality, progress, &mut scratch);

        sink.write(
            &scratch,
            self.width,
            self.height,
            Checkpoint {
                progress,
                is_final,
                max_density: self.grid.max_density(),
            },
        );
        self.scratch = scratch;
    }

    fn release_buffers(&mut self) {
        self.grid.clear();
        self.scratch = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attractor::jitter::seeded_jitter;
    use crate::attractor::types::default_params;
    use crate::attractor::types::AttractorKind;
    use crate::color::unpack_rgba;

    fn simulation(
        total_points: u64,
        quality: QualityMode,
    ) -> Simulation<rand::rngs::SmallRng> {
        Simulation::new(
            default_params(AttractorKind::Clifford),
            64,
            64,
            total_points,
            quality,
            seeded_jitter(1234),
            RunHandle::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_batch_size_per_quality() {
        assert_eq!(batch_size(20_000, QualityMode::Low), 10_000);
        assert_eq!(batch_size(1_000_000, QualityMode::Low), 100_000);
        assert_eq!(batch_size(2_000_000, QualityMode::High), 2_000);
        assert_eq!(batch_size(100, QualityMode::High), 1_000);
    }

    #[test]
    fn test_report_interval() {
        assert_eq!(report_interval(20_000, 25), 5_000);
        assert_eq!(report_interval(2_000_000, 1), 20_000);
        assert_eq!(report_interval(10, 1), 1);
    }

    #[test]
    fn test_run_completes_with_exact_point_count() {
        let mut sim = simulation(100_000, QualityMode::High);
        let mut sink = BufferSink::default();
        assert_eq!(*sim.run_to_completion(&mut sink), RunState::Completed);
        assert_eq!(sim.points_done(), 100_000);
        let last = sink.last.unwrap();
        assert!(last.is_final);
        assert_eq!(last.progress, 1.0);
        assert!(sim.max_density() >= 1);
    }

    #[test]
    fn test_final_buffer_has_non_background_pixels() {
        // Scénario de référence : clifford a=1 b=2 c=3 d=4, 64x64, 100k points.
        let mut params = default_params(AttractorKind::Clifford);
        params.a = 1.0;
        params.b = 2.0;
        params.c = 3.0;
        params.d = 4.0;
        let mut sim = Simulation::new(
            params,
            64,
            64,
            100_000,
            QualityMode::High,
            seeded_jitter(5),
            RunHandle::new(),
        )
        .unwrap();
        let mut sink = BufferSink::default();
        assert_eq!(*sim.run_to_completion(&mut sink), RunState::Completed);
        assert!(sim.max_density() >= 1);
        let bg = pack_rgba(0, 0, 0, 255);
        assert!(sink.pixels.iter().any(|&p| p != bg));
    }

    #[test]
    fn test_cancellation_observed_at_batch_boundary() {
        let mut sim = simulation(1_000_000, QualityMode::High);
        let mut sink = BufferSink::default();
        sim.process_batch(&mut sink);
        let after_one_batch = sim.points_done();
        let emitted = sink.checkpoints;

        sim.handle().cancel();
        // Le lot suivant n'est jamais entamé : aucun point de plus, aucun
        // checkpoint de plus.
        assert_eq!(*sim.process_batch(&mut sink), RunState::Cancelled);
        assert_eq!(sim.points_done(), after_one_batch);
        assert_eq!(sink.checkpoints, emitted);

        // Les appels suivants restent inertes.
        assert_eq!(*sim.process_batch(&mut sink), RunState::Cancelled);
        assert_eq!(sink.checkpoints, emitted);
    }

    #[test]
    fn test_supersession_cancels_old_writer_first() {
        let mut old = simulation(1_000_000, QualityMode::High);
        let mut sink = BufferSink::default();
        old.process_batch(&mut sink);

        // Supplanter : on annule l'ancienne poignée avant de construire le
        // nouveau run, qui observe donc l'annulation avant toute écriture
        // du nouveau run.
        let old_handle = old.handle();
        old_handle.cancel();
        assert!(old_handle.is_cancelled());

        let mut new = simulation(10_000, QualityMode::High);
        assert_eq!(*old.process_batch(&mut sink), RunState::Cancelled);
        let mut new_sink = BufferSink::default();
        assert_eq!(*new.run_to_completion(&mut new_sink), RunState::Completed);
    }

    #[test]
    fn test_low_quality_emits_fewer_checkpoints_than_high() {
        let mut low = simulation(20_000, QualityMode::Low);
        let mut low_sink = BufferSink::default();
        low.run_to_completion(&mut low_sink);

        let mut high = simulation(2_000_000, QualityMode::High);
        let mut high_sink = BufferSink::default();
        high.run_to_completion(&mut high_sink);

        assert!(low_sink.checkpoints < high_sink.checkpoints);
    }

    #[test]
    fn test_low_quality_pixels_have_full_alpha() {
        let mut sim = simulation(20_000, QualityMode::Low);
        let mut sink = BufferSink::default();
        sim.run_to_completion(&mut sink);

        let bg = pack_rgba(0, 0, 0, 255);
        let mut populated = 0;
        for &pixel in &sink.pixels {
            if pixel != bg {
                assert_eq!(unpack_rgba(pixel)[3], 255);
                populated += 1;
            }
        }
        assert!(populated > 0);
    }

    #[test]
    fn test_points_done_never_exceeds_total() {
        let mut sim = simulation(12_345, QualityMode::High);
        let mut sink = BufferSink::default();
        while *sim.process_batch(&mut sink) == RunState::Running {
            assert!(sim.points_done() <= 12_345);
        }
        assert_eq!(sim.points_done(), 12_345);
    }

    #[test]
    fn test_zero_point_budget_is_rejected() {
        let err = Simulation::new(
            default_params(AttractorKind::Clifford),
            64,
            64,
            0,
            QualityMode::High,
            seeded_jitter(1),
            RunHandle::new(),
        );
        assert!(err.is_err());
    }
}
