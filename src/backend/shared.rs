//! Backend à mémoire partagée : le tampon de pixels est publié en place,
//! sans copie par point de contrôle.
//!
//! Le cadre partagé est un verrou de séquence : l'écrivain rend le compteur
//! impair avant d'écrire, pair après ; le lecteur copie puis revérifie le
//! compteur et recommence si une écriture l'a chevauché. Les pixels sont des
//! `AtomicU32` relâchés ; la cohérence inter-pixels repose sur l'accord sur
//! le compteur de séquence et sur les barrières qui encadrent les accès
//! relâchés (marquage impair en AcqRel côté écrivain, barrière Acquire avant
//! la revérification côté lecteur). Pas de `unsafe`.

use std::sync::atomic::{fence, AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use crate::attractor::{
    default_jitter, AttractorParams, Checkpoint, PixelSink, QualityMode, RunHandle, RunState,
    Simulation,
};

/// Métadonnées d'un instantané cohérent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInfo {
    pub progress: f64,
    pub is_final: bool,
    pub max_density: u32,
}

/// Cadre de pixels partagé entre l'écrivain (thread de rendu) et les
/// lecteurs (thread UI).
pub struct SharedFrame {
    width: u32,
    height: u32,
    seq: AtomicU64,
    progress_bits: AtomicU64,
    max_density: AtomicU32,
    is_final: AtomicBool,
    pixels: Vec<AtomicU32>,
}

impl SharedFrame {
    pub fn new(width: u32, height: u32) -> Arc<Self> {
        let len = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(len);
        pixels.resize_with(len, || AtomicU32::new(0));
        Arc::new(Self {
            width,
            height,
            seq: AtomicU64::new(0),
            progress_bits: AtomicU64::new(0),
            max_density: AtomicU32::new(0),
            is_final: AtomicBool::new(false),
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Publie un tampon complet. Réservé à l'unique écrivain du run.
    fn publish(&self, pixels: &[u32], checkpoint: Checkpoint) {
        debug_assert_eq!(pixels.len(), self.pixels.len());
        // Compteur impair : écriture en cours. AcqRel interdit aux écritures
        // de pixels qui suivent de remonter avant le marquage.
        self.seq.fetch_add(1, Ordering::AcqRel);
        for (cell, &value) in self.pixels.iter().zip(pixels) {
            cell.store(value, Ordering::Relaxed);
        }
        self.progress_bits
            .store(checkpoint.progress.to_bits(), Ordering::Relaxed);
        self.max_density
            .store(checkpoint.max_density, Ordering::Relaxed);
        self.is_final.store(checkpoint.is_final, Ordering::Relaxed);
        // Compteur pair : publication visible.
        self.seq.fetch_add(1, Ordering::Release);
    }

    /// Copie un instantané cohérent dans `out`.
    ///
    /// Retourne `None` si rien n'a encore été publié ou si l'écrivain a
    /// chevauché toutes les tentatives (l'appelant réessaiera au tour
    /// suivant ; l'UI affiche alors l'instantané précédent).
    pub fn snapshot(&self, out: &mut Vec<u32>) -> Option<FrameInfo> {
        for _ in 0..8 {
            let before = self.seq.load(Ordering::Acquire);
            if before == 0 || before % 2 == 1 {
                return None;
            }
            out.clear();
            out.extend(self.pixels.iter().map(|cell| cell.load(Ordering::Relaxed)));
            let info = FrameInfo {
                progress: f64::from_bits(self.progress_bits.load(Ordering::Relaxed)),
                is_final: self.is_final.load(Ordering::Relaxed),
                max_density: self.max_density.load(Ordering::Relaxed),
            };
            // La barrière interdit aux lectures de pixels de descendre sous
            // la revérification du compteur.
            fence(Ordering::Acquire);
            if self.seq.load(Ordering::Relaxed) == before {
                return Some(info);
            }
        }
        None
    }
}

/// Sink qui publie chaque tampon dans le cadre partagé.
struct SharedSink {
    frame: Arc<SharedFrame>,
}

impl PixelSink for SharedSink {
    fn write(&mut self, pixels: &[u32], _width: u32, _height: u32, checkpoint: Checkpoint) {
        self.frame.publish(pixels, checkpoint);
    }
}

/// Hôte d'un run progressif écrivant dans un cadre partagé.
pub struct SharedBackend {
    frame: Arc<SharedFrame>,
    handle: RunHandle,
    thread: Option<thread::JoinHandle<RunState>>,
}

impl SharedBackend {
    /// Démarre un run ; retourne immédiatement, le thread de rendu écrit
    /// ses points de contrôle dans le cadre partagé.
    pub fn start(
        params: AttractorParams,
        width: u32,
        height: u32,
        total_points: u64,
        quality: QualityMode,
    ) -> Self {
        let frame = SharedFrame::new(width, height);
        let handle = RunHandle::new();

        let thread_frame = Arc::clone(&frame);
        let thread_handle = handle.clone();
        let thread = thread::spawn(move || {
            let mut sim = match Simulation::new(
                params,
                width,
                height,
                total_points,
                quality,
                default_jitter(),
                thread_handle,
            ) {
                Ok(sim) => sim,
                Err(err) => {
                    warn!(%err, "démarrage du run partagé refusé");
                    return RunState::Failed(err);
                }
            };
            let mut sink = SharedSink { frame: thread_frame };
            sim.run_to_completion(&mut sink).clone()
        });

        debug!(width, height, total_points, "run partagé démarré");
        Self {
            frame,
            handle,
            thread: Some(thread),
        }
    }

    pub fn frame(&self) -> Arc<SharedFrame> {
        Arc::clone(&self.frame)
    }

    pub fn handle(&self) -> RunHandle {
        self.handle.clone()
    }

    /// Annule le run et rejoint le thread ; retourne l'état terminal.
    pub fn cancel(mut self) -> RunState {
        self.handle.cancel();
        self.join_inner()
    }

    /// Attend la fin naturelle du run.
    pub fn join(mut self) -> RunState {
        self.join_inner()
    }

    fn join_inner(&mut self) -> RunState {
        match self.thread.take() {
            Some(thread) => thread.join().unwrap_or(RunState::Cancelled),
            None => RunState::Cancelled,
        }
    }
}

impl Drop for SharedBackend {
    fn drop(&mut self) {
        self.handle.cancel();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attractor::{default_params, AttractorKind};
    use crate::color::pack_rgba;

    #[test]
    fn test_shared_run_publishes_final_frame() {
        let backend = SharedBackend::start(
            default_params(AttractorKind::Clifford),
            32,
            32,
            50_000,
            QualityMode::High,
        );
        let frame = backend.frame();
        assert_eq!(backend.join(), RunState::Completed);

        let mut out = Vec::new();
        let info = frame.snapshot(&mut out).expect("un cadre final publié");
        assert!(info.is_final);
        assert_eq!(info.progress, 1.0);
        assert!(info.max_density >= 1);
        assert_eq!(out.len(), 32 * 32);

        let bg = pack_rgba(0, 0, 0, 255);
        assert!(out.iter().any(|&p| p != bg));
    }

    #[test]
    fn test_snapshot_before_any_publish_is_none() {
        let frame = SharedFrame::new(16, 16);
        let mut out = Vec::new();
        assert_eq!(frame.snapshot(&mut out), None);
    }

    #[test]
    fn test_snapshot_is_internally_consistent() {
        // Écrivain concurrent : chaque publication est un tampon uniforme ;
        // un instantané accepté doit donc être uniforme lui aussi.
        let frame = SharedFrame::new(64, 64);
        let writer_frame = Arc::clone(&frame);
        let writer = thread::spawn(move || {
            for value in 1..=500u32 {
                let buffer = vec![value; 64 * 64];
                writer_frame.publish(
                    &buffer,
                    Checkpoint {
                        progress: value as f64 / 500.0,
                        is_final: value == 500,
                        max_density: value,
                    },
                );
            }
        });

        let mut out = Vec::new();
        for _ in 0..200 {
            if let Some(info) = frame.snapshot(&mut out) {
                let first = out[0];
                assert!(out.iter().all(|&p| p == first));
                // Les métadonnées et les pixels viennent de la même
                // publication : la valeur uniforme doit égaler max_density.
                assert_eq!(first, info.max_density);
            }
        }
        writer.join().unwrap();

        let info = frame.snapshot(&mut out).unwrap();
        assert!(info.is_final);
        assert!(out.iter().all(|&p| p == 500));
    }

    #[test]
    fn test_cancel_yields_cancelled_state() {
        let backend = SharedBackend::start(
            default_params(AttractorKind::Clifford),
            64,
            64,
            50_000_000,
            QualityMode::High,
        );
        // L'annulation est observée à la prochaine frontière de lot.
        let state = backend.cancel();
        assert!(matches!(state, RunState::Cancelled | RunState::Completed));
    }
}
