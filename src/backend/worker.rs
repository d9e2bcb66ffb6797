//! Backend à thread dédié : la simulation tourne hors du thread UI et
//! transmet ses tampons par canal.
//!
//! Chaque point de contrôle traverse le canal sous forme de copie possédée :
//! le thread de rendu ne partage aucune mémoire avec l'hôte. Soumettre de
//! nouveaux paramètres supplante le run courant, dont la poignée est annulée
//! avant que le nouveau thread ne démarre.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use tracing::{debug, warn};

use crate::attractor::{
    default_jitter, AttractorParams, Checkpoint, PixelSink, QualityMode, RunError, RunHandle,
    RunState, Simulation,
};

/// Message envoyé du thread de rendu vers l'hôte.
pub enum RenderMessage {
    /// Un point de contrôle : tampon de pixels frais et progression.
    Checkpoint {
        pixels: Vec<u32>,
        width: u32,
        height: u32,
        progress: f64,
        is_final: bool,
        max_density: u32,
    },
    /// Le run a observé son annulation et s'est arrêté.
    Cancelled,
    /// Échec fatal (paramètres malformés).
    Failed(RunError),
}

/// Sink qui copie chaque tampon dans le canal.
struct ChannelSink {
    tx: Sender<RenderMessage>,
}

impl PixelSink for ChannelSink {
    fn write(&mut self, pixels: &[u32], width: u32, height: u32, checkpoint: Checkpoint) {
        // L'hôte a pu disparaître ; l'annulation suivra au prochain lot.
        let _ = self.tx.send(RenderMessage::Checkpoint {
            pixels: pixels.to_vec(),
            width,
            height,
            progress: checkpoint.progress,
            is_final: checkpoint.is_final,
            max_density: checkpoint.max_density,
        });
    }
}

struct ActiveRun {
    handle: RunHandle,
    rx: Receiver<RenderMessage>,
    thread: Option<thread::JoinHandle<()>>,
}

/// Hôte d'un run progressif dans un thread dédié.
///
/// `submit` supplante le run courant ; `poll` draine les messages en attente
/// sans bloquer. À la destruction, le run courant est annulé et le thread
/// rejoint.
#[derive(Default)]
pub struct WorkerBackend {
    current: Option<ActiveRun>,
}

impl WorkerBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Démarre un nouveau run, en supplantant l'éventuel run courant.
    ///
    /// L'ancienne poignée est annulée avant la construction de la nouvelle
    /// simulation : les deux threads peuvent coexister un lot au plus, mais
    /// l'ancien n'émettra plus aucun tampon.
    pub fn submit(
        &mut self,
        params: AttractorParams,
        width: u32,
        height: u32,
        total_points: u64,
        quality: QualityMode,
    ) {
        self.cancel();

        let (tx, rx) = mpsc::channel();
        let handle = RunHandle::new();
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
                    warn!(%err, "démarrage du run refusé");
                    let _ = tx.send(RenderMessage::Failed(err));
                    return;
                }
            };

            let mut sink = ChannelSink { tx: tx.clone() };
            loop {
                match sim.process_batch(&mut sink) {
                    RunState::Running => continue,
                    RunState::Completed => break,
                    RunState::Cancelled => {
                        let _ = tx.send(RenderMessage::Cancelled);
                        break;
                    }
                    RunState::Failed(err) => {
                        let _ = tx.send(RenderMessage::Failed(err.clone()));
                        break;
                    }
                }
            }
        });

        debug!("run soumis au thread de rendu");
        self.current = Some(ActiveRun {
            handle,
            rx,
            thread: Some(thread),
        });
    }

    /// Draine les messages disponibles sans bloquer.
    pub fn poll(&mut self) -> Vec<RenderMessage> {
        let mut messages = Vec::new();
        if let Some(run) = &self.current {
            loop {
                match run.rx.try_recv() {
                    Ok(msg) => messages.push(msg),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }
        }
        messages
    }

    /// Bloque jusqu'au prochain message (tests et usages batch).
    pub fn recv(&mut self) -> Option<RenderMessage> {
        self.current.as_ref().and_then(|run| run.rx.recv().ok())
    }

    /// Annule le run courant et rejoint son thread.
    pub fn cancel(&mut self) {
        if let Some(mut run) = self.current.take() {
            run.handle.cancel();
            if let Some(thread) = run.thread.take() {
                let _ = thread.join();
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }
}

impl Drop for WorkerBackend {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attractor::{default_params, AttractorKind};

    #[test]
    fn test_worker_runs_to_final_checkpoint() {
        let mut backend = WorkerBackend::new();
        backend.submit(
            default_params(AttractorKind::Clifford),
            32,
            32,
            50_000,
            QualityMode::High,
        );

        let mut saw_final = false;
        let mut last_progress = 0.0;
        while let Some(msg) = backend.recv() {
            match msg {
                RenderMessage::Checkpoint {
                    progress, is_final, ..
                } => {
                    assert!(progress >= last_progress);
                    last_progress = progress;
                    if is_final {
                        assert_eq!(progress, 1.0);
                        saw_final = true;
                    }
                }
                RenderMessage::Cancelled => panic!("annulation inattendue"),
                RenderMessage::Failed(err) => panic!("échec inattendu: {err}"),
            }
        }
        assert!(saw_final);
    }

    #[test]
    fn test_worker_reports_failure_on_bad_params() {
        let mut params = default_params(AttractorKind::Clifford);
        params.a = f64::NAN;

        let mut backend = WorkerBackend::new();
        backend.submit(params, 32, 32, 1_000, QualityMode::High);

        match backend.recv() {
            Some(RenderMessage::Failed(RunError::InvalidParams(_))) => {}
            other => panic!(
                "attendu Failed(InvalidParams), reçu {}",
                match other {
                    Some(RenderMessage::Checkpoint { .. }) => "Checkpoint",
                    Some(RenderMessage::Cancelled) => "Cancelled",
                    Some(RenderMessage::Failed(_)) => "Failed(autre)",
                    None => "rien",
                }
            ),
        }
    }

    #[test]
    fn test_submit_supersedes_previous_run() {
        let mut backend = WorkerBackend::new();
        backend.submit(
            default_params(AttractorKind::Clifford),
            64,
            64,
            50_000_000,
            QualityMode::High,
        );

        // Le second submit annule le premier run avant de démarrer.
        backend.submit(
            default_params(AttractorKind::DeJong),
            64,
            64,
            20_000,
            QualityMode::High,
        );

        let mut saw_final = false;
        while let Some(msg) = backend.recv() {
            if let RenderMessage::Checkpoint { is_final: true, .. } = msg {
                saw_final = true;
            }
        }
        assert!(saw_final);
    }

    #[test]
    fn test_cancel_stops_the_run() {
        let mut backend = WorkerBackend::new();
        backend.submit(
            default_params(AttractorKind::Clifford),
            64,
            64,
            50_000_000,
            QualityMode::High,
        );
        backend.cancel();
        assert!(!backend.is_active());
    }
}
