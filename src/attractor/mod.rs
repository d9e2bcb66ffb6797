//! Cœur de simulation des attracteurs étranges.
//!
//! La chaîne complète : évaluation de l'application itérée (`map`), lissage
//! stochastique et projection pixel (`jitter`), histogramme de densité
//! (`density`), puis avancement par lots avec points de contrôle
//! (`scheduler`). Les paramètres et erreurs partagés vivent dans `types`.

pub mod density;
pub mod jitter;
pub mod map;
pub mod scheduler;
pub mod types;

pub use density::{DensityGrid, SimulationState};
pub use jitter::{default_jitter, seeded_jitter, JitterSource};
pub use scheduler::{
    batch_size, render_pixels, report_interval, BufferSink, Checkpoint, PixelSink, RunHandle,
    RunState, Simulation,
};
pub use types::{
    default_params, AttractorKind, AttractorParams, QualityMode, RunError, BASE_SCALE,
    DEFAULT_POINTS, LOW_QUALITY_POINTS,
};
