//! Adaptateurs d'exécution autour du cœur de simulation.
//!
//! Le même scheduler progressif est hébergé de quatre façons :
//! - `sync` : tout dans le thread appelant, pour la CLI et les tests ;
//! - `worker` : thread dédié, tampons transmis par canal (copie) ;
//! - `shared` : thread dédié, tampon partagé publié sans copie ;
//! - `kernel` : noyau parallèle rayon, un seul tampon final.
//!
//! Aucun des quatre ne change la sémantique du run, seulement son hébergement.

pub mod kernel;
pub mod shared;
pub mod sync;
pub mod worker;

pub use kernel::render_parallel;
pub use shared::{SharedBackend, SharedFrame};
pub use sync::render_sync;
pub use worker::{RenderMessage, WorkerBackend};
