//! Accumulateur de densité : histogramme par pixel d'un run.
//!
//! Chaque cellule compte le nombre de points projetés dans ce pixel. Les
//! compteurs sont des u32 : avec des budgets réalistes (quelques dizaines de
//! millions de points) on reste très loin du plafond 2^32, aucun contrôle de
//! débordement n'est donc effectué.

/// Histogramme de densité width×height avec maximum courant.
#[derive(Clone, Debug)]
pub struct DensityGrid {
    width: u32,
    height: u32,
    counts: Vec<u32>,
    max_density: u32,
}

impl DensityGrid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            counts: vec![0; width as usize * height as usize],
            max_density: 0,
        }
    }

    /// Incrémente la cellule (px, py) et retourne le maximum courant.
    ///
    /// Les coordonnées doivent avoir été validées par la projection.
    #[inline]
    pub fn accumulate(&mut self, px: u32, py: u32) -> u32 {
        debug_assert!(px < self.width && py < self.height);
        let idx = py as usize * self.width as usize + px as usize;
        self.counts[idx] += 1;
        if self.counts[idx] > self.max_density {
            self.max_density = self.counts[idx];
        }
        self.max_density
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub fn max_density(&self) -> u32 {
        self.max_density
    }

    /// Remet l'histogramme à zéro (réutilisation d'allocation).
    pub fn clear(&mut self) {
        self.counts.fill(0);
        self.max_density = 0;
    }

    /// Additionne cellule à cellule un autre histogramme de même géométrie.
    ///
    /// Phase de réduction du backend parallèle : chaque voie accumule dans
    /// son propre histogramme, puis les histogrammes sont fusionnés ici.
    pub fn merge(&mut self, other: &DensityGrid) {
        debug_assert_eq!(self.width, other.width);
        debug_assert_eq!(self.height, other.height);
        for (dst, src) in self.counts.iter_mut().zip(other.counts.iter()) {
            *dst += src;
            if *dst > self.max_density {
                self.max_density = *dst;
            }
        }
    }
}

/// État mutable d'une simulation en cours.
///
/// Possédé exclusivement par le run actif ; muté uniquement par le scheduler
/// progressif, et jeté quand le run est supplanté ou terminé.
#[derive(Clone, Copy, Debug)]
pub struct SimulationState {
    pub x: f64,
    pub y: f64,
    pub points_done: u64,
}
