//! Horloge, régulation de cadence et mesure de la cadence
//!
//! La boucle vise un 60 Hz virtuel : la cible du Nième tour depuis l'époque
//! de régulation est `époque + round(N * 1000/60)` millisecondes. Une boucle
//! en avance attend sa cible ; une boucle en retard repart de l'instant
//! courant sans jamais chercher à rattraper les tours perdus.

use crate::MODEL3_FRAME_RATE;
use log::debug;
use std::time::{Duration, Instant};

/// Source de temps en millisecondes
///
/// L'abstraction permet de dérouler la boucle sous une horloge simulée dans
/// les tests.
pub trait Clock {
    /// Millisecondes écoulées depuis l'origine de l'horloge
    fn ticks(&self) -> u64;

    /// Bloque jusqu'à l'instant visé ; sans effet si l'instant est passé
    fn wait_until(&self, target: u64);
}

/// Horloge réelle, précise grâce à `spin_sleep`
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn ticks(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn wait_until(&self, target: u64) {
        let now = self.ticks();
        if target > now {
            spin_sleep::sleep(Duration::from_millis(target - now));
        }
    }
}

/// Régulateur de cadence à 60 Hz virtuel
pub struct FramePacer {
    epoch: u64,
    frames: u64,
}

impl FramePacer {
    /// Ouvre une époque de régulation à l'instant donné
    pub fn new(now: u64) -> Self {
        Self {
            epoch: now,
            frames: 0,
        }
    }

    /// Clôt un tour de boucle : attend la cible ou repart de l'instant courant
    pub fn pace(&mut self, clock: &dyn Clock) {
        self.frames += 1;
        let target = self.epoch + (self.frames as f64 * 1000.0 / MODEL3_FRAME_RATE).round() as u64;
        let now = clock.ticks();
        if now <= target {
            clock.wait_until(target);
        } else {
            // En retard : nouvelle époque, les tours perdus le restent
            debug!("Cadence dépassée de {} ms, nouvelle époque", now - target);
            self.epoch = now;
            self.frames = 0;
        }
    }
}

/// Mesure de la cadence affichée, par fenêtres d'au moins une seconde
pub struct FpsCounter {
    window_start: u64,
    frames: u64,
}

impl FpsCounter {
    pub fn new(now: u64) -> Self {
        Self {
            window_start: now,
            frames: 0,
        }
    }

    /// Comptabilise une image produite
    pub fn frame(&mut self) {
        self.frames += 1;
    }

    /// Publie la mesure si la fenêtre est close, et en rouvre une
    pub fn sample(&mut self, now: u64) -> Option<f64> {
        let elapsed = now.saturating_sub(self.window_start);
        if elapsed < 1000 {
            return None;
        }
        let fps = self.frames as f64 * elapsed as f64 / 1000.0;
        self.window_start = now;
        self.frames = 0;
        Some(fps)
    }
}
