//! Contrat de la machine émulée
//!
//! Le cœur d'exécution ne connaît la machine (CPU, mémoire, rendu, son) qu'à
//! travers ce trait. Les opérations de session renvoient des `anyhow::Result`
//! contextualisés ; les opérations de persistance parlent le vocabulaire
//! précis de `StateError` car leurs échecs sont interprétés par l'appelant.

pub mod demo;

pub use demo::*;

use crate::config::RuntimeSettings;
use crate::error::StateError;
use crate::games::{GameDatabase, GameInfo};
use crate::input::MachineInputs;
use crate::state::{BlockReader, BlockWriter};
use crate::video::FrameSink;
use anyhow::Result;
use std::path::Path;

/// Interface de la machine émulée vue du cœur d'exécution
pub trait Machine {
    /// Jeu actuellement monté, qui fournit l'identité de la machine
    fn game_info(&self) -> &GameInfo;

    /// Alloue les ressources internes selon les réglages de session
    fn init(&mut self, settings: &RuntimeSettings) -> Result<()>;

    /// Identifie et monte un jeu de ROMs depuis le chemin donné
    fn load_rom_set(&mut self, games: &GameDatabase, path: &Path) -> Result<()>;

    /// Reprend les réglages effectifs après résolution complète des couches
    fn apply_settings(&mut self, settings: &RuntimeSettings) {
        let _ = settings;
    }

    /// Remet la machine dans son état de mise sous tension
    fn reset(&mut self);

    /// Émule une image complète
    fn run_frame(&mut self) -> Result<()>;

    /// Reçoit l'état des commandes joueur pour la prochaine image
    fn set_inputs(&mut self, inputs: &MachineInputs) {
        let _ = inputs;
    }

    /// Branche le consommateur des images produites
    fn attach_renderer(&mut self, renderer: Box<dyn FrameSink>) {
        let _ = renderer;
    }

    /// Sérialise l'état complet dans le conteneur ouvert
    ///
    /// L'en-tête a déjà été écrit ; la machine n'émet que ses blocs de
    /// charge utile.
    fn save_state(&self, writer: &mut BlockWriter) -> Result<(), StateError>;

    /// Restaure l'état complet depuis le conteneur ouvert
    ///
    /// L'en-tête a déjà été validé (version et identité) avant l'appel.
    fn load_state(&mut self, reader: &mut BlockReader) -> Result<(), StateError>;

    /// Sérialise la seule mémoire non volatile
    fn save_nvram(&self, writer: &mut BlockWriter) -> Result<(), StateError>;

    /// Restaure la seule mémoire non volatile
    fn load_nvram(&mut self, reader: &mut BlockReader) -> Result<(), StateError>;

    /// Efface la mémoire non volatile (retour aux réglages d'usine)
    fn clear_nvram(&mut self);
}
