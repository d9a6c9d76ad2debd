//! Composition et déroulement d'une session d'émulation
//!
//! Le pilote enchaîne en une seule passe l'amorçage des sous-systèmes, la
//! résolution des réglages en trois couches, la restauration de la NVRAM,
//! la boucle d'exécution puis la libération ordonnée. Tout échec d'amorçage
//! est fatal : aucun tour de boucle ne s'exécute et les ressources déjà
//! acquises sont relâchées dans l'ordre inverse de leur acquisition.

use crate::audio::AudioBootstrap;
use crate::config::{ConfigStore, RuntimeSettings, DEFAULT_SECTION};
use crate::debugger::Debugger;
use crate::games::GameDatabase;
use crate::input::InputManager;
use crate::logging;
use crate::machine::Machine;
use crate::scheduler::{Clock, FrameScheduler, SchedulerContext};
use crate::state::StatePersistence;
use crate::video::{correct_aspect, DisplayConfig, VideoBootstrap};
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::Path;

/// Pilote d'une session d'émulation complète
pub struct RuntimeDriver {
    video: Box<dyn VideoBootstrap>,
    audio: Box<dyn AudioBootstrap>,
    clock: Box<dyn Clock>,
}

/// Collaborateurs et paramètres d'une session
pub struct SessionSetup<'a> {
    pub machine: &'a mut dyn Machine,
    pub games: &'a GameDatabase,
    pub rom_set_path: &'a Path,
    pub file_config: &'a ConfigStore,
    pub session_overrides: &'a ConfigStore,
    pub persistence: &'a mut StatePersistence,
    pub inputs: &'a mut InputManager,
    pub debugger: Option<&'a mut dyn Debugger>,
}

impl RuntimeDriver {
    pub fn new(
        video: Box<dyn VideoBootstrap>,
        audio: Box<dyn AudioBootstrap>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            video,
            audio,
            clock,
        }
    }

    /// Déroule la session du montage des ROMs à la libération finale
    pub fn run_session(mut self, setup: SessionSetup) -> Result<()> {
        let SessionSetup {
            machine,
            games,
            rom_set_path,
            file_config,
            session_overrides,
            persistence,
            inputs,
            mut debugger,
        } = setup;

        // Couche (a) : section globale du fichier de définitions
        let mut settings = RuntimeSettings::default();
        settings.apply(file_config, DEFAULT_SECTION);

        machine
            .init(&settings)
            .context("initialisation de la machine")?;
        machine
            .load_rom_set(games, rom_set_path)
            .with_context(|| format!("montage du jeu de ROMs {}", rom_set_path.display()))?;

        // Couche (b) : section de la machine identifiée, puis (c) : session
        let game_id = machine.game_info().id.clone();
        settings.apply(file_config, &game_id);
        settings.apply(session_overrides, DEFAULT_SECTION);
        machine.apply_settings(&settings);
        settings.dump();

        persistence.ensure_directories()?;
        if let Err(e) = persistence.load_nvram(machine) {
            // Déjà journalisé ; la machine démarre à froid
            debug!("NVRAM non restaurée: {e}");
        }

        let (width, height) = correct_aspect(settings.x_res, settings.y_res);
        let mut display = self.video.open(&DisplayConfig {
            width,
            height,
            full_screen: settings.full_screen,
            title: format!("Pixel Model 3 - {}", machine.game_info().title),
        })?;
        info!("Adaptateur vidéo: {}", self.video.adapter_info());

        let audio_stream = self.audio.open(&settings)?;
        let (sound_gain, music_gain) = audio_stream.volumes();
        debug!("Gains audio appliqués: effets {sound_gain:.2}, musique {music_gain:.2}");

        machine.attach_renderer(display.frame_sink());
        machine.reset();

        // Le débogueur attaché détourne la journalisation pour la session
        let saved_sink = debugger.as_deref_mut().map(|d| {
            d.attach();
            logging::set_sink(d.log_sink())
        });

        let mut scheduler = FrameScheduler::new(self.clock, &settings);
        let loop_result = scheduler.run(&mut SchedulerContext {
            machine,
            display: display.as_mut(),
            inputs,
            persistence,
            debugger: debugger.as_deref_mut().map(|d| d as &mut dyn Debugger),
        });

        if let Some(debugger) = debugger.as_deref_mut() {
            debugger.detach();
        }
        if let Some(previous) = saved_sink {
            logging::restore_sink(previous);
        }

        // La NVRAM est due même si la boucle s'est arrêtée en erreur
        if let Err(e) = persistence.save_nvram(machine) {
            debug!("NVRAM non sauvegardée: {e}");
        }

        // Libération dans l'ordre inverse de l'acquisition
        drop(audio_stream);
        drop(display);

        loop_result
    }
}
