//! Machine de banc d'essai
//!
//! `DemoMachine` n'émule aucun matériel : elle tient un compteur d'images,
//! une RAM de travail et une NVRAM de crédits, et produit une image de test.
//! Elle suffit à traverser tout le cœur d'exécution, de la résolution de
//! configuration à la persistance d'état, sans jeu de ROMs réel.

use super::Machine;
use crate::config::RuntimeSettings;
use crate::error::StateError;
use crate::games::{GameDatabase, GameInfo};
use crate::input::MachineInputs;
use crate::state::{BlockReader, BlockWriter};
use crate::video::{FrameImage, FrameSink};
use anyhow::{anyhow, Context, Result};
use log::info;
use std::path::Path;

const RAM_SIZE: usize = 64 * 1024;
const NVRAM_SIZE: usize = 8 * 1024;
const PATTERN_WIDTH: u32 = 62;
const PATTERN_HEIGHT: u32 = 48;

/// Machine de démonstration exerçant le cœur de bout en bout
pub struct DemoMachine {
    info: GameInfo,
    frame_count: u32,
    ram: Vec<u8>,
    nvram: Vec<u8>,
    inputs: MachineInputs,
    renderer: Option<Box<dyn FrameSink>>,
    cycles_per_frame: u64,
}

impl DemoMachine {
    pub fn new() -> Self {
        Self {
            info: GameInfo {
                id: "demo".to_string(),
                title: "Banc d'essai".to_string(),
                manufacturer: "Sega".to_string(),
                year: 1996,
                stepping: "1.0".to_string(),
            },
            frame_count: 0,
            ram: Vec::new(),
            nvram: Vec::new(),
            inputs: MachineInputs::default(),
            renderer: None,
            cycles_per_frame: 0,
        }
    }

    /// Nombre d'images émulées depuis la dernière réinitialisation
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Crédits insérés, conservés en NVRAM
    pub fn credits(&self) -> u8 {
        self.nvram.first().copied().unwrap_or(0)
    }

    fn render_pattern(&self) -> FrameImage {
        let mut pixels = Vec::with_capacity((PATTERN_WIDTH * PATTERN_HEIGHT) as usize);
        for y in 0..PATTERN_HEIGHT {
            for x in 0..PATTERN_WIDTH {
                // Dégradé animé par le compteur d'images
                let shade = (x + y + self.frame_count) & 0xFF;
                pixels.push(shade | (shade << 8) | (shade << 16));
            }
        }
        FrameImage {
            width: PATTERN_WIDTH,
            height: PATTERN_HEIGHT,
            pixels,
        }
    }
}

impl Default for DemoMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine for DemoMachine {
    fn game_info(&self) -> &GameInfo {
        &self.info
    }

    fn init(&mut self, settings: &RuntimeSettings) -> Result<()> {
        self.ram = vec![0; RAM_SIZE];
        self.nvram = vec![0; NVRAM_SIZE];
        self.cycles_per_frame =
            u64::from(settings.powerpc_frequency()) * 1_000_000 / 60;
        info!(
            "Banc d'essai initialisé: {} Kio de RAM, {} Kio de NVRAM",
            RAM_SIZE / 1024,
            NVRAM_SIZE / 1024
        );
        Ok(())
    }

    fn load_rom_set(&mut self, games: &GameDatabase, path: &Path) -> Result<()> {
        // L'identité vient du nom du fichier, sans extension
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("chemin de jeu de ROMs illisible: {}", path.display()))?;
        let game = games
            .find_game(name)
            .with_context(|| format!("jeu inconnu: {name}"))?;
        info!("Jeu monté: {} ({}, {})", game.title, game.manufacturer, game.year);
        self.info = game.clone();
        Ok(())
    }

    fn apply_settings(&mut self, settings: &RuntimeSettings) {
        self.cycles_per_frame =
            u64::from(settings.powerpc_frequency()) * 1_000_000 / 60;
    }

    fn reset(&mut self) {
        self.frame_count = 0;
        self.ram.fill(0);
    }

    fn run_frame(&mut self) -> Result<()> {
        self.frame_count = self.frame_count.wrapping_add(1);

        // Trace d'activité en RAM, pour donner du corps aux sauvegardes
        let slot = (self.frame_count as usize) % RAM_SIZE;
        self.ram[slot] = self.ram[slot].wrapping_add(1);

        if self.renderer.is_some() {
            let frame = self.render_pattern();
            self.renderer.as_deref_mut().unwrap().submit(&frame);
        }
        Ok(())
    }

    fn set_inputs(&mut self, inputs: &MachineInputs) {
        // Front montant du monnayeur : un crédit de plus en NVRAM
        if inputs.coin1 && !self.inputs.coin1 {
            if let Some(credits) = self.nvram.first_mut() {
                *credits = credits.saturating_add(1);
            }
        }
        self.inputs = inputs.clone();
    }

    fn attach_renderer(&mut self, renderer: Box<dyn FrameSink>) {
        self.renderer = Some(renderer);
    }

    fn save_state(&self, writer: &mut BlockWriter) -> Result<(), StateError> {
        writer.new_block("demo.frame")?;
        writer.write_u32(self.frame_count);
        writer.new_block("demo.ram")?;
        writer.write(&self.ram);
        Ok(())
    }

    fn load_state(&mut self, reader: &mut BlockReader) -> Result<(), StateError> {
        reader.find_block("demo.frame")?;
        self.frame_count = reader.read_u32()?;
        reader.find_block("demo.ram")?;
        let mut ram = vec![0; RAM_SIZE];
        reader.read(&mut ram)?;
        self.ram = ram;
        Ok(())
    }

    fn save_nvram(&self, writer: &mut BlockWriter) -> Result<(), StateError> {
        writer.new_block("demo.nvram")?;
        writer.write(&self.nvram);
        Ok(())
    }

    fn load_nvram(&mut self, reader: &mut BlockReader) -> Result<(), StateError> {
        reader.find_block("demo.nvram")?;
        let mut nvram = vec![0; NVRAM_SIZE];
        reader.read(&mut nvram)?;
        self.nvram = nvram;
        Ok(())
    }

    fn clear_nvram(&mut self) {
        self.nvram.fill(0);
    }
}
