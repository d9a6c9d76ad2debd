//! Réglages effectifs de la session d'émulation
//!
//! `RuntimeSettings` porte les champs typés reconnus par le cœur. Chaque
//! consommateur pré-seme ses valeurs par défaut ; `apply` ne touche un champ
//! que si la clé correspondante existe dans le magasin, si bien qu'une clé
//! absente laisse le réglage en place.

use super::ConfigStore;
use crate::{DEFAULT_POWERPC_FREQUENCY_MHZ, MODEL3_SCREEN_HEIGHT, MODEL3_SCREEN_WIDTH};
use log::info;

/// Réglages typés de la session, équivalent du bloc de configuration global
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    /// Exécution du CPU émulé sur un fil de travail interne à la machine
    pub multi_threaded: bool,

    /// Fréquence du PowerPC en MHz, bornée à [1, 1000]
    powerpc_frequency_mhz: u32,

    /// Fichier de vertex shader de remplacement (vide = shader intégré)
    pub vertex_shader_file: String,

    /// Fichier de fragment shader de remplacement (vide = shader intégré)
    pub fragment_shader_file: String,

    /// Volume des effets sonores en pour cent, borné à [0, 100]
    sound_volume: u32,

    /// Volume de la musique MPEG en pour cent, borné à [0, 100]
    music_volume: u32,

    /// Émulation du processeur sonore SCSP
    pub emulate_scsp: bool,

    /// Émulation de la carte son numérique DSB (musique MPEG)
    pub emulate_dsb: bool,

    /// Largeur de sortie demandée
    pub x_res: u32,

    /// Hauteur de sortie demandée
    pub y_res: u32,

    /// Affichage plein écran
    pub full_screen: bool,

    /// Limitation de cadence à 60 Hz
    pub throttle: bool,

    /// Publication de la cadence mesurée sur la surface d'état
    pub show_frame_rate: bool,

    /// Système d'entrées sélectionné
    pub input_system: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            multi_threaded: false,
            powerpc_frequency_mhz: DEFAULT_POWERPC_FREQUENCY_MHZ,
            vertex_shader_file: String::new(),
            fragment_shader_file: String::new(),
            sound_volume: 100,
            music_volume: 100,
            emulate_scsp: true,
            emulate_dsb: true,
            x_res: MODEL3_SCREEN_WIDTH,
            y_res: MODEL3_SCREEN_HEIGHT,
            full_screen: false,
            throttle: true,
            show_frame_rate: false,
            input_system: "keyboard".to_string(),
        }
    }
}

impl RuntimeSettings {
    /// Fréquence du PowerPC en MHz
    pub fn powerpc_frequency(&self) -> u32 {
        self.powerpc_frequency_mhz
    }

    /// Fixe la fréquence du PowerPC, bornée à [1, 1000] MHz
    pub fn set_powerpc_frequency(&mut self, mhz: u32) {
        self.powerpc_frequency_mhz = mhz.clamp(1, 1000);
    }

    /// Volume des effets sonores en pour cent
    pub fn sound_volume(&self) -> u32 {
        self.sound_volume
    }

    /// Fixe le volume des effets, borné à [0, 100]
    pub fn set_sound_volume(&mut self, percent: u32) {
        self.sound_volume = percent.min(100);
    }

    /// Volume de la musique en pour cent
    pub fn music_volume(&self) -> u32 {
        self.music_volume
    }

    /// Fixe le volume de la musique, borné à [0, 100]
    pub fn set_music_volume(&mut self, percent: u32) {
        self.music_volume = percent.min(100);
    }

    /// Tire les clés reconnues d'une section du magasin
    ///
    /// Les clés absentes laissent les champs inchangés, les clés inconnues
    /// du magasin sont simplement ignorées. L'ordre des appels matérialise
    /// la précédence des couches.
    pub fn apply(&mut self, store: &ConfigStore, section: &str) {
        // Model 3
        if let Some(b) = store.get_boolean(section, "MultiThreaded") {
            self.multi_threaded = b;
        }
        if let Some(n) = store.get_integer(section, "PowerPCFrequency") {
            self.set_powerpc_frequency(n.max(0) as u32);
        }

        // Rendu 3D
        if let Some(s) = store.get_text(section, "VertexShader") {
            self.vertex_shader_file = s;
        }
        if let Some(s) = store.get_text(section, "FragmentShader") {
            self.fragment_shader_file = s;
        }

        // SCSP et DSB
        if let Some(n) = store.get_integer(section, "SoundVolume") {
            self.set_sound_volume(n.max(0) as u32);
        }
        if let Some(n) = store.get_integer(section, "MusicVolume") {
            self.set_music_volume(n.max(0) as u32);
        }
        if let Some(b) = store.get_boolean(section, "EmulateSCSP") {
            self.emulate_scsp = b;
        }
        if let Some(b) = store.get_boolean(section, "EmulateDSB") {
            self.emulate_dsb = b;
        }

        // Sortie vidéo
        if let Some(n) = store.get_integer(section, "XResolution") {
            self.x_res = n.max(1) as u32;
        }
        if let Some(n) = store.get_integer(section, "YResolution") {
            self.y_res = n.max(1) as u32;
        }
        if let Some(b) = store.get_boolean(section, "FullScreen") {
            self.full_screen = b;
        }
        if let Some(b) = store.get_boolean(section, "Throttle") {
            self.throttle = b;
        }
        if let Some(b) = store.get_boolean(section, "ShowFrameRate") {
            self.show_frame_rate = b;
        }

        // Entrées
        if let Some(s) = store.get_text(section, "InputSystem") {
            self.input_system = s;
        }
    }

    /// Journalise l'ensemble des réglages effectifs
    pub fn dump(&self) {
        info!("MultiThreaded    = {}", self.multi_threaded);
        info!("PowerPCFrequency = {} MHz", self.powerpc_frequency_mhz);
        info!("EmulateSCSP      = {}", self.emulate_scsp);
        info!("EmulateDSB       = {}", self.emulate_dsb);
        info!("VertexShader     = {}", self.vertex_shader_file);
        info!("FragmentShader   = {}", self.fragment_shader_file);
        info!("SoundVolume      = {}", self.sound_volume);
        info!("MusicVolume      = {}", self.music_volume);
        info!("XResolution      = {}", self.x_res);
        info!("YResolution      = {}", self.y_res);
        info!("FullScreen       = {}", self.full_screen);
        info!("Throttle         = {}", self.throttle);
        info!("ShowFrameRate    = {}", self.show_frame_rate);
        info!("InputSystem      = {}", self.input_system);
    }
}
