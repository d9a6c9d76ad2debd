//! Surface d'affichage et géométrie de sortie
//!
//! Le cœur ne dessine pas : il ouvre une surface aux dimensions demandées,
//! corrigées pour préserver le rapport d'aspect natif 496:384, et présente
//! les images que la machine soumet au puits de rendu. La surface porte
//! aussi le texte d'état (cadence mesurée, pause) et la visibilité du
//! curseur.

use crate::error::BootstrapError;
use crate::{MODEL3_SCREEN_HEIGHT, MODEL3_SCREEN_WIDTH};
use log::info;
use parking_lot::Mutex;
use std::sync::Arc;

/// Image produite par la machine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

/// Consommateur des images produites par la machine
pub trait FrameSink: Send {
    fn submit(&mut self, frame: &FrameImage);
}

/// Paramètres d'ouverture de la surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub full_screen: bool,
    pub title: String,
}

/// Fenêtre de rendu au sein de la surface, en pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Plus grande fenêtre au rapport 496:384 tenant dans la surface, centrée
    pub fn centered(total_width: u32, total_height: u32) -> Self {
        let (width, height) = correct_aspect(total_width, total_height);
        Self {
            x: (total_width - width) / 2,
            y: (total_height - height) / 2,
            width,
            height,
        }
    }
}

/// Réduit une dimension pour retrouver le rapport d'aspect natif
pub fn correct_aspect(width: u32, height: u32) -> (u32, u32) {
    let native = f64::from(MODEL3_SCREEN_WIDTH) / f64::from(MODEL3_SCREEN_HEIGHT);
    let requested = f64::from(width) / f64::from(height);
    if requested > native {
        // Trop large : bandes latérales
        ((f64::from(height) * native).round() as u32, height)
    } else {
        // Trop haut : bandes horizontales
        (width, (f64::from(width) / native).round() as u32)
    }
}

/// Amorce de la couche vidéo
pub trait VideoBootstrap {
    /// Ouvre la surface d'affichage
    fn open(&mut self, config: &DisplayConfig) -> Result<Box<dyn DisplaySurface>, BootstrapError>;

    /// Description de l'adaptateur graphique sous-jacent
    fn adapter_info(&self) -> String;
}

/// Surface d'affichage ouverte
pub trait DisplaySurface {
    /// Présente la dernière image soumise
    fn present(&mut self);

    /// Puits de rendu à brancher sur la machine
    fn frame_sink(&self) -> Box<dyn FrameSink>;

    /// Texte d'état incrusté (cadence, pause)
    fn set_status_text(&mut self, text: &str);

    /// Visibilité du curseur au-dessus de la surface
    fn show_cursor(&mut self, visible: bool);

    /// Fenêtre de rendu effective
    fn viewport(&self) -> Viewport;
}

/// État observable d'une surface sans affichage
#[derive(Debug, Default)]
pub struct HeadlessState {
    pub presented_frames: u64,
    pub submitted_frames: u64,
    pub last_frame: FrameImage,
    pub status_text: String,
    pub cursor_visible: bool,
}

/// Couche vidéo sans affichage, pour le banc d'essai et les tests
pub struct HeadlessVideo {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessVideo {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HeadlessState {
                cursor_visible: true,
                ..HeadlessState::default()
            })),
        }
    }

    /// Poignée d'observation partagée avec les surfaces ouvertes
    pub fn probe(&self) -> Arc<Mutex<HeadlessState>> {
        self.state.clone()
    }
}

impl Default for HeadlessVideo {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoBootstrap for HeadlessVideo {
    fn open(&mut self, config: &DisplayConfig) -> Result<Box<dyn DisplaySurface>, BootstrapError> {
        if config.width == 0 || config.height == 0 {
            return Err(BootstrapError::Video(format!(
                "résolution invalide: {}x{}",
                config.width, config.height
            )));
        }
        info!(
            "Surface sans affichage: {}x{}{} « {} »",
            config.width,
            config.height,
            if config.full_screen { " plein écran" } else { "" },
            config.title
        );
        Ok(Box::new(HeadlessSurface {
            state: self.state.clone(),
            viewport: Viewport::centered(config.width, config.height),
        }))
    }

    fn adapter_info(&self) -> String {
        "aucun adaptateur (surface sans affichage)".to_string()
    }
}

struct HeadlessSurface {
    state: Arc<Mutex<HeadlessState>>,
    viewport: Viewport,
}

impl DisplaySurface for HeadlessSurface {
    fn present(&mut self) {
        self.state.lock().presented_frames += 1;
    }

    fn frame_sink(&self) -> Box<dyn FrameSink> {
        Box::new(HeadlessSink {
            state: self.state.clone(),
        })
    }

    fn set_status_text(&mut self, text: &str) {
        self.state.lock().status_text = text.to_string();
    }

    fn show_cursor(&mut self, visible: bool) {
        self.state.lock().cursor_visible = visible;
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }
}

struct HeadlessSink {
    state: Arc<Mutex<HeadlessState>>,
}

impl FrameSink for HeadlessSink {
    fn submit(&mut self, frame: &FrameImage) {
        let mut state = self.state.lock();
        state.submitted_frames += 1;
        state.last_frame = frame.clone();
    }
}
