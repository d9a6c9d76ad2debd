//! Pixel Model 3 Rust - Cœur d'exécution d'un émulateur SEGA Model 3
//!
//! Cette bibliothèque fournit le cœur temps-réel de l'émulateur : la boucle
//! d'exécution à cadence fixe, la persistance d'état versionnée (sauvegardes
//! et NVRAM) et la résolution de configuration en couches. Le CPU, le rendu
//! et la synthèse audio sont des collaborateurs externes atteints par des
//! interfaces étroites.

pub mod audio;
pub mod config;
pub mod debugger;
pub mod error;
pub mod games;
pub mod input;
pub mod logging;
pub mod machine;
pub mod runtime;
pub mod scheduler;
pub mod state;
pub mod video;

pub use audio::*;
pub use config::*;
pub use debugger::*;
pub use error::*;
pub use games::*;
pub use input::*;
pub use machine::*;
pub use runtime::*;
pub use scheduler::*;
pub use state::*;
pub use video::*;

/// Version de l'émulateur
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Largeur native de l'écran du Model 3
pub const MODEL3_SCREEN_WIDTH: u32 = 496;

/// Hauteur native de l'écran du Model 3
pub const MODEL3_SCREEN_HEIGHT: u32 = 384;

/// Cadence d'affichage du Model 3 en Hz
pub const MODEL3_FRAME_RATE: f64 = 60.0;

/// Fréquence par défaut du CPU principal (PowerPC 603e) en MHz
pub const DEFAULT_POWERPC_FREQUENCY_MHZ: u32 = 40;
