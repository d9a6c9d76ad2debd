//! Gestion des contrôles et entrées
//!
//! Deux familles de commandes sortent du même clavier : les commandes joueur,
//! lues par niveau à chaque image, et les commandes d'interface (sortie,
//! pause, sauvegarde...), détectées sur front montant pour ne déclencher
//! qu'une fois par appui. Les événements bruts arrivent d'une `InputSource`,
//! réelle ou scriptée.

use crate::error::BootstrapError;
use log::info;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use winit::event::ElementState;
use winit::keyboard::KeyCode;

/// Événement d'entrée normalisé
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Touche pressée ou relâchée
    Key { key: KeyCode, state: ElementState },

    /// Demande de fermeture venue du système de fenêtrage
    Quit,
}

/// Fournisseur d'événements bruts
pub trait InputSource {
    /// Rend les événements survenus depuis le dernier appel
    fn poll_events(&mut self) -> anyhow::Result<Vec<InputEvent>>;
}

/// Commande d'interface, déclenchée sur front montant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiControl {
    Exit,
    Reset,
    TogglePause,
    SaveState,
    ChangeSlot,
    LoadState,
    DumpInputState,
    ToggleCursor,
    ClearNvram,
    ToggleFrameLimit,
    EnterDebugger,
}

/// Commandes d'un joueur, lues par niveau
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerControls {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub punch: bool,
    pub kick: bool,
    pub guard: bool,
    pub start: bool,
}

/// Image complète des commandes machine pour une trame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MachineInputs {
    pub coin1: bool,
    pub coin2: bool,
    pub test: bool,
    pub service: bool,
    pub player1: PlayerControls,
    pub player2: PlayerControls,
}

/// Gestionnaire d'entrées
pub struct InputManager {
    source: Box<dyn InputSource>,
    pressed_keys: HashSet<KeyCode>,
    ui_events: HashSet<UiControl>,
    inputs: MachineInputs,
}

impl InputManager {
    pub fn new(source: Box<dyn InputSource>) -> Self {
        Self {
            source,
            pressed_keys: HashSet::new(),
            ui_events: HashSet::new(),
            inputs: MachineInputs::default(),
        }
    }

    /// Absorbe les événements en attente et met les commandes à jour
    ///
    /// Les commandes d'interface détectées ne valent que jusqu'au prochain
    /// appel.
    pub fn poll(&mut self) -> anyhow::Result<()> {
        self.ui_events.clear();
        for event in self.source.poll_events()? {
            match event {
                InputEvent::Key { key, state } => self.handle_key(key, state),
                InputEvent::Quit => {
                    self.ui_events.insert(UiControl::Exit);
                }
            }
        }
        self.update_machine_inputs();
        Ok(())
    }

    /// Vrai si la commande d'interface a été déclenchée à ce tour
    pub fn ui_requested(&self, control: UiControl) -> bool {
        self.ui_events.contains(&control)
    }

    /// Commandes machine courantes
    pub fn machine_inputs(&self) -> &MachineInputs {
        &self.inputs
    }

    fn handle_key(&mut self, key: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                // Les répétitions clavier arrivent comme des appuis : seul le
                // premier constitue un front montant.
                if self.pressed_keys.insert(key) {
                    if let Some(control) = self.ui_control_for(key) {
                        self.ui_events.insert(control);
                    }
                }
            }
            ElementState::Released => {
                self.pressed_keys.remove(&key);
            }
        }
    }

    fn alt_down(&self) -> bool {
        self.pressed_keys.contains(&KeyCode::AltLeft)
            || self.pressed_keys.contains(&KeyCode::AltRight)
    }

    fn ui_control_for(&self, key: KeyCode) -> Option<UiControl> {
        if self.alt_down() {
            return match key {
                KeyCode::KeyR => Some(UiControl::Reset),
                KeyCode::KeyP => Some(UiControl::TogglePause),
                KeyCode::KeyI => Some(UiControl::ToggleCursor),
                KeyCode::KeyN => Some(UiControl::ClearNvram),
                KeyCode::KeyT => Some(UiControl::ToggleFrameLimit),
                KeyCode::KeyB => Some(UiControl::EnterDebugger),
                _ => None,
            };
        }
        match key {
            KeyCode::Escape => Some(UiControl::Exit),
            KeyCode::F5 => Some(UiControl::SaveState),
            KeyCode::F6 => Some(UiControl::ChangeSlot),
            KeyCode::F7 => Some(UiControl::LoadState),
            KeyCode::F10 => Some(UiControl::DumpInputState),
            _ => None,
        }
    }

    fn update_machine_inputs(&mut self) {
        let down = |key: KeyCode| self.pressed_keys.contains(&key);

        self.inputs.coin1 = down(KeyCode::Digit5);
        self.inputs.coin2 = down(KeyCode::Digit6);
        self.inputs.test = down(KeyCode::F2);
        self.inputs.service = down(KeyCode::F3);

        // Joueur 1 (WASD + touches)
        self.inputs.player1 = PlayerControls {
            up: down(KeyCode::KeyW),
            down: down(KeyCode::KeyS),
            left: down(KeyCode::KeyA),
            right: down(KeyCode::KeyD),
            punch: down(KeyCode::KeyJ),
            kick: down(KeyCode::KeyK),
            guard: down(KeyCode::KeyL),
            start: down(KeyCode::Digit1),
        };

        // Joueur 2 (flèches + pavé numérique)
        self.inputs.player2 = PlayerControls {
            up: down(KeyCode::ArrowUp),
            down: down(KeyCode::ArrowDown),
            left: down(KeyCode::ArrowLeft),
            right: down(KeyCode::ArrowRight),
            punch: down(KeyCode::Numpad1),
            kick: down(KeyCode::Numpad2),
            guard: down(KeyCode::Numpad3),
            start: down(KeyCode::Digit2),
        };
    }

    /// Journalise l'état complet des commandes
    pub fn dump_state(&self) {
        info!("Commandes machine:");
        info!(
            "  coin1={} coin2={} test={} service={}",
            self.inputs.coin1, self.inputs.coin2, self.inputs.test, self.inputs.service
        );
        for (label, p) in [("joueur 1", &self.inputs.player1), ("joueur 2", &self.inputs.player2)] {
            info!(
                "  {label}: haut={} bas={} gauche={} droite={} p={} k={} g={} start={}",
                p.up, p.down, p.left, p.right, p.punch, p.kick, p.guard, p.start
            );
        }
    }
}

/// File d'événements partagée entre la couche de fenêtrage et le gestionnaire
#[derive(Clone, Default)]
pub struct EventQueue {
    events: Arc<Mutex<Vec<InputEvent>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dépose un événement, côté fenêtrage
    pub fn push(&self, event: InputEvent) {
        self.events.lock().push(event);
    }

    fn drain(&self) -> Vec<InputEvent> {
        std::mem::take(&mut self.events.lock())
    }
}

/// Source branchée sur la file du système de fenêtrage
pub struct KeyboardInputSource {
    queue: EventQueue,
}

impl KeyboardInputSource {
    pub fn new() -> Self {
        Self {
            queue: EventQueue::new(),
        }
    }

    /// Poignée à donner à la couche de fenêtrage
    pub fn queue(&self) -> EventQueue {
        self.queue.clone()
    }
}

impl Default for KeyboardInputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for KeyboardInputSource {
    fn poll_events(&mut self) -> anyhow::Result<Vec<InputEvent>> {
        Ok(self.queue.drain())
    }
}

/// Source scriptée : une liste d'événements par tour d'interrogation
pub struct ScriptedInputSource {
    frames: VecDeque<Vec<InputEvent>>,
}

impl ScriptedInputSource {
    pub fn new<I: IntoIterator<Item = Vec<InputEvent>>>(frames: I) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl InputSource for ScriptedInputSource {
    fn poll_events(&mut self) -> anyhow::Result<Vec<InputEvent>> {
        Ok(self.frames.pop_front().unwrap_or_default())
    }
}

/// Résout un système d'entrées par son nom
pub fn create_input_source(name: &str) -> Result<Box<dyn InputSource>, BootstrapError> {
    match name {
        "keyboard" => Ok(Box::new(KeyboardInputSource::new())),
        "none" => Ok(Box::new(ScriptedInputSource::new([]))),
        other => Err(BootstrapError::Input(format!(
            "système d'entrées inconnu: {other}"
        ))),
    }
}
