//! Boucle d'exécution à cadence fixe
//!
//! Chaque tour émule au plus une image, présente le résultat, absorbe les
//! entrées puis traite au plus une commande d'interface. Le débogueur
//! attaché, s'il y en a un, est interrogé avant les commandes et peut
//! préempter le tour. La régulation à 60 Hz s'applique en pause et tant que
//! la limitation de cadence est active.

pub mod timing;

pub use timing::*;

use crate::config::RuntimeSettings;
use crate::debugger::Debugger;
use crate::input::{InputManager, UiControl};
use crate::machine::Machine;
use crate::state::StatePersistence;
use crate::video::DisplaySurface;
use log::{error, info};

/// État de la boucle ; `Quitting` est terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Paused,
    Quitting,
}

/// Collaborateurs d'un tour de boucle
pub struct SchedulerContext<'a> {
    pub machine: &'a mut dyn Machine,
    pub display: &'a mut dyn DisplaySurface,
    pub inputs: &'a mut InputManager,
    pub persistence: &'a mut StatePersistence,
    pub debugger: Option<&'a mut dyn Debugger>,
}

/// Ordre de priorité des commandes d'interface ; la première servie gagne
const DISPATCH_ORDER: [UiControl; 11] = [
    UiControl::Exit,
    UiControl::Reset,
    UiControl::TogglePause,
    UiControl::SaveState,
    UiControl::ChangeSlot,
    UiControl::LoadState,
    UiControl::DumpInputState,
    UiControl::ToggleCursor,
    UiControl::ClearNvram,
    UiControl::ToggleFrameLimit,
    UiControl::EnterDebugger,
];

/// Boucle d'exécution de la session
pub struct FrameScheduler {
    clock: Box<dyn Clock>,
    state: LoopState,
    throttle: bool,
    show_fps: bool,
    full_screen: bool,
    cursor_visible: bool,
    pacer: FramePacer,
    fps: FpsCounter,
}

impl FrameScheduler {
    pub fn new(clock: Box<dyn Clock>, settings: &RuntimeSettings) -> Self {
        let now = clock.ticks();
        Self {
            clock,
            state: LoopState::Running,
            throttle: settings.throttle,
            show_fps: settings.show_frame_rate,
            full_screen: settings.full_screen,
            cursor_visible: !settings.full_screen,
            pacer: FramePacer::new(now),
            fps: FpsCounter::new(now),
        }
    }

    /// État courant de la boucle
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Déroule la boucle jusqu'à la fin de la session
    pub fn run(&mut self, ctx: &mut SchedulerContext) -> anyhow::Result<()> {
        while self.state != LoopState::Quitting {
            self.step(ctx)?;
        }
        Ok(())
    }

    /// Exécute un tour de boucle complet
    pub fn step(&mut self, ctx: &mut SchedulerContext) -> anyhow::Result<LoopState> {
        if self.state == LoopState::Quitting {
            return Ok(self.state);
        }

        if self.state == LoopState::Running {
            ctx.machine.set_inputs(ctx.inputs.machine_inputs());
            ctx.machine.run_frame()?;
            ctx.display.present();
            self.fps.frame();

            if self.show_fps {
                if let Some(fps) = self.fps.sample(self.clock.ticks()) {
                    ctx.display.set_status_text(&format!("{fps:.0} FPS"));
                }
            }
        }

        if self.state == LoopState::Paused || self.throttle {
            self.pacer.pace(self.clock.as_ref());
        }

        if let Err(e) = ctx.inputs.poll() {
            error!("Interrogation des entrées impossible: {e:#}");
            self.state = LoopState::Quitting;
            return Ok(self.state);
        }

        // Droit de préemption exclusif du débogueur sur le tour
        if let Some(debugger) = ctx.debugger.as_deref_mut() {
            debugger.poll();
            if debugger.check_exit() {
                self.state = LoopState::Quitting;
                return Ok(self.state);
            }
            if debugger.check_pause() {
                self.state = LoopState::Paused;
                return Ok(self.state);
            }
        }

        if let Some(control) = self.pending_control(ctx) {
            self.execute(control, ctx);
        }
        Ok(self.state)
    }

    /// Première commande demandée dans l'ordre de priorité
    fn pending_control(&self, ctx: &SchedulerContext) -> Option<UiControl> {
        DISPATCH_ORDER.into_iter().find(|&control| {
            ctx.inputs.ui_requested(control)
                && match control {
                    UiControl::ToggleCursor => self.full_screen,
                    UiControl::EnterDebugger => ctx.debugger.is_some(),
                    _ => true,
                }
        })
    }

    fn execute(&mut self, control: UiControl, ctx: &mut SchedulerContext) {
        match control {
            UiControl::Exit => {
                info!("Fin de session demandée.");
                self.state = LoopState::Quitting;
            }
            UiControl::Reset => {
                ctx.machine.reset();
                if let Some(debugger) = ctx.debugger.as_deref_mut() {
                    debugger.reset();
                }
                info!("Machine réinitialisée.");
            }
            UiControl::TogglePause => {
                self.state = if self.state == LoopState::Running {
                    ctx.display.set_status_text("Pause");
                    LoopState::Paused
                } else {
                    ctx.display.set_status_text("");
                    LoopState::Running
                };
            }
            UiControl::SaveState => {
                // Échec déjà journalisé ; la session continue
                let _ = ctx.persistence.save_state(ctx.machine);
            }
            UiControl::ChangeSlot => {
                ctx.persistence.next_slot();
            }
            UiControl::LoadState => {
                if ctx.persistence.load_state(ctx.machine).is_ok() {
                    if let Some(debugger) = ctx.debugger.as_deref_mut() {
                        debugger.reset();
                    }
                }
            }
            UiControl::DumpInputState => {
                ctx.inputs.dump_state();
            }
            UiControl::ToggleCursor => {
                self.cursor_visible = !self.cursor_visible;
                ctx.display.show_cursor(self.cursor_visible);
            }
            UiControl::ClearNvram => {
                ctx.machine.clear_nvram();
                info!("NVRAM effacée.");
            }
            UiControl::ToggleFrameLimit => {
                self.throttle = !self.throttle;
                info!(
                    "Limitation de cadence {}.",
                    if self.throttle { "activée" } else { "désactivée" }
                );
            }
            UiControl::EnterDebugger => {
                if let Some(debugger) = ctx.debugger.as_deref_mut() {
                    debugger.force_break(true);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::timing::testing::FakeClock;
    use super::*;
    use crate::error::StateError;
    use crate::games::{GameDatabase, GameInfo};
    use crate::input::{InputEvent, ScriptedInputSource};
    use crate::logging::{ConsoleSink, LogSink};
    use crate::state::{BlockReader, BlockWriter};
    use crate::video::{DisplayConfig, HeadlessVideo, VideoBootstrap};
    use std::path::Path;
    use winit::event::ElementState;
    use winit::keyboard::KeyCode;

    struct CountingMachine {
        info: GameInfo,
        frames: u64,
        resets: u64,
        nvram_cleared: bool,
    }

    impl CountingMachine {
        fn new() -> Self {
            Self {
                info: GameInfo {
                    id: "scud".to_string(),
                    title: "Scud Race".to_string(),
                    manufacturer: "Sega".to_string(),
                    year: 1996,
                    stepping: "1.5".to_string(),
                },
                frames: 0,
                resets: 0,
                nvram_cleared: false,
            }
        }
    }

    impl Machine for CountingMachine {
        fn game_info(&self) -> &GameInfo {
            &self.info
        }

        fn init(&mut self, _settings: &RuntimeSettings) -> anyhow::Result<()> {
            Ok(())
        }

        fn load_rom_set(&mut self, _games: &GameDatabase, _path: &Path) -> anyhow::Result<()> {
            Ok(())
        }

        fn reset(&mut self) {
            self.resets += 1;
        }

        fn run_frame(&mut self) -> anyhow::Result<()> {
            self.frames += 1;
            Ok(())
        }

        fn save_state(&self, writer: &mut BlockWriter) -> Result<(), StateError> {
            writer.new_block("compteur")?;
            writer.write_u32(self.frames as u32);
            Ok(())
        }

        fn load_state(&mut self, reader: &mut BlockReader) -> Result<(), StateError> {
            reader.find_block("compteur")?;
            self.frames = u64::from(reader.read_u32()?);
            Ok(())
        }

        fn save_nvram(&self, writer: &mut BlockWriter) -> Result<(), StateError> {
            writer.new_block("nvram")?;
            Ok(())
        }

        fn load_nvram(&mut self, reader: &mut BlockReader) -> Result<(), StateError> {
            reader.find_block("nvram")?;
            Ok(())
        }

        fn clear_nvram(&mut self) {
            self.nvram_cleared = true;
        }
    }

    struct ScriptedDebugger {
        attached: bool,
        polls: u64,
        exit_requests: u64,
        pause_requests: u64,
        breaks: u64,
        resets: u64,
    }

    impl ScriptedDebugger {
        fn new() -> Self {
            Self {
                attached: false,
                polls: 0,
                exit_requests: 0,
                pause_requests: 0,
                breaks: 0,
                resets: 0,
            }
        }
    }

    impl Debugger for ScriptedDebugger {
        fn attach(&mut self) {
            self.attached = true;
        }

        fn detach(&mut self) {
            self.attached = false;
        }

        fn poll(&mut self) {
            self.polls += 1;
        }

        fn check_exit(&mut self) -> bool {
            if self.exit_requests > 0 {
                self.exit_requests -= 1;
                return true;
            }
            false
        }

        fn check_pause(&mut self) -> bool {
            if self.pause_requests > 0 {
                self.pause_requests -= 1;
                return true;
            }
            false
        }

        fn force_break(&mut self, _user_initiated: bool) {
            self.breaks += 1;
        }

        fn reset(&mut self) {
            self.resets += 1;
        }

        fn log_sink(&self) -> Box<dyn LogSink> {
            Box::new(ConsoleSink)
        }
    }

    struct FailingSource;

    impl crate::input::InputSource for FailingSource {
        fn poll_events(&mut self) -> anyhow::Result<Vec<InputEvent>> {
            anyhow::bail!("périphérique déconnecté")
        }
    }

    fn press(key: KeyCode) -> InputEvent {
        InputEvent::Key {
            key,
            state: ElementState::Pressed,
        }
    }

    struct Bench {
        machine: CountingMachine,
        display: Box<dyn DisplaySurface>,
        inputs: InputManager,
        persistence: StatePersistence,
        _dir: tempfile::TempDir,
    }

    impl Bench {
        fn new(frames: Vec<Vec<InputEvent>>) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let persistence = StatePersistence::with_dirs(
                dir.path().join("Saves"),
                dir.path().join("NVRAM"),
            );
            persistence.ensure_directories().unwrap();
            let display = HeadlessVideo::new()
                .open(&DisplayConfig {
                    width: 496,
                    height: 384,
                    full_screen: false,
                    title: "essai".to_string(),
                })
                .unwrap();
            Self {
                machine: CountingMachine::new(),
                display,
                inputs: InputManager::new(Box::new(ScriptedInputSource::new(frames))),
                persistence,
                _dir: dir,
            }
        }

        fn ctx(&mut self) -> SchedulerContext<'_> {
            SchedulerContext {
                machine: &mut self.machine,
                display: self.display.as_mut(),
                inputs: &mut self.inputs,
                persistence: &mut self.persistence,
                debugger: None,
            }
        }
    }

    fn scheduler() -> FrameScheduler {
        let (clock, _) = FakeClock::new();
        let mut settings = RuntimeSettings::default();
        settings.throttle = false;
        FrameScheduler::new(Box::new(clock), &settings)
    }

    #[test]
    fn test_exit_outranks_everything_else() {
        let mut bench = Bench::new(vec![vec![press(KeyCode::Escape), press(KeyCode::F5)]]);
        let mut scheduler = scheduler();

        let state = scheduler.step(&mut bench.ctx()).unwrap();
        assert_eq!(state, LoopState::Quitting);
        // Une seule commande par tour : pas de sauvegarde
        assert!(!bench._dir.path().join("Saves/scud.st0").exists());
    }

    #[test]
    fn test_one_action_per_iteration() {
        let mut bench = Bench::new(vec![vec![press(KeyCode::F5), press(KeyCode::F6)], vec![]]);
        let mut scheduler = scheduler();

        scheduler.step(&mut bench.ctx()).unwrap();
        // SaveState sert en premier, le changement d'emplacement attend
        assert!(bench._dir.path().join("Saves/scud.st0").exists());
        assert_eq!(bench.persistence.slot(), 0);
    }

    #[test]
    fn test_pause_stops_emulation() {
        let mut bench = Bench::new(vec![
            vec![press(KeyCode::AltLeft), press(KeyCode::KeyP)],
            vec![],
            vec![],
        ]);
        let mut scheduler = scheduler();

        scheduler.step(&mut bench.ctx()).unwrap();
        assert_eq!(bench.machine.frames, 1);
        assert_eq!(scheduler.state(), LoopState::Paused);

        scheduler.step(&mut bench.ctx()).unwrap();
        scheduler.step(&mut bench.ctx()).unwrap();
        // Aucune image émulée en pause
        assert_eq!(bench.machine.frames, 1);
    }

    #[test]
    fn test_reset_reaches_machine_and_debugger() {
        let mut bench = Bench::new(vec![vec![
            press(KeyCode::AltLeft),
            press(KeyCode::KeyR),
        ]]);
        let mut debugger = ScriptedDebugger::new();
        let mut scheduler = scheduler();

        let mut ctx = bench.ctx();
        ctx.debugger = Some(&mut debugger);
        scheduler.step(&mut ctx).unwrap();

        assert_eq!(bench.machine.resets, 1);
        assert_eq!(debugger.resets, 1);
    }

    #[test]
    fn test_debugger_preempts_ui_controls() {
        let mut bench = Bench::new(vec![vec![press(KeyCode::Escape)]]);
        let mut debugger = ScriptedDebugger::new();
        debugger.pause_requests = 1;
        let mut scheduler = scheduler();

        let mut ctx = bench.ctx();
        ctx.debugger = Some(&mut debugger);
        let state = scheduler.step(&mut ctx).unwrap();

        // Le débogueur a préempté le tour : pas de sortie malgré Échap
        assert_eq!(state, LoopState::Paused);
        assert_eq!(debugger.polls, 1);
    }

    #[test]
    fn test_enter_debugger_needs_attached_debugger() {
        let mut bench = Bench::new(vec![
            vec![press(KeyCode::AltLeft), press(KeyCode::KeyB)],
        ]);
        let mut scheduler = scheduler();

        // Sans débogueur : la commande reste lettre morte
        let state = scheduler.step(&mut bench.ctx()).unwrap();
        assert_eq!(state, LoopState::Running);
    }

    #[test]
    fn test_input_failure_quits() {
        let mut bench = Bench::new(vec![]);
        bench.inputs = InputManager::new(Box::new(FailingSource));
        let mut scheduler = scheduler();

        let state = scheduler.step(&mut bench.ctx()).unwrap();
        assert_eq!(state, LoopState::Quitting);
    }

    #[test]
    fn test_clear_nvram_and_frame_limit_toggle() {
        let mut bench = Bench::new(vec![
            vec![press(KeyCode::AltLeft), press(KeyCode::KeyN)],
            vec![press(KeyCode::KeyT)],
        ]);
        let mut scheduler = scheduler();

        scheduler.step(&mut bench.ctx()).unwrap();
        assert!(bench.machine.nvram_cleared);

        assert!(!scheduler.throttle);
        scheduler.step(&mut bench.ctx()).unwrap();
        assert!(scheduler.throttle);
    }

    #[test]
    fn test_save_then_load_round_trip_through_loop() {
        let mut bench = Bench::new(vec![
            vec![press(KeyCode::F5)],
            vec![],
            vec![press(KeyCode::F7)],
        ]);
        let mut scheduler = scheduler();

        // Tour 1 : une image émulée puis sauvegarde (frames = 1)
        scheduler.step(&mut bench.ctx()).unwrap();
        // Tour 2 : une image de plus (frames = 2)
        scheduler.step(&mut bench.ctx()).unwrap();
        // Tour 3 : l'image 3 s'émule puis la restauration ramène frames à 1
        scheduler.step(&mut bench.ctx()).unwrap();
        assert_eq!(bench.machine.frames, 1);
    }
}
