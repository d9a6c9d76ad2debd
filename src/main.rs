//! Point d'entrée de l'émulateur
//!
//! La ligne de commande ne fait que peupler la couche de surcharges de
//! session ; la résolution complète des réglages appartient au pilote. Le
//! binaire assemble la machine de banc d'essai, la vidéo sans affichage et
//! la sortie audio réelle, puis déroule la session.

use anyhow::bail;
use clap::Parser;
use log::warn;
use pixel_model3_rust::*;
use std::path::PathBuf;

/// Fichier de définitions lu au démarrage
const CONFIG_FILE: &str = "Model3.toml";

#[derive(Parser)]
#[command(name = "pixel-model3", version, about = "Émulateur SEGA Model 3")]
struct Cli {
    /// Chemin du jeu de ROMs (le nom de fichier identifie le jeu)
    rom_set: Vec<PathBuf>,

    /// Liste les jeux connus et sort
    #[arg(long)]
    print_games: bool,

    /// Affiche l'adaptateur vidéo et sort
    #[arg(long)]
    print_video_info: bool,

    /// Affiche le brochage clavier et sort
    #[arg(long)]
    print_inputs: bool,

    /// Fréquence du PowerPC en MHz
    #[arg(long, value_name = "MHZ")]
    ppc_frequency: Option<u32>,

    /// Exécute le CPU sur un fil de travail séparé
    #[arg(long)]
    multi_threaded: bool,

    /// Désactive l'émulation du processeur sonore SCSP
    #[arg(long)]
    no_scsp: bool,

    /// Désactive l'émulation de la carte musique DSB
    #[arg(long)]
    no_dsb: bool,

    /// Résolution de sortie, par exemple 992x768
    #[arg(long, value_name = "LARGEURxHAUTEUR")]
    res: Option<String>,

    /// Affichage plein écran
    #[arg(long)]
    fullscreen: bool,

    /// Désactive la limitation de cadence à 60 Hz
    #[arg(long)]
    no_throttle: bool,

    /// Publie la cadence mesurée sur la surface d'état
    #[arg(long)]
    show_fps: bool,

    /// Vertex shader de remplacement
    #[arg(long, value_name = "FICHIER")]
    vert_shader: Option<String>,

    /// Fragment shader de remplacement
    #[arg(long, value_name = "FICHIER")]
    frag_shader: Option<String>,

    /// Volume des effets en pour cent
    #[arg(long, value_name = "POURCENT")]
    sound_volume: Option<u32>,

    /// Volume de la musique en pour cent
    #[arg(long, value_name = "POURCENT")]
    music_volume: Option<u32>,

    /// Système d'entrées (keyboard, none)
    #[arg(long, value_name = "NOM")]
    input_system: Option<String>,

    /// Nombre d'images avant l'arrêt automatique du banc d'essai
    #[arg(long, default_value_t = 600, value_name = "N")]
    frames: u64,

    /// Journalise aussi dans debug.log et error.log
    #[arg(long)]
    log_to_file: bool,
}

impl Cli {
    /// Matérialise les options présentes en surcharges de session
    fn session_overrides(&self) -> anyhow::Result<ConfigStore> {
        let mut store = ConfigStore::new();
        let section = DEFAULT_SECTION;

        if let Some(mhz) = self.ppc_frequency {
            store.set_integer(section, "PowerPCFrequency", i64::from(mhz));
        }
        if self.multi_threaded {
            store.set(section, "MultiThreaded", SettingValue::Boolean(true));
        }
        if self.no_scsp {
            store.set(section, "EmulateSCSP", SettingValue::Boolean(false));
        }
        if self.no_dsb {
            store.set(section, "EmulateDSB", SettingValue::Boolean(false));
        }
        if let Some(res) = &self.res {
            let (x, y) = parse_resolution(res)?;
            store.set_integer(section, "XResolution", i64::from(x));
            store.set_integer(section, "YResolution", i64::from(y));
        }
        if self.fullscreen {
            store.set(section, "FullScreen", SettingValue::Boolean(true));
        }
        if self.no_throttle {
            store.set(section, "Throttle", SettingValue::Boolean(false));
        }
        if self.show_fps {
            store.set(section, "ShowFrameRate", SettingValue::Boolean(true));
        }
        if let Some(file) = &self.vert_shader {
            store.set_text(section, "VertexShader", file);
        }
        if let Some(file) = &self.frag_shader {
            store.set_text(section, "FragmentShader", file);
        }
        if let Some(volume) = self.sound_volume {
            store.set_integer(section, "SoundVolume", i64::from(volume));
        }
        if let Some(volume) = self.music_volume {
            store.set_integer(section, "MusicVolume", i64::from(volume));
        }
        if let Some(name) = &self.input_system {
            store.set_text(section, "InputSystem", name);
        }
        Ok(store)
    }
}

fn parse_resolution(text: &str) -> anyhow::Result<(u32, u32)> {
    let parts: Vec<&str> = text.split('x').collect();
    if let [width, height] = parts[..] {
        if let (Ok(w), Ok(h)) = (width.parse::<u32>(), height.parse::<u32>()) {
            if w > 0 && h > 0 {
                return Ok((w, h));
            }
        }
    }
    bail!("résolution invalide: « {text} » (forme attendue: 992x768)")
}

fn print_games(games: &GameDatabase) {
    println!("Jeux connus:");
    for game in games.list_games() {
        println!(
            "  {:<10} {} ({}, {})",
            game.id, game.title, game.manufacturer, game.year
        );
    }
}

fn print_inputs() {
    println!("Brochage clavier:");
    println!("  Échap            quitter");
    println!("  Alt+R            réinitialiser la machine");
    println!("  Alt+P            pause");
    println!("  F5 / F6 / F7     sauvegarder / changer d'emplacement / restaurer");
    println!("  F10              journaliser l'état des commandes");
    println!("  Alt+I            curseur (plein écran)");
    println!("  Alt+N            effacer la NVRAM");
    println!("  Alt+T            limitation de cadence");
    println!("  Alt+B            point d'arrêt du débogueur");
    println!("  5 / 6            monnayeurs");
    println!("  F2 / F3          test / service");
    println!("  WASD, J, K, L, 1 joueur 1");
    println!("  Flèches, pavé, 2 joueur 2");
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("Pixel Model 3 v{VERSION} - Émulateur SEGA Model 3");
    println!("=================================================");

    let cli = Cli::parse();
    let games = GameDatabase::new();

    if cli.print_games {
        print_games(&games);
        return Ok(());
    }
    if cli.print_inputs {
        print_inputs();
        return Ok(());
    }

    let video = HeadlessVideo::new();
    if cli.print_video_info {
        println!("Adaptateur vidéo: {}", video.adapter_info());
        return Ok(());
    }

    let rom_set_path = match cli.rom_set.split_first() {
        Some((first, rest)) => {
            for extra in rest {
                warn!("Chemin surnuméraire ignoré: {}", extra.display());
            }
            first.clone()
        }
        None => bail!("aucun jeu de ROMs indiqué (voir --help)"),
    };

    if cli.log_to_file {
        let previous = logging::set_sink(Box::new(logging::FileSink::create(
            "debug.log",
            "error.log",
        )?));
        drop(previous);
    }

    let mut file_config = ConfigStore::new();
    file_config.load_file_or_defaults(CONFIG_FILE);
    let session_overrides = cli.session_overrides()?;

    // Le système d'entrées se choisit avant la session ; seules les couches
    // (a) et (c) peuvent le nommer
    let mut input_settings = RuntimeSettings::default();
    input_settings.apply(&file_config, DEFAULT_SECTION);
    input_settings.apply(&session_overrides, DEFAULT_SECTION);
    let _source = create_input_source(&input_settings.input_system)?;

    // Le banc d'essai n'a pas de fenêtre : la session se borne à un nombre
    // d'images donné
    let script = (0..cli.frames)
        .map(|_| Vec::new())
        .chain([vec![InputEvent::Quit]]);
    let mut inputs = InputManager::new(Box::new(ScriptedInputSource::new(script)));

    let mut machine = DemoMachine::new();
    let mut persistence = StatePersistence::new();

    let driver = RuntimeDriver::new(
        Box::new(video),
        Box::new(CpalAudio::new()),
        Box::new(SystemClock::new()),
    );
    driver.run_session(SessionSetup {
        machine: &mut machine,
        games: &games,
        rom_set_path: &rom_set_path,
        file_config: &file_config,
        session_overrides: &session_overrides,
        persistence: &mut persistence,
        inputs: &mut inputs,
        debugger: None,
    })?;

    println!(
        "Session terminée: {} images émulées, {} crédit(s) en NVRAM",
        machine.frame_count(),
        machine.credits()
    );
    Ok(())
}
