//! Persistance d'état versionnée
//!
//! Deux familles d'enregistrements partagent le même cadrage de conteneur :
//! les sauvegardes d'état complètes, versionnées et rangées par emplacement,
//! et la mémoire non volatile, un seul enregistrement par machine. L'en-tête
//! commun porte la version du format puis l'identité de la machine ; les deux
//! sont vérifiées avant de laisser la machine toucher à la charge utile.

pub mod container;

pub use container::*;

use crate::error::StateError;
use crate::machine::Machine;
use crate::VERSION;
use log::{debug, error, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Nom du bloc d'en-tête des sauvegardes d'état
pub const SAVE_STATE_TAG: &str = "Supermodel Save State";

/// Nom du bloc d'en-tête des enregistrements NVRAM
pub const NVRAM_STATE_TAG: &str = "Supermodel NVRAM State";

/// Version courante du format des sauvegardes d'état
pub const STATE_FILE_VERSION: u32 = 1;

/// Version courante du format NVRAM
pub const NVRAM_FILE_VERSION: u32 = 0;

/// Nombre d'emplacements de sauvegarde
pub const SAVE_SLOT_COUNT: u32 = 10;

/// Capacité du champ d'identité de l'en-tête, terminateur inclus
const MAX_IDENTITY_LEN: usize = 9;

/// Gestionnaire des fichiers d'état d'une session
///
/// Les sauvegardes vont dans `Saves/<id>.st<slot>`, la NVRAM dans
/// `NVRAM/<id>.nv`. L'emplacement courant ne concerne que les sauvegardes.
pub struct StatePersistence {
    saves_dir: PathBuf,
    nvram_dir: PathBuf,
    slot: u32,
}

impl StatePersistence {
    /// Crée le gestionnaire avec les répertoires standard
    pub fn new() -> Self {
        Self::with_dirs("Saves", "NVRAM")
    }

    /// Crée le gestionnaire avec des répertoires explicites
    pub fn with_dirs<P: AsRef<Path>, Q: AsRef<Path>>(saves_dir: P, nvram_dir: Q) -> Self {
        Self {
            saves_dir: saves_dir.as_ref().to_path_buf(),
            nvram_dir: nvram_dir.as_ref().to_path_buf(),
            slot: 0,
        }
    }

    /// Crée les répertoires de destination s'ils n'existent pas
    pub fn ensure_directories(&self) -> Result<(), StateError> {
        for dir in [&self.saves_dir, &self.nvram_dir] {
            fs::create_dir_all(dir).map_err(|e| StateError::Io {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Emplacement de sauvegarde courant
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Passe à l'emplacement suivant, cycliquement
    pub fn next_slot(&mut self) -> u32 {
        self.slot = (self.slot + 1) % SAVE_SLOT_COUNT;
        info!("Emplacement de sauvegarde: {}", self.slot);
        self.slot
    }

    fn state_path(&self, id: &str) -> PathBuf {
        self.saves_dir.join(format!("{id}.st{}", self.slot))
    }

    fn nvram_path(&self, id: &str) -> PathBuf {
        self.nvram_dir.join(format!("{id}.nv"))
    }

    /// Sauvegarde l'état complet dans l'emplacement courant
    pub fn save_state(&self, machine: &dyn Machine) -> Result<(), StateError> {
        let id = machine.game_info().id.clone();
        let path = self.state_path(&id);
        let result = write_record(&path, SAVE_STATE_TAG, STATE_FILE_VERSION, &id, |w| {
            machine.save_state(w)
        });
        match &result {
            Ok(()) => {
                info!("État sauvegardé dans '{}'.", path.display());
                debug!(
                    "Sauvegarde d'état: machine « {id} », emplacement {}, fichier {}",
                    self.slot,
                    path.display()
                );
            }
            Err(e) => error!("Impossible de sauvegarder l'état dans '{}': {e}", path.display()),
        }
        result
    }

    /// Restaure l'état complet depuis l'emplacement courant
    ///
    /// Tout échec précède la moindre mutation de la machine : fichier absent,
    /// en-tête introuvable, version ou identité discordantes.
    pub fn load_state(&self, machine: &mut dyn Machine) -> Result<(), StateError> {
        let id = machine.game_info().id.clone();
        let path = self.state_path(&id);
        let result = open_record(&path, SAVE_STATE_TAG, STATE_FILE_VERSION, &id)
            .and_then(|mut reader| machine.load_state(&mut reader));
        match &result {
            Ok(()) => {
                info!("État restauré depuis '{}'.", path.display());
                debug!(
                    "Restauration d'état: machine « {id} », emplacement {}, fichier {}",
                    self.slot,
                    path.display()
                );
            }
            Err(e) => error!("Impossible de charger l'état depuis '{}': {e}", path.display()),
        }
        result
    }

    /// Sauvegarde la mémoire non volatile
    pub fn save_nvram(&self, machine: &dyn Machine) -> Result<(), StateError> {
        let id = machine.game_info().id.clone();
        let path = self.nvram_path(&id);
        let result = write_record(&path, NVRAM_STATE_TAG, NVRAM_FILE_VERSION, &id, |w| {
            machine.save_nvram(w)
        });
        match &result {
            Ok(()) => {
                debug!("NVRAM sauvegardée dans '{}'.", path.display());
            }
            Err(e) => error!("Impossible de sauvegarder la NVRAM dans '{}': {e}", path.display()),
        }
        result
    }

    /// Restaure la mémoire non volatile
    ///
    /// Un fichier absent est un démarrage à froid, silencieux hors du journal
    /// de débogage.
    pub fn load_nvram(&self, machine: &mut dyn Machine) -> Result<(), StateError> {
        let id = machine.game_info().id.clone();
        let path = self.nvram_path(&id);
        let result = open_record(&path, NVRAM_STATE_TAG, NVRAM_FILE_VERSION, &id)
            .and_then(|mut reader| machine.load_nvram(&mut reader));
        match &result {
            Ok(()) => {
                debug!("NVRAM restaurée depuis '{}'.", path.display());
            }
            Err(e) if e.is_not_found() => {
                debug!("Pas de NVRAM pour « {id} », démarrage à froid.");
            }
            Err(e) => error!("Impossible de charger la NVRAM depuis '{}': {e}", path.display()),
        }
        result
    }
}

impl Default for StatePersistence {
    fn default() -> Self {
        Self::new()
    }
}

/// Écrit un enregistrement complet : en-tête versionné puis charge utile
fn write_record<F>(
    path: &Path,
    tag: &str,
    version: u32,
    id: &str,
    payload: F,
) -> Result<(), StateError>
where
    F: FnOnce(&mut BlockWriter) -> Result<(), StateError>,
{
    if id.len() + 1 > MAX_IDENTITY_LEN {
        return Err(StateError::IdentityTooLong { id: id.to_string() });
    }
    let comment = format!("Supermodel Version {VERSION}");
    let mut writer = BlockWriter::create(path, tag, &comment)?;
    writer.write_u32(version);
    writer.write(id.as_bytes());
    writer.write(&[0]);
    payload(&mut writer)?;
    writer.close()
}

/// Ouvre un enregistrement et valide son en-tête avant toute charge utile
fn open_record(
    path: &Path,
    tag: &str,
    version: u32,
    id: &str,
) -> Result<BlockReader, StateError> {
    let mut reader = BlockReader::load(path)?;
    reader.find_block(tag)?;

    let found = reader.read_u32()?;
    if found != version {
        return Err(StateError::VersionMismatch {
            expected: version,
            found,
        });
    }

    let found_id = reader.read_cstring(MAX_IDENTITY_LEN)?;
    if found_id != id {
        return Err(StateError::IdentityMismatch {
            expected: id.to_string(),
            found: found_id,
        });
    }
    Ok(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeSettings;
    use crate::games::{GameDatabase, GameInfo};

    /// Machine d'essai : un compteur et une région NVRAM
    struct BenchMachine {
        info: GameInfo,
        counter: u32,
        nvram: Vec<u8>,
    }

    impl BenchMachine {
        fn new(id: &str) -> Self {
            Self {
                info: GameInfo {
                    id: id.to_string(),
                    title: "Machine d'essai".to_string(),
                    manufacturer: "Sega".to_string(),
                    year: 1998,
                    stepping: "2.0".to_string(),
                },
                counter: 0,
                nvram: vec![0; 16],
            }
        }
    }

    impl Machine for BenchMachine {
        fn game_info(&self) -> &GameInfo {
            &self.info
        }

        fn init(&mut self, _settings: &RuntimeSettings) -> anyhow::Result<()> {
            Ok(())
        }

        fn load_rom_set(
            &mut self,
            _games: &GameDatabase,
            _path: &Path,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        fn reset(&mut self) {
            self.counter = 0;
        }

        fn run_frame(&mut self) -> anyhow::Result<()> {
            self.counter += 1;
            Ok(())
        }

        fn save_state(&self, writer: &mut BlockWriter) -> Result<(), StateError> {
            writer.new_block("bench.counter")?;
            writer.write_u32(self.counter);
            Ok(())
        }

        fn load_state(&mut self, reader: &mut BlockReader) -> Result<(), StateError> {
            reader.find_block("bench.counter")?;
            self.counter = reader.read_u32()?;
            Ok(())
        }

        fn save_nvram(&self, writer: &mut BlockWriter) -> Result<(), StateError> {
            writer.new_block("bench.nvram")?;
            writer.write(&self.nvram);
            Ok(())
        }

        fn load_nvram(&mut self, reader: &mut BlockReader) -> Result<(), StateError> {
            reader.find_block("bench.nvram")?;
            let mut nvram = vec![0; self.nvram.len()];
            reader.read(&mut nvram)?;
            self.nvram = nvram;
            Ok(())
        }

        fn clear_nvram(&mut self) {
            self.nvram.fill(0);
        }
    }

    fn persistence_in(dir: &tempfile::TempDir) -> StatePersistence {
        let p = StatePersistence::with_dirs(dir.path().join("Saves"), dir.path().join("NVRAM"));
        p.ensure_directories().unwrap();
        p
    }

    #[test]
    fn test_state_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = persistence_in(&dir);

        let mut machine = BenchMachine::new("scud");
        machine.counter = 1234;
        persistence.save_state(&machine).unwrap();

        let mut restored = BenchMachine::new("scud");
        persistence.load_state(&mut restored).unwrap();
        assert_eq!(restored.counter, 1234);
    }

    #[test]
    fn test_identity_mismatch_leaves_machine_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = persistence_in(&dir);

        let mut daytona = BenchMachine::new("daytona2");
        daytona.counter = 77;
        persistence.save_state(&daytona).unwrap();

        // Même emplacement, autre machine : il faut forcer le même chemin
        std::fs::rename(
            dir.path().join("Saves/daytona2.st0"),
            dir.path().join("Saves/scud.st0"),
        )
        .unwrap();

        let mut scud = BenchMachine::new("scud");
        scud.counter = 5;
        let err = persistence.load_state(&mut scud).unwrap_err();
        assert!(matches!(err, StateError::IdentityMismatch { .. }));
        // Rejet avant toute mutation
        assert_eq!(scud.counter, 5);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = persistence_in(&dir);

        // Enregistrement forgé avec une version future
        let path = dir.path().join("Saves/scud.st0");
        let mut writer = BlockWriter::create(&path, SAVE_STATE_TAG, "essai").unwrap();
        writer.write_u32(STATE_FILE_VERSION + 1);
        writer.write(b"scud\0");
        writer.close().unwrap();

        let mut machine = BenchMachine::new("scud");
        let err = persistence.load_state(&mut machine).unwrap_err();
        assert!(matches!(
            err,
            StateError::VersionMismatch {
                expected: STATE_FILE_VERSION,
                found,
            } if found == STATE_FILE_VERSION + 1
        ));
    }

    #[test]
    fn test_slot_cycles_through_ten() {
        let dir = tempfile::tempdir().unwrap();
        let mut persistence = persistence_in(&dir);

        assert_eq!(persistence.slot(), 0);
        for expected in [1, 2, 3, 4, 5, 6, 7, 8, 9, 0, 1] {
            assert_eq!(persistence.next_slot(), expected);
        }
    }

    #[test]
    fn test_slot_qualifies_state_path_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut persistence = persistence_in(&dir);

        let machine = BenchMachine::new("vf3");
        persistence.save_state(&machine).unwrap();
        persistence.next_slot();
        persistence.save_state(&machine).unwrap();
        persistence.save_nvram(&machine).unwrap();

        assert!(dir.path().join("Saves/vf3.st0").exists());
        assert!(dir.path().join("Saves/vf3.st1").exists());
        assert!(dir.path().join("NVRAM/vf3.nv").exists());
    }

    #[test]
    fn test_nvram_round_trip_and_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = persistence_in(&dir);

        // Démarrage à froid : absence silencieuse, signalée par l'erreur
        let mut machine = BenchMachine::new("von2");
        let err = persistence.load_nvram(&mut machine).unwrap_err();
        assert!(err.is_not_found());

        machine.nvram = (0..16).collect();
        persistence.save_nvram(&machine).unwrap();

        let mut restored = BenchMachine::new("von2");
        persistence.load_nvram(&mut restored).unwrap();
        assert_eq!(restored.nvram, machine.nvram);
    }

    #[test]
    fn test_identity_too_long_refused_at_write() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = persistence_in(&dir);

        let machine = BenchMachine::new("beaucouptroplong");
        let err = persistence.save_state(&machine).unwrap_err();
        assert!(matches!(err, StateError::IdentityTooLong { .. }));
    }

    #[test]
    fn test_state_and_nvram_versions_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = persistence_in(&dir);

        let mut machine = BenchMachine::new("scud");
        persistence.save_state(&machine).unwrap();
        persistence.save_nvram(&machine).unwrap();

        // Un enregistrement NVRAM ne se charge pas comme une sauvegarde
        std::fs::copy(
            dir.path().join("NVRAM/scud.nv"),
            dir.path().join("Saves/scud.st0"),
        )
        .unwrap();
        let err = persistence.load_state(&mut machine).unwrap_err();
        assert!(matches!(err, StateError::BlockNotFound { .. }));
    }
}
