//! Configuration de l'émulateur
//!
//! Les réglages sont résolus en trois couches appliquées dans cet ordre :
//! la section globale du fichier de définitions, la section propre à la
//! machine émulée (connue seulement après identification du jeu de ROMs),
//! puis les surcharges de session issues de la ligne de commande. La couche
//! appliquée en dernier gagne.

pub mod settings;

pub use settings::*;

use crate::error::ConfigError;
use log::warn;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Nom de la section par défaut, utilisée comme repli des recherches
pub const DEFAULT_SECTION: &str = "Global";

/// Valeur de réglage typée au point d'accès
///
/// Les valeurs textuelles restent non interprétées jusqu'à ce qu'un accesseur
/// typé les convertisse ; une conversion impossible équivaut à une absence.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
}

impl SettingValue {
    /// Interprète la valeur comme un entier
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SettingValue::Integer(n) => Some(*n),
            SettingValue::Boolean(b) => Some(i64::from(*b)),
            SettingValue::Text(s) => s.trim().parse().ok(),
            SettingValue::Float(_) => None,
        }
    }

    /// Interprète la valeur comme un flottant
    pub fn as_float(&self) -> Option<f64> {
        match self {
            SettingValue::Float(f) => Some(*f),
            SettingValue::Integer(n) => Some(*n as f64),
            SettingValue::Text(s) => s.trim().parse().ok(),
            SettingValue::Boolean(_) => None,
        }
    }

    /// Interprète la valeur comme un booléen (les entiers suivent C : 0 = faux)
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            SettingValue::Boolean(b) => Some(*b),
            SettingValue::Integer(n) => Some(*n != 0),
            SettingValue::Text(s) => match s.trim() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            SettingValue::Float(_) => None,
        }
    }

    /// Restitue la valeur sous forme textuelle
    pub fn as_text(&self) -> String {
        match self {
            SettingValue::Text(s) => s.clone(),
            SettingValue::Integer(n) => n.to_string(),
            SettingValue::Float(f) => f.to_string(),
            SettingValue::Boolean(b) => b.to_string(),
        }
    }
}

/// Magasin de réglages ordonné par section puis par clé
///
/// Les clés sont uniques au sein d'une section ; une écriture remplace la
/// valeur existante, rien n'est jamais supprimé. Les recherches qui échouent
/// dans la section demandée se replient sur la section par défaut.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    sections: HashMap<String, HashMap<String, SettingValue>>,
    default_section: String,
}

impl ConfigStore {
    /// Crée un magasin vide avec `Global` comme section par défaut
    pub fn new() -> Self {
        Self {
            sections: HashMap::new(),
            default_section: DEFAULT_SECTION.to_string(),
        }
    }

    /// Change la section de repli des recherches
    pub fn set_default_section(&mut self, name: &str) {
        self.default_section = name.to_string();
    }

    /// Charge un fichier de définitions TOML sectionné
    ///
    /// L'absence du fichier n'est pas une erreur : le magasin reste vide.
    /// Les clés hors de toute table tombent dans la section par défaut.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let table: toml::Table = contents.parse().map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        for (key, value) in table {
            match value {
                toml::Value::Table(section) => {
                    for (inner_key, inner_value) in section {
                        if let Some(setting) = Self::convert(inner_value) {
                            self.set(&key, &inner_key, setting);
                        }
                    }
                }
                other => {
                    if let Some(setting) = Self::convert(other) {
                        let section = self.default_section.clone();
                        self.set(&section, &key, setting);
                    }
                }
            }
        }
        Ok(())
    }

    /// Charge le fichier en absorbant les erreurs de syntaxe
    ///
    /// Un fichier malformé laisse le magasin vide et se contente d'un
    /// avertissement : les valeurs par défaut intégrées prennent le relais.
    pub fn load_file_or_defaults<P: AsRef<Path>>(&mut self, path: P) {
        if let Err(e) = self.load_file(path) {
            warn!("Fichier de configuration ignoré: {e}");
            self.sections.clear();
        }
    }

    fn convert(value: toml::Value) -> Option<SettingValue> {
        match value {
            toml::Value::Integer(n) => Some(SettingValue::Integer(n)),
            toml::Value::Float(f) => Some(SettingValue::Float(f)),
            toml::Value::Boolean(b) => Some(SettingValue::Boolean(b)),
            toml::Value::String(s) => Some(SettingValue::Text(s)),
            _ => None,
        }
    }

    /// Insère ou remplace une valeur
    pub fn set(&mut self, section: &str, key: &str, value: SettingValue) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Raccourci d'insertion d'un entier
    pub fn set_integer(&mut self, section: &str, key: &str, value: i64) {
        self.set(section, key, SettingValue::Integer(value));
    }

    /// Raccourci d'insertion d'un texte
    pub fn set_text(&mut self, section: &str, key: &str, value: &str) {
        self.set(section, key, SettingValue::Text(value.to_string()));
    }

    /// Recherche une valeur, avec repli sur la section par défaut
    pub fn get(&self, section: &str, key: &str) -> Option<&SettingValue> {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .or_else(|| {
                self.sections
                    .get(&self.default_section)
                    .and_then(|s| s.get(key))
            })
    }

    /// Recherche typée d'un entier
    pub fn get_integer(&self, section: &str, key: &str) -> Option<i64> {
        self.get(section, key).and_then(SettingValue::as_integer)
    }

    /// Recherche typée d'un flottant
    pub fn get_float(&self, section: &str, key: &str) -> Option<f64> {
        self.get(section, key).and_then(SettingValue::as_float)
    }

    /// Recherche typée d'un booléen
    pub fn get_boolean(&self, section: &str, key: &str) -> Option<bool> {
        self.get(section, key).and_then(SettingValue::as_boolean)
    }

    /// Recherche typée d'un texte
    pub fn get_text(&self, section: &str, key: &str) -> Option<String> {
        self.get(section, key).map(SettingValue::as_text)
    }

    /// Vrai si aucune section n'a été peuplée
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_and_overwrite() {
        let mut store = ConfigStore::new();
        store.set_integer("Global", "SoundVolume", 100);
        assert_eq!(store.get_integer("Global", "SoundVolume"), Some(100));

        // Une réécriture remplace, elle n'empile pas
        store.set_integer("Global", "SoundVolume", 50);
        assert_eq!(store.get_integer("Global", "SoundVolume"), Some(50));
    }

    #[test]
    fn test_fallback_to_default_section() {
        let mut store = ConfigStore::new();
        store.set_integer("Global", "XResolution", 640);
        store.set_integer("daytona2", "XResolution", 800);

        // Section spécifique présente : pas de repli
        assert_eq!(store.get_integer("daytona2", "XResolution"), Some(800));
        // Section inconnue : repli sur Global
        assert_eq!(store.get_integer("scud", "XResolution"), Some(640));
        // Clé absente partout
        assert_eq!(store.get_integer("scud", "YResolution"), None);
    }

    #[test]
    fn test_text_coercion() {
        let mut store = ConfigStore::new();
        store.set_text("Global", "PowerPCFrequency", "66");
        store.set_text("Global", "FullScreen", "1");
        store.set_text("Global", "VertexShader", "shaders/custom.vert");

        assert_eq!(store.get_integer("Global", "PowerPCFrequency"), Some(66));
        assert_eq!(store.get_boolean("Global", "FullScreen"), Some(true));
        assert_eq!(
            store.get_text("Global", "VertexShader").as_deref(),
            Some("shaders/custom.vert")
        );
        // Un texte non numérique n'est pas un entier
        store.set_text("Global", "Broken", "abc");
        assert_eq!(store.get_integer("Global", "Broken"), None);
    }

    #[test]
    fn test_load_missing_file_is_empty_store() {
        let mut store = ConfigStore::new();
        assert!(store.load_file("does/not/exist.toml").is_ok());
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_sectioned_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Model3.toml");
        std::fs::write(
            &path,
            r#"
SoundVolume = 80

[Global]
XResolution = 640
FullScreen = false

[daytona2]
XResolution = 1024
"#,
        )
        .unwrap();

        let mut store = ConfigStore::new();
        store.load_file(&path).unwrap();

        // Clé hors table : section par défaut
        assert_eq!(store.get_integer("Global", "SoundVolume"), Some(80));
        assert_eq!(store.get_integer("Global", "XResolution"), Some(640));
        assert_eq!(store.get_integer("daytona2", "XResolution"), Some(1024));
        assert_eq!(store.get_boolean("daytona2", "FullScreen"), Some(false));
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Model3.toml");
        std::fs::write(&path, "ceci n'est pas = = du toml").unwrap();

        let mut store = ConfigStore::new();
        assert!(store.load_file(&path).is_err());

        store.load_file_or_defaults(&path);
        assert!(store.is_empty());
    }
}
