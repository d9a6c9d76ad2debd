//! Base de données des jeux SEGA Model 3
//!
//! Chaque jeu est identifié par un nom court qui sert aussi d'identité de
//! machine dans les fichiers d'état persistés. Cette identité est limitée à
//! huit octets, terminateur non compris, par le format d'en-tête.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Longueur maximale de l'identifiant d'un jeu, terminateur non compris
pub const MAX_GAME_ID_LEN: usize = 8;

/// Informations sur un jeu Model 3
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameInfo {
    /// Identifiant court, unique, huit octets au plus
    pub id: String,

    /// Titre complet
    pub title: String,

    /// Fabricant
    pub manufacturer: String,

    /// Année de sortie
    pub year: u16,

    /// Révision matérielle du Model 3 (1.0, 1.5, 2.0, 2.1)
    pub stepping: String,
}

impl GameInfo {
    /// Vrai si l'identifiant tient dans le champ d'identité des fichiers d'état
    pub fn has_valid_id(&self) -> bool {
        !self.id.is_empty() && self.id.len() <= MAX_GAME_ID_LEN
    }
}

/// Base de données des jeux Model 3
pub struct GameDatabase {
    games: HashMap<String, GameInfo>,
}

impl GameDatabase {
    /// Crée une base pré-remplie avec les jeux connus
    pub fn new() -> Self {
        let mut db = Self {
            games: HashMap::new(),
        };
        db.add_known_games();
        db
    }

    /// Trouve un jeu par identifiant, puis par fragment de titre
    pub fn find_game(&self, name: &str) -> Option<&GameInfo> {
        if let Some(game) = self.games.get(name) {
            return Some(game);
        }

        // Recherche partielle, insensible à la casse
        let name_lower = name.to_lowercase();
        self.games
            .values()
            .find(|game| game.title.to_lowercase().contains(&name_lower))
    }

    /// Liste tous les jeux, triés par identifiant
    pub fn list_games(&self) -> Vec<&GameInfo> {
        let mut games: Vec<&GameInfo> = self.games.values().collect();
        games.sort_by(|a, b| a.id.cmp(&b.id));
        games
    }

    /// Ajoute ou remplace un jeu
    pub fn add_game(&mut self, game: GameInfo) {
        self.games.insert(game.id.clone(), game);
    }

    /// Charge des définitions supplémentaires depuis un fichier TOML
    ///
    /// Le fichier contient une table par jeu, la clé de table donnant
    /// l'identifiant.
    pub fn load_from_file(&mut self, path: &str) -> anyhow::Result<()> {
        let content = std::fs::read_to_string(path)?;
        let entries: HashMap<String, GameEntry> = toml::from_str(&content)?;

        for (id, entry) in entries {
            self.add_game(GameInfo {
                id,
                title: entry.title,
                manufacturer: entry.manufacturer,
                year: entry.year,
                stepping: entry.stepping,
            });
        }
        Ok(())
    }

    fn add_known_games(&mut self) {
        let known = [
            ("bass", "Sega Bass Fishing", 1997, "1.0"),
            ("daytona2", "Daytona USA 2", 1998, "2.1"),
            ("fvipers2", "Fighting Vipers 2", 1998, "2.0"),
            ("harley", "Harley-Davidson & L.A. Riders", 1997, "2.0"),
            ("lemans24", "Le Mans 24", 1997, "1.5"),
            ("lostwsga", "The Lost World", 1997, "1.5"),
            ("scud", "Scud Race", 1996, "1.5"),
            ("srally2", "Sega Rally 2", 1998, "2.0"),
            ("swtrilgy", "Star Wars Trilogy", 1998, "2.1"),
            ("vf3", "Virtua Fighter 3", 1996, "1.0"),
            ("von2", "Virtual On 2: Oratorio Tangram", 1998, "2.0"),
        ];

        for (id, title, year, stepping) in known {
            self.add_game(GameInfo {
                id: id.to_string(),
                title: title.to_string(),
                manufacturer: "Sega".to_string(),
                year,
                stepping: stepping.to_string(),
            });
        }
    }
}

impl Default for GameDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Entrée de fichier de définitions, sans l'identifiant porté par la clé
#[derive(Debug, Deserialize)]
struct GameEntry {
    title: String,
    manufacturer: String,
    year: u16,
    stepping: String,
}
