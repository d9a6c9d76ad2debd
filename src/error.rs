//! Taxonomie des erreurs du cœur d'exécution
//!
//! Trois familles : les erreurs de persistance (E/S et format des fichiers
//! d'état), les erreurs d'amorçage des sous-systèmes (vidéo, audio, entrées)
//! et les erreurs de configuration. Ces dernières sont toujours absorbées par
//! l'appelant (retour aux valeurs par défaut), jamais fatales.

use std::path::PathBuf;
use thiserror::Error;

/// Erreurs de la couche de persistance (conteneurs à blocs, états, NVRAM)
#[derive(Debug, Error)]
pub enum StateError {
    /// Échec d'entrée/sortie sur le fichier sous-jacent
    #[error("erreur d'E/S sur {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Le cadrage externe du fichier est corrompu (taille de bloc invalide)
    #[error("{path}: cadrage de bloc invalide, le fichier est corrompu")]
    InvalidFraming { path: PathBuf },

    /// Aucun bloc ne porte le nom demandé
    #[error("bloc « {name} » introuvable")]
    BlockNotFound { name: String },

    /// Lecture au-delà de la fin du bloc courant
    #[error("lecture au-delà de la fin du bloc « {name} »")]
    TruncatedBlock { name: String },

    /// Aucun curseur de lecture n'a été positionné via `find_block`
    #[error("aucun bloc sélectionné pour la lecture")]
    NoBlockSelected,

    /// La version du format enregistrée ne correspond pas à la version courante
    #[error("version de format {found} incompatible (version supportée : {expected})")]
    VersionMismatch { expected: u32, found: u32 },

    /// L'identité machine enregistrée ne correspond pas à la machine demandeuse
    #[error("l'état appartient à « {found} », pas à « {expected} »")]
    IdentityMismatch { expected: String, found: String },

    /// L'identité machine dépasse la capacité du champ d'en-tête
    #[error("identité machine « {id} » trop longue (9 octets maximum, terminateur inclus)")]
    IdentityTooLong { id: String },
}

impl StateError {
    /// Vrai si l'erreur correspond à un fichier simplement absent
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StateError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// Erreurs d'amorçage des sous-systèmes externes, fatales pour la session
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// La surface d'affichage n'a pas pu être créée
    #[error("impossible d'initialiser l'affichage: {0}")]
    Video(String),

    /// La sortie audio n'a pas pu être ouverte
    #[error("impossible d'initialiser l'audio: {0}")]
    Audio(String),

    /// Le système d'entrées demandé est inconnu ou n'a pas pu démarrer
    #[error("système d'entrées invalide: {0}")]
    Input(String),
}

/// Erreurs de lecture du fichier de définitions de configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Le fichier existe mais n'a pas pu être lu
    #[error("lecture impossible de {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Le contenu n'est pas un document TOML sectionné valide
    #[error("syntaxe invalide dans {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
