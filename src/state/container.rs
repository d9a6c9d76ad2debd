//! Conteneur binaire à blocs nommés
//!
//! Format partagé par les sauvegardes d'état et les images NVRAM. Un fichier
//! est une suite ordonnée de blocs auto-décrits :
//!
//! ```text
//! [longueur totale : u32 petit-boutiste]
//! [nom du bloc, terminé par NUL]
//! [commentaire libre, terminé par NUL]
//! [données opaques]
//! ```
//!
//! Le premier bloc sert d'en-tête au conteneur : son nom identifie le type de
//! fichier et son commentaire porte un texte descriptif libre. Un conteneur
//! est soit en écriture (ajout seulement), soit en lecture (accès par nom),
//! jamais les deux : chaque mode a son propre type.

use crate::error::StateError;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Taille minimale d'un bloc : longueur, nom vide et commentaire vide
const MIN_BLOCK_LEN: usize = 4 + 1 + 1;

struct PendingBlock {
    name: String,
    comment: String,
    data: Vec<u8>,
}

/// Conteneur en mode écriture, ajout seulement
///
/// Les blocs sont émis dans l'ordre de déclaration ; cet ordre est porteur de
/// sens pour les lecteurs. Le bloc courant n'est écrit sur disque qu'à la
/// déclaration du bloc suivant ou à la fermeture.
pub struct BlockWriter {
    out: BufWriter<File>,
    path: PathBuf,
    current: PendingBlock,
}

impl BlockWriter {
    /// Crée le fichier et déclare son bloc d'en-tête
    ///
    /// Échoue notamment si le répertoire parent n'existe pas.
    pub fn create<P: AsRef<Path>>(
        path: P,
        header_name: &str,
        comment: &str,
    ) -> Result<Self, StateError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| StateError::Io {
            path: path.clone(),
            source: e,
        })?;
        Ok(Self {
            out: BufWriter::new(file),
            path,
            current: PendingBlock {
                name: header_name.to_string(),
                comment: comment.to_string(),
                data: Vec::new(),
            },
        })
    }

    /// Clôt le bloc courant et en déclare un nouveau
    pub fn new_block(&mut self, name: &str) -> Result<(), StateError> {
        self.flush_block()?;
        self.current = PendingBlock {
            name: name.to_string(),
            comment: String::new(),
            data: Vec::new(),
        };
        Ok(())
    }

    /// Ajoute des octets au bloc courant
    pub fn write(&mut self, bytes: &[u8]) {
        self.current.data.extend_from_slice(bytes);
    }

    /// Ajoute un entier petit-boutiste au bloc courant
    pub fn write_u32(&mut self, value: u32) {
        self.write(&value.to_le_bytes());
    }

    fn flush_block(&mut self) -> Result<(), StateError> {
        let total = 4 + self.current.name.len() + 1 + self.current.comment.len() + 1
            + self.current.data.len();
        let path = self.path.clone();
        let io = |e| StateError::Io {
            path: path.clone(),
            source: e,
        };
        self.out.write_all(&(total as u32).to_le_bytes()).map_err(io)?;
        self.out.write_all(self.current.name.as_bytes()).map_err(io)?;
        self.out.write_all(&[0]).map_err(io)?;
        self.out.write_all(self.current.comment.as_bytes()).map_err(io)?;
        self.out.write_all(&[0]).map_err(io)?;
        self.out.write_all(&self.current.data).map_err(io)?;
        Ok(())
    }

    /// Écrit le dernier bloc et force le vidage vers le fichier
    ///
    /// Requise sur tout chemin de sortie : un conteneur non clos n'est pas
    /// durable.
    pub fn close(mut self) -> Result<(), StateError> {
        self.flush_block()?;
        self.out.flush().map_err(|e| StateError::Io {
            path: self.path.clone(),
            source: e,
        })
    }
}

struct LoadedBlock {
    name: String,
    data: Vec<u8>,
}

/// Conteneur en mode lecture, accès aléatoire par nom de bloc
pub struct BlockReader {
    path: PathBuf,
    blocks: Vec<LoadedBlock>,
    cursor: Option<(usize, usize)>,
}

impl BlockReader {
    /// Ouvre et décadre un fichier conteneur existant
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StateError> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).map_err(|e| StateError::Io {
            path: path.clone(),
            source: e,
        })?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(|e| StateError::Io {
            path: path.clone(),
            source: e,
        })?;

        let mut blocks = Vec::new();
        let mut pos = 0usize;
        while pos < bytes.len() {
            if bytes.len() - pos < MIN_BLOCK_LEN {
                return Err(StateError::InvalidFraming { path });
            }
            let total = u32::from_le_bytes([
                bytes[pos],
                bytes[pos + 1],
                bytes[pos + 2],
                bytes[pos + 3],
            ]) as usize;
            if total < MIN_BLOCK_LEN || pos + total > bytes.len() {
                return Err(StateError::InvalidFraming { path });
            }
            let body = &bytes[pos + 4..pos + total];
            let (name, rest) = Self::split_cstring(body)
                .ok_or_else(|| StateError::InvalidFraming { path: path.clone() })?;
            let (_comment, data) = Self::split_cstring(rest)
                .ok_or_else(|| StateError::InvalidFraming { path: path.clone() })?;
            blocks.push(LoadedBlock {
                name,
                data: data.to_vec(),
            });
            pos += total;
        }

        Ok(Self {
            path,
            blocks,
            cursor: None,
        })
    }

    fn split_cstring(bytes: &[u8]) -> Option<(String, &[u8])> {
        let nul = bytes.iter().position(|&b| b == 0)?;
        let text = String::from_utf8_lossy(&bytes[..nul]).into_owned();
        Some((text, &bytes[nul + 1..]))
    }

    /// Positionne le curseur de lecture sur le premier bloc portant ce nom
    ///
    /// Les noms ne sont pas nécessairement uniques ; seul le premier compte.
    pub fn find_block(&mut self, name: &str) -> Result<(), StateError> {
        match self.blocks.iter().position(|b| b.name == name) {
            Some(index) => {
                self.cursor = Some((index, 0));
                Ok(())
            }
            None => Err(StateError::BlockNotFound {
                name: name.to_string(),
            }),
        }
    }

    fn current_block(&self) -> Result<(usize, usize), StateError> {
        self.cursor.ok_or(StateError::NoBlockSelected)
    }

    /// Consomme `buf.len()` octets à partir du curseur
    pub fn read(&mut self, buf: &mut [u8]) -> Result<(), StateError> {
        let (index, offset) = self.current_block()?;
        let block = &self.blocks[index];
        if block.data.len() - offset < buf.len() {
            return Err(StateError::TruncatedBlock {
                name: block.name.clone(),
            });
        }
        buf.copy_from_slice(&block.data[offset..offset + buf.len()]);
        self.cursor = Some((index, offset + buf.len()));
        Ok(())
    }

    /// Consomme un entier petit-boutiste
    pub fn read_u32(&mut self) -> Result<u32, StateError> {
        let mut raw = [0u8; 4];
        self.read(&mut raw)?;
        Ok(u32::from_le_bytes(raw))
    }

    /// Consomme une chaîne terminée par NUL d'au plus `max_len` octets
    /// (terminateur inclus)
    pub fn read_cstring(&mut self, max_len: usize) -> Result<String, StateError> {
        let (index, mut offset) = self.current_block()?;
        let block = &self.blocks[index];
        let mut text = Vec::new();
        loop {
            if offset >= block.data.len() || text.len() + 1 > max_len {
                return Err(StateError::TruncatedBlock {
                    name: block.name.clone(),
                });
            }
            let byte = block.data[offset];
            offset += 1;
            if byte == 0 {
                break;
            }
            text.push(byte);
        }
        self.cursor = Some((index, offset));
        Ok(String::from_utf8_lossy(&text).into_owned())
    }

    /// Nombre d'octets restants dans le bloc courant
    pub fn remaining(&self) -> usize {
        match self.cursor {
            Some((index, offset)) => self.blocks[index].data.len() - offset,
            None => 0,
        }
    }

    /// Chemin du fichier sous-jacent
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");

        let mut writer = BlockWriter::create(&path, "Header", "commentaire libre").unwrap();
        writer.write_u32(0xDEADBEEF);
        writer.new_block("CPU").unwrap();
        writer.write(&[1, 2, 3]);
        writer.new_block("RAM").unwrap();
        writer.write(&[9; 16]);
        writer.close().unwrap();

        let mut reader = BlockReader::load(&path).unwrap();
        reader.find_block("Header").unwrap();
        assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(reader.remaining(), 0);

        reader.find_block("RAM").unwrap();
        let mut ram = [0u8; 16];
        reader.read(&mut ram).unwrap();
        assert_eq!(ram, [9; 16]);

        reader.find_block("CPU").unwrap();
        let mut cpu = [0u8; 3];
        reader.read(&mut cpu).unwrap();
        assert_eq!(cpu, [1, 2, 3]);
    }

    #[test]
    fn test_find_block_returns_first_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.bin");

        let mut writer = BlockWriter::create(&path, "Header", "").unwrap();
        writer.new_block("Twice").unwrap();
        writer.write(&[1]);
        writer.new_block("Twice").unwrap();
        writer.write(&[2]);
        writer.close().unwrap();

        let mut reader = BlockReader::load(&path).unwrap();
        reader.find_block("Twice").unwrap();
        let mut byte = [0u8; 1];
        reader.read(&mut byte).unwrap();
        assert_eq!(byte[0], 1);
    }

    #[test]
    fn test_missing_block_and_overrun() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");

        let mut writer = BlockWriter::create(&path, "Header", "").unwrap();
        writer.write(&[1, 2]);
        writer.close().unwrap();

        let mut reader = BlockReader::load(&path).unwrap();
        assert!(matches!(
            reader.find_block("Absent"),
            Err(StateError::BlockNotFound { .. })
        ));

        reader.find_block("Header").unwrap();
        let mut too_much = [0u8; 3];
        assert!(matches!(
            reader.read(&mut too_much),
            Err(StateError::TruncatedBlock { .. })
        ));
    }

    #[test]
    fn test_create_fails_without_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("state.bin");
        assert!(matches!(
            BlockWriter::create(&path, "Header", ""),
            Err(StateError::Io { .. })
        ));
    }

    #[test]
    fn test_malformed_framing_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, [0xFF, 0xFF, 0xFF]).unwrap();
        assert!(matches!(
            BlockReader::load(&path),
            Err(StateError::InvalidFraming { .. })
        ));

        // Longueur déclarée au-delà de la fin du fichier
        let path = dir.path().join("overrun.bin");
        std::fs::write(&path, 64u32.to_le_bytes()).unwrap();
        assert!(matches!(
            BlockReader::load(&path),
            Err(StateError::InvalidFraming { .. })
        ));
    }

    #[test]
    fn test_read_cstring() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id.bin");

        let mut writer = BlockWriter::create(&path, "Header", "").unwrap();
        writer.write(b"scud\0");
        writer.close().unwrap();

        let mut reader = BlockReader::load(&path).unwrap();
        reader.find_block("Header").unwrap();
        assert_eq!(reader.read_cstring(9).unwrap(), "scud");

        // Un identifiant sans terminateur dans la limite échoue
        let path = dir.path().join("bad_id.bin");
        let mut writer = BlockWriter::create(&path, "Header", "").unwrap();
        writer.write(b"identifiant-interminable");
        writer.close().unwrap();
        let mut reader = BlockReader::load(&path).unwrap();
        reader.find_block("Header").unwrap();
        assert!(matches!(
            reader.read_cstring(9),
            Err(StateError::TruncatedBlock { .. })
        ));
    }
}
