//! Journalisation de session redirigeable
//!
//! Les messages de session passent par un réceptacle global interchangeable.
//! Par défaut ils rejoignent la façade `log` (et donc `env_logger` dans le
//! binaire) ; un débogueur attaché installe son propre réceptacle le temps de
//! la session et restaure le précédent au détachement.

use log::{debug, error, info};
use parking_lot::{Mutex, RwLock};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Destination des messages de session
pub trait LogSink: Send + Sync {
    /// Message de débogage, détaillé
    fn debug_log(&self, message: &str);

    /// Message d'information, visible de l'utilisateur
    fn info_log(&self, message: &str);

    /// Message d'erreur
    fn error_log(&self, message: &str);
}

static SINK: RwLock<Option<Box<dyn LogSink>>> = RwLock::new(None);

/// Installe un réceptacle et rend le précédent, à restaurer plus tard
pub fn set_sink(sink: Box<dyn LogSink>) -> Option<Box<dyn LogSink>> {
    SINK.write().replace(sink)
}

/// Restaure un réceptacle rendu par `set_sink`
pub fn restore_sink(previous: Option<Box<dyn LogSink>>) {
    *SINK.write() = previous;
}

fn emit<F: Fn(&dyn LogSink)>(f: F) {
    let guard = SINK.read();
    match guard.as_deref() {
        Some(sink) => f(sink),
        None => f(&ConsoleSink),
    }
}

/// Message de débogage de session
pub fn debug_log(message: &str) {
    emit(|sink| sink.debug_log(message));
}

/// Message d'information de session
pub fn info_log(message: &str) {
    emit(|sink| sink.info_log(message));
}

/// Message d'erreur de session
pub fn error_log(message: &str) {
    emit(|sink| sink.error_log(message));
}

/// Réceptacle par défaut : la façade `log`
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn debug_log(&self, message: &str) {
        debug!("{message}");
    }

    fn info_log(&self, message: &str) {
        info!("{message}");
    }

    fn error_log(&self, message: &str) {
        error!("{message}");
    }
}

/// Réceptacle à fichiers : tout dans le journal de débogage, les erreurs en
/// double dans le journal d'erreurs
pub struct FileSink {
    debug_out: Mutex<BufWriter<File>>,
    error_out: Mutex<BufWriter<File>>,
}

impl FileSink {
    /// Ouvre (ou écrase) les deux fichiers journaux
    pub fn create<P: AsRef<Path>, Q: AsRef<Path>>(
        debug_path: P,
        error_path: Q,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            debug_out: Mutex::new(BufWriter::new(File::create(debug_path)?)),
            error_out: Mutex::new(BufWriter::new(File::create(error_path)?)),
        })
    }

    fn write_line(out: &Mutex<BufWriter<File>>, message: &str) {
        let mut out = out.lock();
        let _ = writeln!(out, "{message}");
        let _ = out.flush();
    }
}

impl LogSink for FileSink {
    fn debug_log(&self, message: &str) {
        Self::write_line(&self.debug_out, message);
    }

    fn info_log(&self, message: &str) {
        Self::write_line(&self.debug_out, message);
    }

    fn error_log(&self, message: &str) {
        Self::write_line(&self.debug_out, message);
        Self::write_line(&self.error_out, message);
    }
}
