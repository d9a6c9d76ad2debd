//! Sortie audio de la session
//!
//! Le cœur n'émule pas le son : il ouvre le flux de sortie que la machine
//! alimentera et répercute les volumes effectifs. Deux implémentations, la
//! sortie réelle par `cpal` et une sortie muette pour les tests et le banc
//! d'essai.

use crate::config::RuntimeSettings;
use crate::error::BootstrapError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use log::info;

/// Flux audio ouvert pour la durée de la session
pub trait AudioStream {
    /// Répercute les volumes effectifs, en pour cent
    fn set_volumes(&mut self, sound_percent: u32, music_percent: u32);

    /// Gains appliqués (effets, musique), dans [0, 1]
    fn volumes(&self) -> (f32, f32);

    /// Fréquence d'échantillonnage du flux
    fn sample_rate(&self) -> u32;
}

/// Amorce de la couche audio
pub trait AudioBootstrap {
    /// Ouvre le flux de sortie selon les réglages de session
    fn open(&mut self, settings: &RuntimeSettings) -> Result<Box<dyn AudioStream>, BootstrapError>;
}

/// Sortie audio réelle par le périphérique par défaut
pub struct CpalAudio;

impl CpalAudio {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpalAudio {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBootstrap for CpalAudio {
    fn open(&mut self, settings: &RuntimeSettings) -> Result<Box<dyn AudioStream>, BootstrapError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| BootstrapError::Audio("aucun périphérique de sortie".to_string()))?;

        let config = device
            .default_output_config()
            .map_err(|e| BootstrapError::Audio(e.to_string()))?;
        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        let stream_config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // La machine remplira ce tampon ; silence en attendant
                    for sample in data.iter_mut() {
                        *sample = 0.0;
                    }
                },
                move |err| log::error!("Erreur audio: {err}"),
                None,
            )
            .map_err(|e| BootstrapError::Audio(e.to_string()))?;
        stream
            .play()
            .map_err(|e| BootstrapError::Audio(e.to_string()))?;

        info!("Sortie audio ouverte: {sample_rate} Hz, {channels} canaux");

        let mut opened = CpalStream {
            _stream: stream,
            sample_rate,
            sound_volume: 1.0,
            music_volume: 1.0,
        };
        opened.set_volumes(settings.sound_volume(), settings.music_volume());
        Ok(Box::new(opened))
    }
}

struct CpalStream {
    _stream: Stream,
    sample_rate: u32,
    sound_volume: f32,
    music_volume: f32,
}

impl AudioStream for CpalStream {
    fn set_volumes(&mut self, sound_percent: u32, music_percent: u32) {
        self.sound_volume = (sound_percent.min(100) as f32) / 100.0;
        self.music_volume = (music_percent.min(100) as f32) / 100.0;
    }

    fn volumes(&self) -> (f32, f32) {
        (self.sound_volume, self.music_volume)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Sortie muette : accepte tout, ne produit rien
pub struct NullAudio;

impl AudioBootstrap for NullAudio {
    fn open(&mut self, settings: &RuntimeSettings) -> Result<Box<dyn AudioStream>, BootstrapError> {
        let mut stream = NullStream {
            sound_volume: 1.0,
            music_volume: 1.0,
        };
        stream.set_volumes(settings.sound_volume(), settings.music_volume());
        Ok(Box::new(stream))
    }
}

struct NullStream {
    sound_volume: f32,
    music_volume: f32,
}

impl AudioStream for NullStream {
    fn set_volumes(&mut self, sound_percent: u32, music_percent: u32) {
        self.sound_volume = (sound_percent.min(100) as f32) / 100.0;
        self.music_volume = (music_percent.min(100) as f32) / 100.0;
    }

    fn volumes(&self) -> (f32, f32) {
        (self.sound_volume, self.music_volume)
    }

    fn sample_rate(&self) -> u32 {
        44100
    }
}
