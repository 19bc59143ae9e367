use anyhow::Result;
use serde::Deserialize;

use crate::remote::RemoteConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub remote: RemoteConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    /// Microphone capture rate; the remote session expects 16 kHz
    pub input_sample_rate: u32,
    /// Rate of synthesized audio the endpoint sends back
    pub output_sample_rate: u32,
    /// Samples per outbound frame
    pub frame_samples: usize,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
