use std::{collections::BTreeMap, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Result, SyncError};

/// Reciter ids with precomputed word timings, paired with their table files.
const DEFAULT_RECITERS: &[(&str, &str)] = &[
    ("ar.alafasy", "Alafasy_128kbps.json"),
    ("ar.abdurrahmaansudais", "Abdurrahmaan_As-Sudais_192kbps.json"),
    ("ar.shaatree", "Abu_Bakr_Ash-Shaatree_128kbps.json"),
    ("ar.hanirifai", "Hani_Rifai_192kbps.json"),
    ("ar.husary", "Husary_64kbps.json"),
    ("ar.husarymujawwad", "Husary_Muallim_128kbps.json"),
    ("ar.minshawimujawwad", "Minshawy_Mujawwad_192kbps.json"),
    ("ar.minshawi", "Minshawy_Murattal_128kbps.json"),
    ("ar.saoodshuraym", "Saood_ash-Shuraym_128kbps.json"),
    ("ar.abdulbasitmurattal", "Abdul_Basit_Murattal_64kbps.json"),
    ("ar.abdulbasitmujawwad", "Abdul_Basit_Mujawwad_128kbps.json"),
    ("ar.mohammadaltablaway", "Mohammad_al_Tablaway_128kbps.json"),
];

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub alignment: AlignmentConfig,
    pub word_audio: WordAudioConfig,
}

impl SyncConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Reads a TOML file. Sections left out keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|err| SyncError::Config {
            message: format!("cannot read {}: {err}", path.display()),
        })?;
        Self::from_toml_str(&source)
    }
}

/// Where alignment tables live and which reciters have one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    pub data_dir: PathBuf,
    pub reciters: BTreeMap<String, String>,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/reciters-wbw-timestamps"),
            reciters: DEFAULT_RECITERS
                .iter()
                .map(|(id, file)| (id.to_string(), file.to_string()))
                .collect(),
        }
    }
}

impl AlignmentConfig {
    /// Reciter table keyed by lower-cased id.
    pub fn normalized_reciters(&self) -> BTreeMap<String, String> {
        self.reciters
            .iter()
            .map(|(id, file)| (id.to_lowercase(), file.clone()))
            .collect()
    }
}

/// Configuration for isolated word clips.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WordAudioConfig {
    pub base_url: String,
}

impl Default for WordAudioConfig {
    fn default() -> Self {
        Self {
            base_url: "https://cdn.quran.tj/quran-audio-wbw".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_register_known_reciters() {
        let config = SyncConfig::default();
        assert_eq!(config.alignment.reciters.len(), DEFAULT_RECITERS.len());
        assert_eq!(
            config.alignment.reciters.get("ar.alafasy").map(String::as_str),
            Some("Alafasy_128kbps.json")
        );
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SyncConfig::from_toml_str(
            r#"
            [word_audio]
            base_url = "http://localhost:8080/wbw"
            "#,
        )
        .unwrap();

        assert_eq!(config.word_audio.base_url, "http://localhost:8080/wbw");
        assert!(config.alignment.reciters.contains_key("ar.husary"));
    }

    #[test]
    fn reciter_ids_are_normalized() {
        let config = SyncConfig::from_toml_str(
            r#"
            [alignment]
            data_dir = "/srv/timings"
            [alignment.reciters]
            "AR.Custom" = "Custom.json"
            "#,
        )
        .unwrap();

        let table = config.alignment.normalized_reciters();
        assert_eq!(table.get("ar.custom").map(String::as_str), Some("Custom.json"));
        assert_eq!(config.alignment.data_dir, PathBuf::from("/srv/timings"));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = SyncConfig::from_toml_str("[alignment\n").unwrap_err();
        assert!(matches!(err, SyncError::Config { .. }));
    }
}
