pub mod presets;

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, warn};

use crate::llm::ChatMessage;

/// Settings key holding the provider credential.
pub const CREDENTIAL_KEY: &str = "openai_api_key";

// ---------------------------------------------------------------------------
// Narrative axes
// ---------------------------------------------------------------------------

/// One configurable dimension of the narration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Style,
    Genre,
    Relation,
    Focalization,
    Person,
    Tense,
    Personality,
}

impl Axis {
    pub const ALL: [Axis; 7] = [
        Axis::Style,
        Axis::Genre,
        Axis::Relation,
        Axis::Focalization,
        Axis::Person,
        Axis::Tense,
        Axis::Personality,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Axis::Style => "literary_style",
            Axis::Genre => "literary_genre",
            Axis::Relation => "narrator_relation",
            Axis::Focalization => "focalization",
            Axis::Person => "narrative_person",
            Axis::Tense => "narrative_tense",
            Axis::Personality => "narrator_personality",
        }
    }

    pub fn description_key(self) -> String {
        format!("{}_description", self.key())
    }

    /// Short name accepted on the command line.
    pub fn short_name(self) -> &'static str {
        match self {
            Axis::Style => "style",
            Axis::Genre => "genre",
            Axis::Relation => "relation",
            Axis::Focalization => "focalization",
            Axis::Person => "person",
            Axis::Tense => "tense",
            Axis::Personality => "personality",
        }
    }

    /// Label used in the configuration turn.
    pub fn label(self) -> &'static str {
        match self {
            Axis::Style => "Style littéraire",
            Axis::Genre => "Genre",
            Axis::Relation => "Relation du narrateur à l'histoire",
            Axis::Focalization => "Focalisation",
            Axis::Person => "Personne grammaticale",
            Axis::Tense => "Temps de la narration",
            Axis::Personality => "Personnalité du narrateur",
        }
    }

    pub fn default_value(self) -> &'static str {
        match self {
            Axis::Style => "diderot",
            Axis::Genre => "conte_philosophique",
            Axis::Relation => "heterodiegetic",
            Axis::Focalization => "zero",
            Axis::Person => "third_person",
            Axis::Tense => "past",
            Axis::Personality => "playful",
        }
    }

    pub fn presets(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Axis::Style => presets::STYLES,
            Axis::Genre => presets::GENRES,
            Axis::Relation => presets::RELATIONS,
            Axis::Focalization => presets::FOCALIZATIONS,
            Axis::Person => presets::PERSONS,
            Axis::Tense => presets::TENSES,
            Axis::Personality => presets::PERSONALITIES,
        }
    }

    pub fn canonical_description(self, value: &str) -> Option<&'static str> {
        self.presets()
            .iter()
            .find(|(preset, _)| *preset == value)
            .map(|(_, description)| *description)
    }

    /// Look an axis up by its short name or its settings key.
    pub fn from_name(name: &str) -> Option<Axis> {
        let name = name.trim().to_lowercase();
        Axis::ALL
            .into_iter()
            .find(|axis| axis.short_name() == name || axis.key() == name)
    }

    fn default_choice(self) -> AxisChoice {
        let value = self.default_value();
        AxisChoice {
            value: value.to_string(),
            description: self
                .canonical_description(value)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// The value chosen for one axis and the description the narrator receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisChoice {
    pub value: String,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Settings store
// ---------------------------------------------------------------------------

/// Flat string settings, optionally backed by a JSON file.
#[derive(Debug, Default)]
pub struct Settings {
    values: BTreeMap<String, String>,
    path: Option<PathBuf>,
}

impl Settings {
    /// Read the settings file. A missing file means no settings; entries that
    /// are not strings are ignored.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No settings file at {}", path.display());
                return Ok(Self {
                    values: BTreeMap::new(),
                    path: Some(path.to_path_buf()),
                });
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        let parsed: serde_json::Value = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not valid JSON", path.display()))?;
        let Some(object) = parsed.as_object() else {
            bail!("{} must hold a JSON object", path.display());
        };

        let mut values = BTreeMap::new();
        for (key, value) in object {
            match value.as_str() {
                Some(text) => {
                    values.insert(key.clone(), text.to_string());
                }
                None => warn!("Ignoring non-string setting {key}"),
            }
        }

        Ok(Self {
            values,
            path: Some(path.to_path_buf()),
        })
    }

    #[cfg(test)]
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            path: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Write the settings back to the file they were loaded from.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            bail!("settings have no backing file");
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.values)
            .context("failed to serialize settings")?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn credential(&self) -> Option<String> {
        self.get(CREDENTIAL_KEY)
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }

    /// The effective choice for an axis. Custom values without a saved
    /// description describe themselves.
    pub fn resolve(&self, axis: Axis) -> AxisChoice {
        let Some(value) = non_empty(self.get(axis.key())) else {
            return axis.default_choice();
        };
        let description = non_empty(self.get(&axis.description_key()))
            .or_else(|| axis.canonical_description(value))
            .unwrap_or(value);
        AxisChoice {
            value: value.to_string(),
            description: description.to_string(),
        }
    }

    /// Record a new value for an axis along with its description. An empty
    /// value reverts the axis to its default.
    pub fn choose(&mut self, axis: Axis, value: &str) -> AxisChoice {
        let value = value.trim();
        let choice = if value.is_empty() {
            axis.default_choice()
        } else {
            AxisChoice {
                value: value.to_string(),
                description: axis
                    .canonical_description(value)
                    .unwrap_or(value)
                    .to_string(),
            }
        };
        self.set(axis.key(), choice.value.clone());
        self.set(axis.description_key(), choice.description.clone());
        choice
    }

    pub fn narrative(&self) -> NarrativeConfig {
        NarrativeConfig {
            choices: Axis::ALL
                .into_iter()
                .map(|axis| (axis, self.resolve(axis)))
                .collect(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Configuration turn
// ---------------------------------------------------------------------------

/// Every axis resolved from the settings, ready to brief the narrator.
#[derive(Debug, Clone)]
pub struct NarrativeConfig {
    pub choices: Vec<(Axis, AxisChoice)>,
}

impl NarrativeConfig {
    /// The hidden system turn that opens every conversation.
    pub fn configuration_turn(&self) -> ChatMessage {
        let mut s = String::from(
            "Tu es « Chat le Fataliste », un narrateur qui écrit une histoire \
             à quatre mains avec l'utilisateur.\n\nPARAMÈTRES NARRATIFS :\n",
        );

        for (axis, choice) in &self.choices {
            s.push_str(&format!(
                "- {} : {} ({})\n",
                axis.label(),
                choice.value,
                choice.description
            ));
        }

        s.push_str(
            "\nINSTRUCTIONS STRICTES :\n\
             1. Ne t'adresse JAMAIS au lecteur et n'emploie jamais le mot « lecteur ».\n\
             2. Ne pose JAMAIS de question directe à l'utilisateur.\n\
             3. Respecte les paramètres narratifs ci-dessus dans chaque réponse.\n\
             4. Termine chaque réponse par exactement 2 ou 3 options numérotées (1., 2., 3.), \
             chacune une phrase complète décrivant une suite possible de l'histoire.\n\
             5. Présente les options directement, sans phrase d'introduction.\n\n\
             Commence par une introduction qui installe la situation initiale de l'histoire.",
        );

        ChatMessage::system(s)
    }
}
