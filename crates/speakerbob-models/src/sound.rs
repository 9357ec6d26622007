use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use speakerbob_provider::Record;

use crate::new_id;

/// An uploaded audio clip. The audio itself is the lazy `audio` field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sound {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub nsfw: bool,
    /// Uploaded but not yet named; swept after a grace period.
    #[serde(default)]
    pub hidden: bool,
}

impl Sound {
    /// Lazy field holding the normalized audio bytes.
    pub const AUDIO: &'static str = "audio";

    /// A fresh, unnamed sound. It stays hidden until it is given a name.
    pub fn new() -> Self {
        Self {
            id: new_id(),
            created_at: Utc::now(),
            name: String::new(),
            duration_ms: 0,
            nsfw: false,
            hidden: true,
        }
    }
}

impl Default for Sound {
    fn default() -> Self {
        Self::new()
    }
}

impl Record for Sound {
    const PACKAGE: &'static str = "sound";
    const TYPE_NAME: &'static str = "Sound";
    const LAZY_FIELDS: &'static [&'static str] = &[Sound::AUDIO];

    fn key(&self) -> &str {
        &self.id
    }

    fn searchable(&self) -> Option<&str> {
        Some(&self.name)
    }
}

/// A named macro playing several sounds in order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub duration_ms: u64,
    #[serde(default, rename = "sounds")]
    pub sound_ids: Vec<String>,
}

impl Group {
    pub fn new() -> Self {
        Self {
            id: new_id(),
            created_at: Utc::now(),
            name: String::new(),
            duration_ms: 0,
            sound_ids: Vec::new(),
        }
    }

    pub fn contains(&self, sound_id: &str) -> bool {
        self.sound_ids.iter().any(|id| id == sound_id)
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}

impl Record for Group {
    const PACKAGE: &'static str = "sound";
    const TYPE_NAME: &'static str = "Group";

    fn key(&self) -> &str {
        &self.id
    }

    fn searchable(&self) -> Option<&str> {
        Some(&self.name)
    }
}
