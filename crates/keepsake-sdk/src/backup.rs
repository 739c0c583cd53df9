//! JSON backups of the story.

use chrono::{DateTime, Utc};
use keepsake_docstore::StoreKey;
use keepsake_model::{Document, EndingConfig, MusicConfig, StandaloneBlock, StoryNode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SdkError, SdkResult};

/// Backup fields and the store keys they are written back to.
const FIELDS: [(&str, StoreKey); 4] = [
    ("timeline", StoreKey::Timeline),
    ("standaloneBlocks", StoreKey::StandaloneBlocks),
    ("ending", StoreKey::Ending),
    ("music", StoreKey::Music),
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub timeline: Vec<StoryNode>,
    pub standalone_blocks: Vec<StandaloneBlock>,
    pub ending: EndingConfig,
    pub music: MusicConfig,
    pub exported_at: DateTime<Utc>,
}

impl Backup {
    pub fn of(document: &Document) -> Self {
        Self {
            timeline: document.nodes.clone(),
            standalone_blocks: document.standalone.clone(),
            ending: document.ending.clone(),
            music: document.music.clone(),
            exported_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> SdkResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SdkError::InvalidBackup(e.to_string()))
    }

    /// Download name, `our-story-backup-YYYY-MM-DD.json`.
    pub fn file_name(&self) -> String {
        format!("our-story-backup-{}.json", self.exported_at.format("%Y-%m-%d"))
    }
}

/// Split a backup into raw store entries, one per field present.
///
/// Values are passed through unchanged so older layouts go through the
/// regular load-time upgrade.
pub(crate) fn store_entries(json: &str) -> SdkResult<Vec<(StoreKey, String)>> {
    let value: Value = serde_json::from_str(json).map_err(|e| SdkError::InvalidBackup(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(SdkError::InvalidBackup("expected a JSON object".into()));
    };
    let entries: Vec<(StoreKey, String)> = FIELDS
        .iter()
        .filter_map(|(name, key)| match fields.get(*name) {
            Some(Value::Null) | None => None,
            Some(raw) => Some((*key, raw.to_string())),
        })
        .collect();
    if entries.is_empty() {
        return Err(SdkError::InvalidBackup("no story data found".into()));
    }
    Ok(entries)
}
