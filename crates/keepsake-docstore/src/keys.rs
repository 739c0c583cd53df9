//! Well-known keys of the document store.

use std::fmt;

/// The logical keys the editor reads and writes.
///
/// The avatar keys belong to the landing mini-game; the editor only reads
/// them when collecting media for export.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreKey {
    Timeline,
    StandaloneBlocks,
    Ending,
    Music,
    EditorMode,
    SchemaVersion,
    AvatarPhotos,
    AvatarNames,
    AvatarOffsets,
    AvatarScales,
}

impl StoreKey {
    /// Keys removed by a "clear all": the document and its settings.
    /// Avatar state and the schema marker survive.
    pub const CORE: [StoreKey; 5] = [
        StoreKey::Timeline,
        StoreKey::StandaloneBlocks,
        StoreKey::Ending,
        StoreKey::Music,
        StoreKey::EditorMode,
    ];

    pub const AVATAR: [StoreKey; 4] = [
        StoreKey::AvatarPhotos,
        StoreKey::AvatarNames,
        StoreKey::AvatarOffsets,
        StoreKey::AvatarScales,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::Timeline => "timeline_data",
            StoreKey::StandaloneBlocks => "standalone_blocks",
            StoreKey::Ending => "ending_config",
            StoreKey::Music => "music_data",
            StoreKey::EditorMode => "editor_mode",
            StoreKey::SchemaVersion => "schema_version",
            StoreKey::AvatarPhotos => "avatar_photos",
            StoreKey::AvatarNames => "avatar_names",
            StoreKey::AvatarOffsets => "avatar_offsets",
            StoreKey::AvatarScales => "avatar_scales",
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for StoreKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
