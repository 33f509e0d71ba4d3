use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/*
 * Classification of a library entry or scanned filesystem item.
 * Persisted as its ordinal (0=Folder .. 5=Unknown); unrecognised ordinals read back as `Unknown`.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum GameType {
    Folder,
    Zip,
    SevenZip,
    Rar,
    Iso,
    #[default]
    Unknown,
}

impl GameType {
    pub const ALL: [GameType; 6] = [
        GameType::Folder,
        GameType::Zip,
        GameType::SevenZip,
        GameType::Rar,
        GameType::Iso,
        GameType::Unknown,
    ];

    pub fn ordinal(self) -> u8 {
        match self {
            GameType::Folder => 0,
            GameType::Zip => 1,
            GameType::SevenZip => 2,
            GameType::Rar => 3,
            GameType::Iso => 4,
            GameType::Unknown => 5,
        }
    }

    pub fn from_ordinal(value: i64) -> Self {
        match value {
            0 => GameType::Folder,
            1 => GameType::Zip,
            2 => GameType::SevenZip,
            3 => GameType::Rar,
            4 => GameType::Iso,
            _ => GameType::Unknown,
        }
    }

    // Short label used by table views.
    pub fn label(self) -> &'static str {
        match self {
            GameType::Folder => "Folder",
            GameType::Zip => "Zip",
            GameType::SevenZip => "7z",
            GameType::Rar => "Rar",
            GameType::Iso => "Iso",
            GameType::Unknown => "Unknown",
        }
    }

    /*
     * Maps a lower-cased file extension to an archive type.
     * Anything that is not a recognised archive or disc image yields `Unknown`.
     */
    pub fn from_extension(extension: &str) -> Self {
        match extension {
            "zip" => GameType::Zip,
            "7z" => GameType::SevenZip,
            "rar" => GameType::Rar,
            "iso" => GameType::Iso,
            _ => GameType::Unknown,
        }
    }
}

impl std::fmt::Display for GameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for GameType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.ordinal())
    }
}

impl<'de> Deserialize<'de> for GameType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Anything that is not an integer (null, string, float) falls back to Unknown.
        let value = Value::deserialize(deserializer)?;
        Ok(value
            .as_i64()
            .map(GameType::from_ordinal)
            .unwrap_or(GameType::Unknown))
    }
}

/*
 * A single cataloged game, identified by `file_path`.
 *
 * The JSON field names follow the on-disk library format shared with earlier releases
 * (`type`, `koreanSupport`, `gameCode`, `exePath`, `lastPlayed`). Reading is per field: a
 * missing or wrong-typed value falls back to an empty string, `false`, no tags or no timestamp
 * without costing the rest of the record. Only an entry without a usable `filePath` is rejected.
 */
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub file_path: PathBuf,
    pub original_name: String,
    pub clean_name: String,
    pub folder_name: String,
    #[serde(rename = "type")]
    pub game_type: GameType,
    #[serde(rename = "koreanSupport")]
    pub korean_support: bool,
    pub tags: BTreeSet<String>,
    pub source: String,
    #[serde(rename = "gameCode")]
    pub external_code: String,
    pub thumbnail_path: String,
    #[serde(rename = "exePath")]
    pub launch_executable_path: String,
    #[serde(
        rename = "lastPlayed",
        serialize_with = "time::serde::rfc3339::option::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_played_at: Option<OffsetDateTime>,
}

impl GameRecord {
    pub fn new(file_path: PathBuf, clean_name: String, game_type: GameType) -> Self {
        GameRecord {
            file_path,
            clean_name,
            game_type,
            ..Default::default()
        }
    }

    /*
     * Reads one library entry. Returns `None` when the entry is not an object or has no
     * non-empty string `filePath`; every other field is taken only when it has the expected
     * JSON type.
     */
    pub fn from_json_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let file_path = object
            .get("filePath")
            .and_then(Value::as_str)
            .filter(|path| !path.is_empty())?;
        let text = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Some(GameRecord {
            file_path: PathBuf::from(file_path),
            original_name: text("originalName"),
            clean_name: text("cleanName"),
            folder_name: text("folderName"),
            game_type: object
                .get("type")
                .and_then(Value::as_i64)
                .map(GameType::from_ordinal)
                .unwrap_or_default(),
            korean_support: object
                .get("koreanSupport")
                .and_then(Value::as_bool)
                .unwrap_or_default(),
            tags: object
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| {
                    tags.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            source: text("source"),
            external_code: text("gameCode"),
            thumbnail_path: text("thumbnailPath"),
            launch_executable_path: text("exePath"),
            last_played_at: object
                .get("lastPlayed")
                .and_then(Value::as_str)
                .and_then(|stamp| OffsetDateTime::parse(stamp, &Rfc3339).ok()),
        })
    }

    /*
     * Builds the editable starting point for a record from a scanned entry.
     * The folder name defaults to the raw entry name so it stays stable when the user
     * edits the display name.
     */
    pub fn from_scan_entry(entry: &ScanEntry) -> Self {
        GameRecord {
            file_path: entry.absolute_path.clone(),
            original_name: entry.original_name.clone(),
            clean_name: entry.display_name.clone(),
            folder_name: entry.original_name.clone(),
            game_type: entry.kind,
            ..Default::default()
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn tags_joined(&self) -> String {
        self.tags.iter().cloned().collect::<Vec<_>>().join(", ")
    }

    pub fn has_thumbnail(&self) -> bool {
        !self.thumbnail_path.is_empty()
    }

    pub fn has_launch_executable(&self) -> bool {
        !self.launch_executable_path.is_empty()
    }
}

impl<'de> Deserialize<'de> for GameRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        GameRecord::from_json_value(&value).ok_or_else(|| {
            serde::de::Error::custom("game entry must be an object with a string filePath")
        })
    }
}

/*
 * A transient candidate produced by the scanner. It lives only for the current browse
 * session and becomes a `GameRecord` only when the user accepts it into the library.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub absolute_path: PathBuf,
    pub original_name: String,
    pub display_name: String,
    pub kind: GameType,
}

impl ScanEntry {
    pub fn is_folder(&self) -> bool {
        self.kind == GameType::Folder
    }

    pub fn parent_path(&self) -> Option<&Path> {
        self.absolute_path.parent()
    }
}
