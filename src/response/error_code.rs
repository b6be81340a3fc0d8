use serde::Deserialize;
use serde::Serialize;

/// Store-reported error codes.
///
/// The store owns this taxonomy; the client surfaces the numeric code
/// verbatim and offers this enum as a typed view over the codes it knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum StoreErrorCode {
    KeyNotFound = 100,
    TestFailed = 101,
    NotAFile = 102,
    NotADirectory = 104,
    NodeExists = 105,
    RootReadOnly = 107,
    DirectoryNotEmpty = 108,

    PrevValueRequired = 201,
    TtlNaN = 202,
    IndexNaN = 203,
    InvalidField = 209,
    InvalidForm = 210,

    RaftInternal = 300,
    LeaderElect = 301,

    WatcherCleared = 400,
    EventIndexCleared = 401,
}

impl StoreErrorCode {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn description(self) -> &'static str {
        match self {
            StoreErrorCode::KeyNotFound => "Key not found",
            StoreErrorCode::TestFailed => "Compare failed",
            StoreErrorCode::NotAFile => "Not a file",
            StoreErrorCode::NotADirectory => "Not a directory",
            StoreErrorCode::NodeExists => "Key already exists",
            StoreErrorCode::RootReadOnly => "Root is read only",
            StoreErrorCode::DirectoryNotEmpty => "Directory not empty",
            StoreErrorCode::PrevValueRequired => "PrevValue is required in POST form",
            StoreErrorCode::TtlNaN => "The given TTL in POST form is not a number",
            StoreErrorCode::IndexNaN => "The given index in POST form is not a number",
            StoreErrorCode::InvalidField => "Invalid field",
            StoreErrorCode::InvalidForm => "Invalid POST form",
            StoreErrorCode::RaftInternal => "Raft Internal Error",
            StoreErrorCode::LeaderElect => "During Leader Election",
            StoreErrorCode::WatcherCleared => "watcher is cleared due to etcd recovery",
            StoreErrorCode::EventIndexCleared => "The event in requested index is outdated and cleared",
        }
    }
}

impl TryFrom<u32> for StoreErrorCode {
    type Error = u32;

    fn try_from(code: u32) -> std::result::Result<Self, Self::Error> {
        Ok(match code {
            100 => StoreErrorCode::KeyNotFound,
            101 => StoreErrorCode::TestFailed,
            102 => StoreErrorCode::NotAFile,
            104 => StoreErrorCode::NotADirectory,
            105 => StoreErrorCode::NodeExists,
            107 => StoreErrorCode::RootReadOnly,
            108 => StoreErrorCode::DirectoryNotEmpty,
            201 => StoreErrorCode::PrevValueRequired,
            202 => StoreErrorCode::TtlNaN,
            203 => StoreErrorCode::IndexNaN,
            209 => StoreErrorCode::InvalidField,
            210 => StoreErrorCode::InvalidForm,
            300 => StoreErrorCode::RaftInternal,
            301 => StoreErrorCode::LeaderElect,
            400 => StoreErrorCode::WatcherCleared,
            401 => StoreErrorCode::EventIndexCleared,
            other => return Err(other),
        })
    }
}

impl std::fmt::Display for StoreErrorCode {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}
