use serde::{Deserialize, Serialize};

/// Catalog-assigned item identifier.
pub type ItemId = i64;

/// Catalog genre identifier.
pub type GenreId = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    /// Parses the wire spelling of a decision, case-insensitively.
    /// Clients send either LIKE/SKIP or ACCEPT/REJECT.
    pub fn from_wire(value: &str) -> Option<Decision> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LIKE" | "ACCEPT" => Some(Decision::Accept),
            "SKIP" | "REJECT" => Some(Decision::Reject),
            _ => None,
        }
    }

    pub fn to_int(&self) -> i32 {
        match self {
            Decision::Accept => 1,
            Decision::Reject => 2,
        }
    }

    pub fn from_int(value: i32) -> Option<Decision> {
        match value {
            1 => Some(Decision::Accept),
            2 => Some(Decision::Reject),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Accept => "accept",
            Decision::Reject => "reject",
        }
    }
}

/// Who a decision belongs to: a registered account or an anonymous
/// client-generated session.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Identity {
    Account(usize),
    Session(String),
}

impl Identity {
    /// Resolves the identity of a request. The account wins when both are
    /// present. Browser clients send `"undefined"` or `"null"` when they have no
    /// session id, those count as absent.
    pub fn resolve(account_id: Option<usize>, session_token: Option<&str>) -> Option<Identity> {
        if let Some(user_id) = account_id {
            return Some(Identity::Account(user_id));
        }
        session_token
            .map(str::trim)
            .filter(|token| !token.is_empty() && *token != "undefined" && *token != "null")
            .map(|token| Identity::Session(token.to_string()))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMetadata {
    pub title: Option<String>,
    pub artist_name: Option<String>,
    pub cover_art_url: Option<String>,
    pub preview_url: Option<String>,
}

fn normalize_field(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl DisplayMetadata {
    /// Trims every field, empty strings become absent.
    pub fn normalized(self) -> DisplayMetadata {
        DisplayMetadata {
            title: normalize_field(self.title),
            artist_name: normalize_field(self.artist_name),
            cover_art_url: normalize_field(self.cover_art_url),
            preview_url: normalize_field(self.preview_url),
        }
    }

    /// Records written before display metadata was captured have no title.
    pub fn is_legacy(&self) -> bool {
        self.title.is_none()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DecisionRecord {
    pub id: usize,
    pub identity: Identity,
    pub item_id: ItemId,
    pub decision: Decision,
    pub genre_id: Option<GenreId>,
    pub metadata: DisplayMetadata,
    /// Unix seconds.
    pub created_at: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewDecision {
    pub identity: Identity,
    pub item_id: ItemId,
    pub decision: Decision,
    pub genre_id: Option<GenreId>,
    pub metadata: DisplayMetadata,
}

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikedItem {
    pub id: ItemId,
    pub title: String,
    pub artist_name: String,
    pub cover_art_url: Option<String>,
    pub preview_url: String,
    pub liked_at: i64,
}

impl LikedItem {
    /// Returns None for legacy records.
    pub fn from_record(record: &DecisionRecord) -> Option<LikedItem> {
        let title = record.metadata.title.clone()?;
        Some(LikedItem {
            id: record.item_id,
            title,
            artist_name: record
                .metadata
                .artist_name
                .clone()
                .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            cover_art_url: record.metadata.cover_art_url.clone(),
            preview_url: record.metadata.preview_url.clone().unwrap_or_default(),
            liked_at: record.created_at,
        })
    }
}
