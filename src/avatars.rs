//! Avatar URL resolution.
//!
//! Authors with an uploaded avatar resolve through an [`UploadPathResolver`];
//! everyone else gets a deterministic letter avatar synthesized from their
//! username.

use sha2::{Digest, Sha256};

use crate::constants::LETTER_AVATAR_SIZE;

/// Resolves an uploaded-avatar reference to a servable URL path.
///
/// Media storage belongs to the host forum; the feed only needs the mapping
/// from upload id to path.
pub trait UploadPathResolver: Send + Sync {
    fn path_for_upload(&self, upload_id: i64) -> String;
}

/// Resolver for avatars served from a local uploads directory.
#[derive(Debug, Clone)]
pub struct LocalUploadStore {
    base_path: String,
}

impl LocalUploadStore {
    #[must_use]
    pub fn new(base_path: &str) -> Self {
        Self {
            base_path: base_path.trim_end_matches('/').to_string(),
        }
    }
}

impl UploadPathResolver for LocalUploadStore {
    fn path_for_upload(&self, upload_id: i64) -> String {
        format!("{}/{upload_id}.png", self.base_path)
    }
}

/// Background colors for letter avatars, as hex RGB.
const LETTER_AVATAR_COLORS: &[&str] = &[
    "ac8f60", "b4478a", "c34b9d", "ce7b6c", "d26911", "d75e58", "da6149", "e47755", "e68b4e",
    "ee7513", "f05b48", "f68348", "35a2eb", "3d9970", "468c4f", "56a2d1", "5e9ca3", "6bbea6",
    "7ba352", "85ae63",
];

/// Pick a letter-avatar color for a username.
///
/// Deterministic: the same username always maps to the same color, matching
/// how the forum assigns placeholder avatar colors.
#[must_use]
pub fn color_from_username(username: &str) -> &'static str {
    let digest = Sha256::digest(username.to_lowercase().as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let index = u64::from_be_bytes(prefix) % LETTER_AVATAR_COLORS.len() as u64;
    LETTER_AVATAR_COLORS[index as usize]
}

/// Synthesize the letter-avatar URL path for a username.
///
/// Uses the uppercased first character of the username and its assigned
/// color, at the fixed feed size variant.
#[must_use]
pub fn letter_avatar_url(username: &str) -> String {
    let first = username
        .chars()
        .next()
        .map_or_else(|| "?".to_string(), |c| c.to_uppercase().to_string());
    let color = color_from_username(username);
    format!("/letter_avatar_proxy/v4/letter/{first}/{color}/{LETTER_AVATAR_SIZE}.png")
}
