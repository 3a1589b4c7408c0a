//! Shared constants used across the application.

/// Page size used when the caller passes no usable `limit`.
pub const DEFAULT_PAGE_SIZE: i64 = 15;

/// Hard cap on the number of feed items returned per request.
pub const MAX_PAGE_SIZE: i64 = 50;

/// Maximum length, in characters, of a projected excerpt.
pub const EXCERPT_MAX_CHARS: usize = 120;

/// Characters of raw post body pulled from the database per row.
pub const RAW_EXCERPT_CHARS: i64 = 300;

/// Pixel size variant used for synthesized letter avatars.
pub const LETTER_AVATAR_SIZE: u32 = 45;
