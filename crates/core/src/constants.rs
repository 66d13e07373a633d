//! Constants used throughout the story core crate.
//!
//! This module contains the file naming, contribution limits and seed data so that
//! they stay consistent across the store, validator and relay.

/// Default directory for story storage when no explicit directory is configured.
pub const DEFAULT_STORY_DATA_DIR: &str = "story_data";

/// Filename prefix for per-date story documents (`story-YYYY-MM-DD.txt`).
pub const STORY_FILE_PREFIX: &str = "story-";

/// Filename prefix for per-date author ledgers (`authors-YYYY-MM-DD.txt`).
pub const AUTHORS_FILE_PREFIX: &str = "authors-";

/// Extension shared by story documents and author ledgers.
pub const STORE_FILE_EXTENSION: &str = "txt";

/// Date format used in filenames and on the HTTP boundary.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Maximum number of word tokens in one contribution.
pub const MAX_WORD_TOKENS: usize = 4;

/// Maximum number of name tokens when the name policy is enforced.
pub const MAX_NAME_TOKENS: usize = 3;

/// Colours offered by the input UI. The first entry is used when a client sends none.
pub const COLOR_PALETTE: [&str; 4] = [
    "(247,197,251)", // pink
    "(30,86,195)",   // blue
    "(126,62,45)",   // brown
    "(209,230,209)", // mint
];

/// Recurring opening phrase used on several weekdays.
pub const RECURRING_OPENING_LINE: &str = "Once upon a time in a distant galaxy...";

/// Default opening lines, indexed by weekday with Sunday at 0.
pub const DEFAULT_OPENING_LINES: [&str; 7] = [
    RECURRING_OPENING_LINE,
    "It was a dark and stormy night, and",
    RECURRING_OPENING_LINE,
    "Nobody in the village expected the parade to",
    "The last train of the evening carried",
    "On the roof of the tallest building in town,",
    RECURRING_OPENING_LINE,
];

/// Message type tag for contribution notifications.
pub const RELAY_STORY_WORD_TYPE: &str = "story_word";

/// Message type tag for diagnostic pings.
pub const RELAY_DEBUG_PING_TYPE: &str = "debug_ping";

/// Body of the diagnostic ping.
pub const RELAY_PING_MESSAGE: &str = "Hello from the story service!";
