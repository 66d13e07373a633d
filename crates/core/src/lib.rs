//! # Story Core
//!
//! Core logic for the collaborative story service.
//!
//! This crate contains the story state and the event relay:
//! - Contribution validation and normalisation
//! - Per-date, append-only story documents and author ledgers on the filesystem
//! - Best-effort UDP notifications to a visualisation consumer
//! - The submission pipeline tying them together
//!
//! **No API concerns**: HTTP servers and wire types belong in `api-rest` and `api-shared`.

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod relay;
pub mod service;
pub mod store;
pub mod validation;

pub use clock::{parse_date, Clock, FixedClock, SystemClock};
pub use config::{CoreConfig, NamePolicy, OpeningLines, RelayFailurePolicy, Separator};
pub use constants::DEFAULT_STORY_DATA_DIR;
pub use error::{StoryError, StoryResult};
pub use relay::EventRelay;
pub use service::{StoryService, Submission};
pub use store::{AuthorRecord, StoryDocument, StoryStore};
pub use validation::{validate_contribution, Contribution, ValidationError};
