//! Submission pipeline.
//!
//! [`StoryService`] runs each submission through validate -> commit -> relay and serves story
//! retrieval. It is stateless per request; all durable state lives in the [`StoryStore`]. The
//! relay always runs after the store commit has returned, so a slow or failing send can neither
//! hold the store lock nor undo the commit.

use crate::clock::Clock;
use crate::config::{CoreConfig, RelayFailurePolicy};
use crate::relay::EventRelay;
use crate::store::{AuthorRecord, StoryDocument, StoryStore};
use crate::validation::validate_contribution;
use crate::{StoryError, StoryResult};
use chrono::NaiveDate;
use std::sync::Arc;

/// Outcome of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Full story text right after the commit.
    pub story: String,
    /// Set when the relay failed under [`RelayFailurePolicy::Warn`].
    pub relay_warning: Option<String>,
}

/// Orchestrates validation, storage and relay for contributions.
#[derive(Clone, Debug)]
pub struct StoryService {
    cfg: Arc<CoreConfig>,
    store: Arc<StoryStore>,
    relay: Arc<EventRelay>,
    clock: Arc<dyn Clock>,
}

impl StoryService {
    /// Creates a service from an opened store and a bound relay.
    pub fn new(
        cfg: Arc<CoreConfig>,
        store: Arc<StoryStore>,
        relay: Arc<EventRelay>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cfg,
            store,
            relay,
            clock,
        }
    }

    /// The date whose document is currently active.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Validates a contribution, commits it to today's story and relays it.
    ///
    /// # Arguments
    ///
    /// * `raw_word` - Submitted word(s), 1 to 4 tokens.
    /// * `raw_name` - Submitted display name.
    /// * `raw_color` - Client-chosen colour.
    ///
    /// # Returns
    ///
    /// The committed story text, plus a relay warning if the send failed and the policy is
    /// [`RelayFailurePolicy::Warn`].
    ///
    /// # Errors
    ///
    /// - `StoryError::Validation` if the submission is rejected; nothing is stored or sent.
    /// - `StoryError::FileRead` / `StoryError::FileWrite` if the commit fails; nothing is sent.
    /// - `StoryError::RelayFailed` if the send failed under [`RelayFailurePolicy::Fail`]. The
    ///   contribution stays committed and the error carries the committed story.
    pub async fn submit(
        &self,
        raw_word: &str,
        raw_name: &str,
        raw_color: &str,
    ) -> StoryResult<Submission> {
        let contribution =
            match validate_contribution(raw_word, raw_name, raw_color, self.cfg.name_policy()) {
                Ok(c) => c,
                Err(e) => {
                    tracing::info!("rejected contribution: {}", e);
                    return Err(e.into());
                }
            };

        let date = self.today();
        let document = self
            .store
            .append(date, &contribution.words, &contribution.name)?;
        tracing::info!(
            "accepted {} word(s) '{}' from '{}' for {}",
            contribution.word_count(),
            contribution.words,
            contribution.name,
            date
        );

        let story = document.full_text().to_string();
        match self.relay.notify(&contribution, &document).await {
            Ok(()) => Ok(Submission {
                story,
                relay_warning: None,
            }),
            Err(e) => {
                tracing::warn!("relay to {} failed: {}", self.relay.target(), e);
                match self.cfg.relay_failure_policy() {
                    RelayFailurePolicy::Warn => Ok(Submission {
                        story,
                        relay_warning: Some(e.to_string()),
                    }),
                    RelayFailurePolicy::Fail => Err(StoryError::RelayFailed {
                        story,
                        source: Box::new(e),
                    }),
                }
            }
        }
    }

    /// Trimmed text of today's story, created and seeded on first access.
    pub fn current_story(&self) -> StoryResult<String> {
        self.store.full_text(self.today())
    }

    pub fn current_document(&self) -> StoryResult<StoryDocument> {
        self.store.current_document(self.today())
    }

    pub fn current_authors(&self) -> StoryResult<AuthorRecord> {
        self.store.authors(self.today())
    }

    /// Story for an explicit date. `None` if nothing is on record for that date.
    ///
    /// Today's document is created lazily as usual; other dates are only read.
    pub fn story_on(&self, date: NaiveDate) -> StoryResult<Option<String>> {
        if date == self.today() {
            return self.current_story().map(Some);
        }
        Ok(self
            .store
            .document_on(date)?
            .map(|doc| doc.full_text().to_string()))
    }

    pub fn authors_on(&self, date: NaiveDate) -> StoryResult<Option<AuthorRecord>> {
        if date == self.today() {
            return self.current_authors().map(Some);
        }
        self.store.authors_on(date)
    }

    /// Sends the diagnostic ping through the relay.
    pub async fn ping(&self) -> StoryResult<()> {
        self.relay.ping().await.inspect_err(|e| {
            tracing::warn!("ping to {} failed: {}", self.relay.target(), e);
        })
    }
}
