//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.
//!
//! Deployments of the story service have disagreed on three behaviours, so each is an explicit
//! setting here rather than a hardcoded rule:
//! - whether author name length is enforced ([`NamePolicy`]),
//! - how contributions are joined in the story file ([`Separator`]),
//! - whether a relay failure fails the request ([`RelayFailurePolicy`]).

use crate::constants::DEFAULT_OPENING_LINES;
use crate::{StoryError, StoryResult};
use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Whether the author name token limit rejects a contribution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NamePolicy {
    /// Reject names longer than the token limit.
    #[default]
    Enforced,
    /// Accept any name length.
    Advisory,
}

impl FromStr for NamePolicy {
    type Err = StoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enforced" | "enforce" | "true" => Ok(Self::Enforced),
            "advisory" | "off" | "false" => Ok(Self::Advisory),
            other => Err(StoryError::InvalidInput(format!(
                "unknown name policy '{other}' (expected 'enforced' or 'advisory')"
            ))),
        }
    }
}

/// Text placed between consecutive contributions in a story document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Separator {
    /// A single space.
    #[default]
    Space,
    /// A comma followed by a newline, one contribution per line.
    CommaNewline,
}

impl Separator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Separator::Space => " ",
            Separator::CommaNewline => ",\n",
        }
    }
}

impl FromStr for Separator {
    type Err = StoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "space" => Ok(Self::Space),
            "comma-newline" | "comma_newline" | "comma" => Ok(Self::CommaNewline),
            other => Err(StoryError::InvalidInput(format!(
                "unknown separator '{other}' (expected 'space' or 'comma-newline')"
            ))),
        }
    }
}

/// What a relay failure means for the submission that triggered it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RelayFailurePolicy {
    /// Report the failure alongside a successful submission.
    #[default]
    Warn,
    /// Fail the request. The committed contribution is kept.
    Fail,
}

impl FromStr for RelayFailurePolicy {
    type Err = StoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" | "warning" => Ok(Self::Warn),
            "fail" | "error" => Ok(Self::Fail),
            other => Err(StoryError::InvalidInput(format!(
                "unknown relay failure policy '{other}' (expected 'warn' or 'fail')"
            ))),
        }
    }
}

/// Seed text for each weekday, Sunday first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpeningLines([String; 7]);

impl OpeningLines {
    /// Builds the table from exactly seven lines.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::InvalidInput` if there are not seven lines, or if any line is
    /// empty or contains a newline (the first line of a story file is its opening line).
    pub fn new(lines: Vec<String>) -> StoryResult<Self> {
        let lines: [String; 7] = lines.try_into().map_err(|lines: Vec<String>| {
            StoryError::InvalidInput(format!(
                "expected 7 opening lines (Sunday first), got {}",
                lines.len()
            ))
        })?;

        for line in &lines {
            if line.trim().is_empty() {
                return Err(StoryError::InvalidInput(
                    "opening lines cannot be empty".into(),
                ));
            }
            if line.contains('\n') || line.contains('\r') {
                return Err(StoryError::InvalidInput(
                    "opening lines cannot contain line breaks".into(),
                ));
            }
        }

        Ok(Self(lines.map(|l| l.trim().to_string())))
    }

    /// Reads the table from a file with one opening line per line. Blank lines are skipped.
    pub fn load(path: &Path) -> StoryResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(StoryError::FileRead)?;
        Self::new(
            contents
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Opening line for the weekday of `date`.
    pub fn for_date(&self, date: NaiveDate) -> &str {
        &self.0[date.weekday().num_days_from_sunday() as usize]
    }
}

impl Default for OpeningLines {
    fn default() -> Self {
        Self(DEFAULT_OPENING_LINES.map(str::to_string))
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    story_data_dir: PathBuf,
    name_policy: NamePolicy,
    separator: Separator,
    relay_failure_policy: RelayFailurePolicy,
    relay_include_story: bool,
    opening_lines: OpeningLines,
}

impl CoreConfig {
    /// Create a new `CoreConfig` with default policies for the given storage directory.
    pub fn new(story_data_dir: PathBuf) -> StoryResult<Self> {
        if story_data_dir.as_os_str().is_empty() {
            return Err(StoryError::InvalidInput(
                "story_data_dir cannot be empty".into(),
            ));
        }

        Ok(Self {
            story_data_dir,
            name_policy: NamePolicy::default(),
            separator: Separator::default(),
            relay_failure_policy: RelayFailurePolicy::default(),
            relay_include_story: true,
            opening_lines: OpeningLines::default(),
        })
    }

    pub fn with_name_policy(mut self, name_policy: NamePolicy) -> Self {
        self.name_policy = name_policy;
        self
    }

    pub fn with_separator(mut self, separator: Separator) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_relay_failure_policy(mut self, policy: RelayFailurePolicy) -> Self {
        self.relay_failure_policy = policy;
        self
    }

    pub fn with_relay_include_story(mut self, include: bool) -> Self {
        self.relay_include_story = include;
        self
    }

    pub fn with_opening_lines(mut self, opening_lines: OpeningLines) -> Self {
        self.opening_lines = opening_lines;
        self
    }

    pub fn story_data_dir(&self) -> &Path {
        &self.story_data_dir
    }

    pub fn name_policy(&self) -> NamePolicy {
        self.name_policy
    }

    pub fn separator(&self) -> Separator {
        self.separator
    }

    pub fn relay_failure_policy(&self) -> RelayFailurePolicy {
        self.relay_failure_policy
    }

    pub fn relay_include_story(&self) -> bool {
        self.relay_include_story
    }

    pub fn opening_lines(&self) -> &OpeningLines {
        &self.opening_lines
    }
}

impl fmt::Display for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Separator::Space => write!(f, "space"),
            Separator::CommaNewline => write!(f, "comma-newline"),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a setting from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns `T::default()`.
pub fn setting_from_env_value<T>(value: Option<String>) -> StoryResult<T>
where
    T: FromStr<Err = StoryError> + Default,
{
    Ok(non_empty(value)
        .map(|v| v.parse::<T>())
        .transpose()?
        .unwrap_or_default())
}

/// Parse a boolean flag from an optional string value, falling back to `default`.
pub fn flag_from_env_value(value: Option<String>, default: bool) -> StoryResult<bool> {
    match non_empty(value).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(StoryError::InvalidInput(format!(
                "invalid boolean flag '{other}'"
            ))),
        },
    }
}

/// Resolve the opening line table from an optional file path.
pub fn opening_lines_from_env_value(value: Option<String>) -> StoryResult<OpeningLines> {
    match non_empty(value) {
        Some(path) => OpeningLines::load(Path::new(&path)),
        None => Ok(OpeningLines::default()),
    }
}
