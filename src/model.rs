//! Plain value types for trackers, categories and completion records.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::AppError;

/// Title of the synthetic category that holds pinned trackers.
pub const PINNED_CATEGORY: &str = "Pinned";

pub const MAX_NAME_CHARS: usize = 38;

pub const DEFAULT_NAME: &str = "default";
pub const DEFAULT_EMOJI: &str = "🫡";

pub const EMOJI_PALETTE: [&str; 18] = [
    "🙂", "😻", "🌺", "🐶", "❤", "😱", "😇", "😡", "🥶", "🤔", "🙌", "🍔", "🥦", "🏓", "🥇", "🎸",
    "🏝", "😪",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WeekDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl WeekDay {
    pub const ALL: [WeekDay; 7] = [
        WeekDay::Monday,
        WeekDay::Tuesday,
        WeekDay::Wednesday,
        WeekDay::Thursday,
        WeekDay::Friday,
        WeekDay::Saturday,
        WeekDay::Sunday,
    ];

    /// Monday-first, zero based.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            WeekDay::Monday => "Monday",
            WeekDay::Tuesday => "Tuesday",
            WeekDay::Wednesday => "Wednesday",
            WeekDay::Thursday => "Thursday",
            WeekDay::Friday => "Friday",
            WeekDay::Saturday => "Saturday",
            WeekDay::Sunday => "Sunday",
        }
    }

    /// Exact match on the stored form produced by [`WeekDay::name`].
    pub fn from_stored(name: &str) -> Option<WeekDay> {
        WeekDay::ALL.into_iter().find(|day| day.name() == name)
    }

    pub fn short_name(self) -> &'static str {
        match self {
            WeekDay::Monday => "Mo",
            WeekDay::Tuesday => "Tu",
            WeekDay::Wednesday => "We",
            WeekDay::Thursday => "Th",
            WeekDay::Friday => "Fr",
            WeekDay::Saturday => "Sa",
            WeekDay::Sunday => "Su",
        }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self::from(date.weekday())
    }
}

impl From<chrono::Weekday> for WeekDay {
    fn from(day: chrono::Weekday) -> Self {
        // chrono numbers Monday as 0 as well.
        Self::ALL[day.num_days_from_monday() as usize]
    }
}

impl fmt::Display for WeekDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown weekday: {0}")]
pub struct UnknownWeekDay(pub String);

impl FromStr for WeekDay {
    type Err = UnknownWeekDay;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        WeekDay::ALL
            .into_iter()
            .find(|day| {
                day.name().eq_ignore_ascii_case(trimmed)
                    || day.short_name().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| UnknownWeekDay(s.to_string()))
    }
}

/// Semantic color tokens; the stored form is the snake_case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerColor {
    Red,
    #[default]
    Orange,
    Blue,
    Violet,
    Green,
    Orchid,
    Blush,
    SkyBlue,
    Mint,
    Indigo,
    Coral,
    Rose,
    Sand,
    Periwinkle,
    Purple,
    Lilac,
    Lavender,
    Emerald,
}

impl TrackerColor {
    pub const PALETTE: [TrackerColor; 18] = [
        TrackerColor::Red,
        TrackerColor::Orange,
        TrackerColor::Blue,
        TrackerColor::Violet,
        TrackerColor::Green,
        TrackerColor::Orchid,
        TrackerColor::Blush,
        TrackerColor::SkyBlue,
        TrackerColor::Mint,
        TrackerColor::Indigo,
        TrackerColor::Coral,
        TrackerColor::Rose,
        TrackerColor::Sand,
        TrackerColor::Periwinkle,
        TrackerColor::Purple,
        TrackerColor::Lilac,
        TrackerColor::Lavender,
        TrackerColor::Emerald,
    ];

    pub fn token(self) -> &'static str {
        match self {
            TrackerColor::Red => "red",
            TrackerColor::Orange => "orange",
            TrackerColor::Blue => "blue",
            TrackerColor::Violet => "violet",
            TrackerColor::Green => "green",
            TrackerColor::Orchid => "orchid",
            TrackerColor::Blush => "blush",
            TrackerColor::SkyBlue => "sky_blue",
            TrackerColor::Mint => "mint",
            TrackerColor::Indigo => "indigo",
            TrackerColor::Coral => "coral",
            TrackerColor::Rose => "rose",
            TrackerColor::Sand => "sand",
            TrackerColor::Periwinkle => "periwinkle",
            TrackerColor::Purple => "purple",
            TrackerColor::Lilac => "lilac",
            TrackerColor::Lavender => "lavender",
            TrackerColor::Emerald => "emerald",
        }
    }

    pub fn hex(self) -> &'static str {
        match self {
            TrackerColor::Red => "#FD4C49",
            TrackerColor::Orange => "#FF881E",
            TrackerColor::Blue => "#007BFA",
            TrackerColor::Violet => "#6E44FE",
            TrackerColor::Green => "#33CF69",
            TrackerColor::Orchid => "#E66DD4",
            TrackerColor::Blush => "#F9D4D4",
            TrackerColor::SkyBlue => "#34A7FE",
            TrackerColor::Mint => "#46E69D",
            TrackerColor::Indigo => "#35347C",
            TrackerColor::Coral => "#FF674D",
            TrackerColor::Rose => "#FF99CC",
            TrackerColor::Sand => "#F6C48B",
            TrackerColor::Periwinkle => "#7994F5",
            TrackerColor::Purple => "#832CF1",
            TrackerColor::Lilac => "#AD56DA",
            TrackerColor::Lavender => "#8D72E6",
            TrackerColor::Emerald => "#2FD058",
        }
    }
}

impl fmt::Display for TrackerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown color token: {0}")]
pub struct UnknownColor(pub String);

impl FromStr for TrackerColor {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrackerColor::PALETTE
            .into_iter()
            .find(|color| color.token() == s || color.hex().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownColor(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerKind {
    /// Recurs on the weekdays of its schedule.
    Habit,
    /// One-off; removed after its first completion.
    Event,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracker {
    pub id: Uuid,
    pub name: String,
    pub color: TrackerColor,
    pub emoji: String,
    #[serde(default)]
    pub schedule: BTreeSet<WeekDay>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerValidationError {
    #[error("tracker name is empty")]
    EmptyName,
    #[error("tracker name exceeds 38 characters")]
    NameTooLong,
    #[error("emoji {0:?} is not in the palette")]
    UnknownEmoji(String),
}

impl From<TrackerValidationError> for AppError {
    fn from(error: TrackerValidationError) -> Self {
        let code = match error {
            TrackerValidationError::EmptyName => "VALIDATION/EMPTY_NAME",
            TrackerValidationError::NameTooLong => "VALIDATION/NAME_TOO_LONG",
            TrackerValidationError::UnknownEmoji(_) => "VALIDATION/UNKNOWN_EMOJI",
        };
        AppError::new(code, error.to_string())
    }
}

impl Tracker {
    /// A new tracker with a fresh id.
    pub fn new(
        name: impl Into<String>,
        color: TrackerColor,
        emoji: impl Into<String>,
        schedule: impl IntoIterator<Item = WeekDay>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            color,
            emoji: emoji.into(),
            schedule: schedule.into_iter().collect(),
        }
    }

    pub fn kind(&self) -> TrackerKind {
        if self.schedule.is_empty() {
            TrackerKind::Event
        } else {
            TrackerKind::Habit
        }
    }

    /// Whether the tracker shows up on the given weekday: events always do,
    /// habits only on the days of their schedule.
    pub fn is_scheduled_on(&self, day: WeekDay) -> bool {
        self.schedule.is_empty() || self.schedule.contains(&day)
    }

    /// Short names joined for display, e.g. "Mo, We". `None` for events.
    pub fn schedule_summary(&self) -> Option<String> {
        if self.schedule.len() == WeekDay::ALL.len() {
            return Some("Every day".to_string());
        }
        if self.schedule.is_empty() {
            return None;
        }
        let names: Vec<&str> = self.schedule.iter().map(|day| day.short_name()).collect();
        Some(names.join(", "))
    }

    pub fn validate(&self) -> Result<(), TrackerValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(TrackerValidationError::EmptyName);
        }
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(TrackerValidationError::NameTooLong);
        }
        if !EMOJI_PALETTE.contains(&self.emoji.as_str()) {
            return Err(TrackerValidationError::UnknownEmoji(self.emoji.clone()));
        }
        Ok(())
    }

    pub(crate) fn name_matches(&self, needle_lowercase: &str) -> bool {
        self.name.to_lowercase().contains(needle_lowercase)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerCategory {
    pub title: String,
    pub trackers: Vec<Tracker>,
}

impl TrackerCategory {
    pub fn new(title: impl Into<String>, trackers: Vec<Tracker>) -> Self {
        Self {
            title: title.into(),
            trackers,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.title == PINNED_CATEGORY
    }
}

/// One completion of a tracker on a calendar day. `(id, date)` is unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackerRecord {
    pub id: Uuid,
    pub date: NaiveDate,
}
