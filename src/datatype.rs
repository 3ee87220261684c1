// used for persistence
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

// used for timestamps in the database
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};

// used when records are exported
use serde::{Deserialize, Serialize};

use core::hash::BuildHasherDefault;
use seahash::SeaHasher;

// used when parsing a difficulty code
use std::str::FromStr;
// used to print out readable forms of a data type
use std::fmt;

use crate::error::{QuizError, Result};

// ------------- Identity -------------
pub type Identity = u64;

pub type IdentityHasher = BuildHasherDefault<SeaHasher>;

const GENESIS: Identity = 0;

/// Hands out identities for one model, in the manner of an auto-increment
/// primary key. Identities are never handed out twice, not even after the
/// record holding one has been deleted.
#[derive(Debug)]
pub struct IdentityGenerator {
    lower_bound: Identity,
}

impl IdentityGenerator {
    pub fn new() -> Self {
        Self {
            lower_bound: GENESIS,
        }
    }
    // Restored identities push the lower bound up so that
    // newly generated ones continue after them.
    pub fn retain(&mut self, identity: Identity) {
        if identity > self.lower_bound {
            self.lower_bound = identity;
        }
    }
    /// The identity the next successful insert will occupy. Nothing is
    /// consumed until it is retained.
    pub fn next(&self) -> Identity {
        self.lower_bound + 1
    }
}

impl Default for IdentityGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ------------- Difficulty -------------
#[derive(Eq, PartialEq, PartialOrd, Ord, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
pub enum Difficulty {
    #[serde(rename = "B")]
    Beginner,
    #[serde(rename = "I")]
    Intermediate,
    #[serde(rename = "A")]
    Advanced,
}

impl Difficulty {
    /// Persisted code and display label for every permitted difficulty.
    pub const CHOICES: &'static [(&'static str, &'static str)] = &[
        ("B", "Beginner"),
        ("I", "Intermediate"),
        ("A", "Advanced"),
    ];
    pub fn code(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "B",
            Difficulty::Intermediate => "I",
            Difficulty::Advanced => "A",
        }
    }
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        }
    }
}
impl FromStr for Difficulty {
    type Err = QuizError;
    fn from_str(code: &str) -> Result<Difficulty> {
        match code {
            "B" => Ok(Difficulty::Beginner),
            "I" => Ok(Difficulty::Intermediate),
            "A" => Ok(Difficulty::Advanced),
            other => Err(QuizError::validation(
                "difficulty",
                format!("'{}' is not one of B, I or A", other),
            )),
        }
    }
}
impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
impl ToSql for Difficulty {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}
impl FromSql for Difficulty {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse::<Difficulty>()
            .map_err(|e: QuizError| FromSqlError::Other(Box::new(e)))
    }
}

// ------------- Stamp -------------

/// The current time at the precision timestamps are kept in.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Creation and modification times of a record. `created` is fixed once the
/// stamp exists; every refresh yields a strictly later `updated`.
#[derive(Eq, PartialEq, Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Stamp {
    pub(crate) created: DateTime<Utc>,
    pub(crate) updated: DateTime<Utc>,
}

impl Stamp {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            created: at,
            updated: at,
        }
    }
    pub(crate) fn restore(created: DateTime<Utc>, updated: DateTime<Utc>) -> Self {
        Self { created, updated }
    }
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }
    pub fn updated(&self) -> DateTime<Utc> {
        self.updated
    }
    // A clock that stalls or steps backwards still moves `updated` forward.
    pub fn refreshed(&self, at: DateTime<Utc>) -> Self {
        let floor = self.updated + TimeDelta::microseconds(1);
        Self {
            created: self.created,
            updated: if at < floor { floor } else { at },
        }
    }
}

// ------------- Fields -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Identity,
    Text { max_length: Option<usize> },
    Choice { choices: &'static [(&'static str, &'static str)] },
    Boolean { default: bool },
    ForeignKey { to: &'static str },
    CreatedAt,
    UpdatedAt,
}

/// Static description of one persisted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub verbose_name: &'static str,
    pub kind: FieldKind,
}

impl Field {
    pub const fn new(name: &'static str, verbose_name: &'static str, kind: FieldKind) -> Self {
        Self { name, verbose_name, kind }
    }
    pub fn max_length(&self) -> Option<usize> {
        match self.kind {
            FieldKind::Text { max_length } => max_length,
            FieldKind::Choice { .. } => Some(1),
            _ => None,
        }
    }
    /// Checks a required text value against this field. Length is counted in
    /// characters.
    pub fn check_text<'t>(&self, value: &'t str) -> Result<&'t str> {
        if value.trim().is_empty() {
            return Err(QuizError::validation(self.name, "this field is required"));
        }
        if let Some(max_length) = self.max_length() {
            let length = value.chars().count();
            if length > max_length {
                return Err(QuizError::validation(
                    self.name,
                    format!(
                        "ensure this value has at most {} characters (it has {})",
                        max_length, length
                    ),
                ));
            }
        }
        Ok(value)
    }
}
impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            FieldKind::Identity => write!(f, "{}: identity", self.name),
            FieldKind::Text { max_length: Some(n) } => write!(f, "{}: text({})", self.name, n),
            FieldKind::Text { max_length: None } => write!(f, "{}: text", self.name),
            FieldKind::Choice { choices } => {
                let codes: Vec<&str> = choices.iter().map(|(code, _)| *code).collect();
                write!(f, "{}: choice({})", self.name, codes.join("|"))
            }
            FieldKind::Boolean { default } => write!(f, "{}: boolean = {}", self.name, default),
            FieldKind::ForeignKey { to } => write!(f, "{} -> {} (cascade)", self.name, to),
            FieldKind::CreatedAt => write!(f, "{}: timestamp, set on create", self.name),
            FieldKind::UpdatedAt => write!(f, "{}: timestamp, set on save", self.name),
        }
    }
}
