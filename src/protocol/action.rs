//! Action definitions
//!
//! The fixed set of operations the store understands.

use std::fmt;
use std::str::FromStr;

use crate::error::FlatError;

/// Operation discriminator carried in the `action` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Add,
    Replace,
    Set,
    Touch,
    Exists,
    Increment,
    Decrement,
    Delete,
    Get,
    AdvancedGet,
    FirstGet,
    MultiGet,
    Insert,
}

impl Action {
    pub const ALL: [Action; 13] = [
        Action::Add,
        Action::Replace,
        Action::Set,
        Action::Touch,
        Action::Exists,
        Action::Increment,
        Action::Decrement,
        Action::Delete,
        Action::Get,
        Action::AdvancedGet,
        Action::FirstGet,
        Action::MultiGet,
        Action::Insert,
    ];

    /// Wire name of the action
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Add => "mc-add",
            Action::Replace => "mc-rep",
            Action::Set => "mc-set",
            Action::Touch => "mc-touch",
            Action::Exists => "mc-exists",
            Action::Increment => "mc-inc",
            Action::Decrement => "mc-dec",
            Action::Delete => "mc-del",
            Action::Get => "mc-get",
            Action::AdvancedGet => "mca-get",
            Action::FirstGet => "mca-fget",
            Action::MultiGet => "mca-mget",
            Action::Insert => "mca-insert",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = FlatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| FlatError::Protocol(format!("unknown action {:?}", s)))
    }
}
