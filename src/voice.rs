//! Narration voices.
//!
//! Single source of truth for the voices the speech renderer accepts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Supported narration voices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    #[default]
    Bella,
    Antoni,
    Arnold,
    Jesse,
    Domi,
    Elli,
    Josh,
    Rachel,
    Sam,
}

impl Voice {
    /// All available voices, in presentation order
    pub const ALL: &'static [Voice] = &[
        Voice::Bella,
        Voice::Antoni,
        Voice::Arnold,
        Voice::Jesse,
        Voice::Domi,
        Voice::Elli,
        Voice::Josh,
        Voice::Rachel,
        Voice::Sam,
    ];

    /// Voice name as shown to users
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bella => "Bella",
            Self::Antoni => "Antoni",
            Self::Arnold => "Arnold",
            Self::Jesse => "Jesse",
            Self::Domi => "Domi",
            Self::Elli => "Elli",
            Self::Josh => "Josh",
            Self::Rachel => "Rachel",
            Self::Sam => "Sam",
        }
    }

    /// Identifier of the premade voice at the speech vendor
    pub const fn vendor_id(&self) -> &'static str {
        match self {
            Self::Bella => "EXAVITQu4vr4xnSDxMaL",
            Self::Antoni => "ErXwobaYiN019PkySvjV",
            Self::Arnold => "VR6AewLTigWG4xSOukaG",
            Self::Jesse => "t0jbNlBVZ17f02VDIeMI",
            Self::Domi => "AZnzlk1XvdvUeBnXmlld",
            Self::Elli => "MF3mGyEYCl7XYWbV9V6O",
            Self::Josh => "TxGEqnHWrfWFTfGW9XjX",
            Self::Rachel => "21m00Tcm4TlvDq8ikWAM",
            Self::Sam => "yoZ06aMxZJJ28mfd3POQ",
        }
    }

    /// Get all voice names as strings
    pub fn all_names() -> Vec<&'static str> {
        Self::ALL.iter().map(Self::name).collect()
    }
}

impl FromStr for Voice {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .find(|v| v.name().eq_ignore_ascii_case(trimmed))
            .copied()
            .ok_or_else(|| ValidationError::UnknownVoice(s.to_string()))
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
