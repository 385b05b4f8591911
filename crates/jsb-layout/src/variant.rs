//! Known `.jsb` file variants.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use jsb_common::memchr::memmem;
use serde::{Deserialize, Serialize};

use crate::Error;

/// One of the three `.jsb` configuration files the codec knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileVariant {
    /// `physics/physical_constraints.jsb` - movement and timing constants.
    PhysicalConstraints,
    /// `weights.jsb` - squad-selection weights.
    Weights,
    /// `player_ratings_data.jsb` - match rating parameters.
    PlayerRatings,
}

impl FileVariant {
    /// All variants in order.
    pub const fn all() -> [FileVariant; 3] {
        [
            FileVariant::PhysicalConstraints,
            FileVariant::Weights,
            FileVariant::PlayerRatings,
        ]
    }

    /// Name used in layout files and on the command line.
    pub const fn name(&self) -> &'static str {
        match self {
            FileVariant::PhysicalConstraints => "physical_constraints",
            FileVariant::Weights => "weights",
            FileVariant::PlayerRatings => "player_ratings",
        }
    }

    /// File stem the game ships the variant under.
    pub const fn file_stem(&self) -> &'static str {
        match self {
            FileVariant::PhysicalConstraints => "physical_constraints",
            FileVariant::Weights => "weights",
            FileVariant::PlayerRatings => "player_ratings_data",
        }
    }

    /// A key that only occurs in this variant.
    const fn signature(&self) -> &'static [u8] {
        match self {
            FileVariant::PhysicalConstraints => b"theoretical_max_acceleration",
            FileVariant::Weights => b"TEAM_PICKING_STYLE::",
            FileVariant::PlayerRatings => b"role_lookup_data",
        }
    }

    /// Guess the variant from a file name such as `weights.jsb`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let stem = path.as_ref().file_stem()?.to_str()?;
        Self::all().into_iter().find(|v| v.file_stem() == stem)
    }

    /// Guess the variant from file contents.
    ///
    /// Returns `None` unless exactly one variant's signature key is present.
    pub fn detect(data: &[u8]) -> Option<Self> {
        let mut found = Self::all()
            .into_iter()
            .filter(|v| memmem::find(data, v.signature()).is_some());

        match (found.next(), found.next()) {
            (Some(variant), None) => Some(variant),
            _ => None,
        }
    }
}

impl fmt::Display for FileVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FileVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|v| v.name() == s || v.file_stem() == s)
            .ok_or_else(|| Error::UnknownVariant(s.to_string()))
    }
}
