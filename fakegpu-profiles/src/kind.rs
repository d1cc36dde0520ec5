//! Profile variant names and the name-based factory.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

/// Returned when a profile name does not match any variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown profile '{0}'")]
pub struct UnknownProfile(pub String);

/// The available profile variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProfileKind {
    #[default]
    Static,
    Stable,
    Spike,
    Wave,
    Degrading,
    Faulty,
    Chaos,
}

impl ProfileKind {
    /// All variants, in listing order.
    pub const ALL: [ProfileKind; 7] = [
        ProfileKind::Static,
        ProfileKind::Stable,
        ProfileKind::Spike,
        ProfileKind::Wave,
        ProfileKind::Degrading,
        ProfileKind::Faulty,
        ProfileKind::Chaos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Static => "static",
            ProfileKind::Stable => "stable",
            ProfileKind::Spike => "spike",
            ProfileKind::Wave => "wave",
            ProfileKind::Degrading => "degrading",
            ProfileKind::Faulty => "faulty",
            ProfileKind::Chaos => "chaos",
        }
    }

    /// Comma-separated list of profile names, for help output.
    pub fn names() -> String {
        Self::ALL
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Resolve a profile by name, falling back to [`ProfileKind::Static`].
    ///
    /// Unknown names are logged and never fail.
    pub fn from_name_or_default(name: &str) -> Self {
        match name.parse() {
            Ok(kind) => kind,
            Err(UnknownProfile(name)) => {
                warn!(profile = %name, "Unknown profile '{}', using 'static' profile", name);
                ProfileKind::Static
            }
        }
    }
}

impl FromStr for ProfileKind {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| UnknownProfile(s.to_string()))
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
