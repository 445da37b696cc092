use quire::Dialect;
use serde::{Deserialize, Serialize};

/// Which variable syntax a piece of source text is scanned with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DialectName {
    /// `$name.path` and `@name.path` anywhere at a word boundary.
    #[default]
    Inline,
    /// Only inside braces: `{$name.path}`.
    Braced,
}

impl DialectName {
    pub fn dialect(self) -> Dialect {
        match self {
            DialectName::Inline => Dialect::INLINE,
            DialectName::Braced => Dialect::BRACED,
        }
    }
}

/// Load-time settings of an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineOptions {
    pub text_dialect: DialectName,
    pub attribute_dialect: DialectName,
    /// Root dataset names recognized as globals everywhere, besides the base set.
    pub globals: Vec<String>,
}

impl EngineOptions {
    pub fn from_toml(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }
}
