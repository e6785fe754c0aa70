// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;
use core::ops::{BitAnd, BitOr, Not};

/// Which reference kinds an expansion call evaluates.
///
/// Reference kinds that are not requested are copied through as literal
/// text.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExpanderOptions(u8);

impl ExpanderOptions {
    pub const INVALID: ExpanderOptions = ExpanderOptions(0);
    pub const EXPAND_PROPERTIES: ExpanderOptions = ExpanderOptions(1);
    pub const EXPAND_ITEMS: ExpanderOptions = ExpanderOptions(2);
    pub const EXPAND_METADATA: ExpanderOptions = ExpanderOptions(4);
    /// Cut long property values and item lists in the output.
    pub const TRUNCATE: ExpanderOptions = ExpanderOptions(8);

    pub const EXPAND_PROPERTIES_AND_ITEMS: ExpanderOptions = ExpanderOptions(1 | 2);
    pub const EXPAND_PROPERTIES_AND_METADATA: ExpanderOptions = ExpanderOptions(1 | 4);
    pub const EXPAND_ALL: ExpanderOptions = ExpanderOptions(1 | 2 | 4);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: ExpanderOptions) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub const fn union(self, other: ExpanderOptions) -> ExpanderOptions {
        ExpanderOptions(self.0 | other.0)
    }

    pub const fn difference(self, other: ExpanderOptions) -> ExpanderOptions {
        ExpanderOptions(self.0 & !other.0)
    }

    /// True if at least one reference kind is requested.
    pub const fn expands_anything(self) -> bool {
        self.0 & Self::EXPAND_ALL.0 != 0
    }
}

impl BitOr for ExpanderOptions {
    type Output = ExpanderOptions;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitAnd for ExpanderOptions {
    type Output = ExpanderOptions;

    fn bitand(self, rhs: Self) -> Self {
        ExpanderOptions(self.0 & rhs.0)
    }
}

impl Not for ExpanderOptions {
    type Output = ExpanderOptions;

    fn not(self) -> Self {
        ExpanderOptions(!self.0 & 0x0f)
    }
}

impl fmt::Debug for ExpanderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::EXPAND_PROPERTIES, "ExpandProperties"),
            (Self::EXPAND_ITEMS, "ExpandItems"),
            (Self::EXPAND_METADATA, "ExpandMetadata"),
            (Self::TRUNCATE, "Truncate"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            f.write_str("Invalid")
        } else {
            f.write_str(&set.join(" | "))
        }
    }
}

impl core::str::FromStr for ExpanderOptions {
    type Err = anyhow::Error;

    /// Parse a `|` or `,` separated list of flag names.
    fn from_str(s: &str) -> anyhow::Result<Self> {
        let mut options = ExpanderOptions::INVALID;
        for name in s.split(['|', ',']).map(str::trim).filter(|n| !n.is_empty()) {
            options = options
                | match name.to_ascii_lowercase().as_str() {
                    "invalid" => ExpanderOptions::INVALID,
                    "expandproperties" | "properties" => ExpanderOptions::EXPAND_PROPERTIES,
                    "expanditems" | "items" => ExpanderOptions::EXPAND_ITEMS,
                    "expandmetadata" | "metadata" => ExpanderOptions::EXPAND_METADATA,
                    "expandpropertiesanditems" => ExpanderOptions::EXPAND_PROPERTIES_AND_ITEMS,
                    "expandpropertiesandmetadata" => {
                        ExpanderOptions::EXPAND_PROPERTIES_AND_METADATA
                    }
                    "expandall" | "all" => ExpanderOptions::EXPAND_ALL,
                    "truncate" => ExpanderOptions::TRUNCATE,
                    _ => anyhow::bail!("unknown expander option `{name}`"),
                };
        }
        Ok(options)
    }
}

impl<'de> serde::Deserialize<'de> for ExpanderOptions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine() {
        let o = ExpanderOptions::EXPAND_PROPERTIES | ExpanderOptions::TRUNCATE;
        assert!(o.contains(ExpanderOptions::EXPAND_PROPERTIES));
        assert!(!o.contains(ExpanderOptions::EXPAND_ITEMS));
        assert!(!o.contains(ExpanderOptions::INVALID));
        assert!(ExpanderOptions::EXPAND_ALL.contains(ExpanderOptions::EXPAND_PROPERTIES_AND_METADATA));
        assert_eq!(format!("{o:?}"), "ExpandProperties | Truncate");
    }

    #[test]
    fn parse_names() -> anyhow::Result<()> {
        let o: ExpanderOptions = "ExpandProperties | ExpandMetadata".parse()?;
        assert_eq!(o, ExpanderOptions::EXPAND_PROPERTIES_AND_METADATA);
        assert!("ExpandEverything".parse::<ExpanderOptions>().is_err());
        Ok(())
    }
}
