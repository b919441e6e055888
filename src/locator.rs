//! `<package-location>:<TypeName>` references as given on the command line.
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Error;

// the last single colon splits location from name; `::` stays part of the location
static LOCATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<pkg>.*[^:]):(?P<name>[A-Za-z_][A-Za-z0-9_]*)$").expect("locator pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub location: String,
    pub name: String,
}

impl Locator {
    /// Relative file location inside the current project (`./src/...rs`).
    pub fn is_local_file(&self) -> bool {
        self.location.starts_with("./") && self.location.ends_with(".rs")
    }

    pub fn require_local_file(&self) -> Result<(), Error> {
        if self.is_local_file() {
            return Ok(());
        }
        Err(Error::LocatorRejected {
            locator: self.to_string(),
            reason: "location must be a .rs file path relative to the project root starting with ./".into(),
        })
    }
}

impl FromStr for Locator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = LOCATOR
            .captures(s)
            .ok_or_else(|| Error::InvalidLocator(s.to_string()))?;
        Ok(Locator {
            location: caps["pkg"].to_string(),
            name: caps["name"].to_string(),
        })
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.location, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_paths_keep_double_colons() {
        let loc: Locator = "crate::wire::user:Contact".parse().unwrap();
        assert_eq!(loc.location, "crate::wire::user");
        assert_eq!(loc.name, "Contact");
        assert!(!loc.is_local_file());
    }

    #[test]
    fn file_locations() {
        let loc: Locator = "./src/domain.rs:User".parse().unwrap();
        assert_eq!(loc.location, "./src/domain.rs");
        assert!(loc.require_local_file().is_ok());

        let loc: Locator = "src/domain.rs:User".parse().unwrap();
        assert!(matches!(loc.require_local_file(), Err(Error::LocatorRejected { .. })));
    }

    #[test]
    fn malformed_locators_are_rejected() {
        for bad in ["User", "crate::wire::User", ":User", "crate::wire:", "crate::wire:9User"] {
            assert!(
                matches!(bad.parse::<Locator>(), Err(Error::InvalidLocator(_))),
                "{bad} must be rejected"
            );
        }
    }
}
