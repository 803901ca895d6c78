use std::collections::HashMap;
use std::path::Path;

use engine::spot::StationInfo;
use thiserror::Error;

const BUILTIN: &str = include_str!("../../data/prefixes.csv");

#[derive(Debug, Error)]
pub enum PrefixTableError {
    #[error("failed to read prefix table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("prefix table line {line}: expected `prefix,country,continent`")]
    Malformed { line: usize },
}

/// Callsign prefix → country/continent, matched longest-prefix-first.
#[derive(Debug, Clone, Default)]
pub struct PrefixTable {
    entries: HashMap<String, StationInfo>,
    longest: usize,
}

impl PrefixTable {
    /// Parses `prefix,country,continent` lines. Blank lines and `#`
    /// comments are skipped.
    pub fn parse(text: &str) -> Result<Self, PrefixTableError> {
        let mut table = Self::default();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut cols = line.split(',').map(str::trim);
            let (Some(prefix), Some(country), Some(continent), None) =
                (cols.next(), cols.next(), cols.next(), cols.next())
            else {
                return Err(PrefixTableError::Malformed { line: idx + 1 });
            };
            if prefix.is_empty() || country.is_empty() || continent.is_empty() {
                return Err(PrefixTableError::Malformed { line: idx + 1 });
            }
            let prefix = prefix.to_ascii_uppercase();
            table.longest = table.longest.max(prefix.len());
            table.entries.insert(
                prefix,
                StationInfo {
                    country: country.to_string(),
                    continent: continent.to_ascii_uppercase(),
                },
            );
        }
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self, PrefixTableError> {
        let text = std::fs::read_to_string(path).map_err(|source| PrefixTableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Table shipped with the crate, covering common DXCC prefixes.
    pub fn builtin() -> Result<Self, PrefixTableError> {
        Self::parse(BUILTIN)
    }

    pub fn lookup(&self, callsign: &str) -> Option<&StationInfo> {
        let call = callsign.trim().to_ascii_uppercase();
        let max = call.len().min(self.longest);
        (1..=max)
            .rev()
            .filter(|n| call.is_char_boundary(*n))
            .find_map(|n| self.entries.get(&call[..n]))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
