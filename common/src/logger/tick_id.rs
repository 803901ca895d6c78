use std::fmt;

use uuid::Uuid;

/// Correlation id attached to one periodic recompute pass, so every log line
/// emitted while computing and publishing a tick can be grouped together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickId(Uuid);

impl TickId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TickId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps pretty logs readable.
        let s = self.0.simple().to_string();
        f.write_str(&s[..12])
    }
}
