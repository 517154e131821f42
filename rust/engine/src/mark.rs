use serde::{Deserialize, Serialize};
use std::fmt;

/// The symbol a player places on the board.
///
/// The room creator always plays [`Mark::X`]; the second player plays [`Mark::O`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mark::X => "x",
            Mark::O => "o",
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opponent_swaps_marks() {
        assert_eq!(Mark::X.opponent(), Mark::O);
        assert_eq!(Mark::O.opponent(), Mark::X);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Mark::X).unwrap(), "\"x\"");
        assert_eq!(serde_json::from_str::<Mark>("\"o\"").unwrap(), Mark::O);
    }
}
