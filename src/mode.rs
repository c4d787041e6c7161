use serde::{Deserialize, Serialize};

/// Which mode the CPU should be set to. Stored as the lowercase name in
/// `persist.unleashed.mode`; the backend daemon reads it back the same way.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Highest performance and thermal limits at advertised clock speeds.
    Benchmark,
    /// High performance and reasonable thermal limits at advertised clock
    /// speeds.
    Advertised,
    /// Average performance at underclocked speeds.
    Efficiency,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Benchmark, Mode::Advertised, Mode::Efficiency];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Benchmark => "benchmark",
            Mode::Advertised => "advertised",
            Mode::Efficiency => "efficiency",
        }
    }

    /// Strict parse over the three valid names. The backend treats unknown
    /// values as "advertised"; callers here do the same via their fallback.
    pub fn parse(s: &str) -> Option<Mode> {
        match s {
            "benchmark" => Some(Mode::Benchmark),
            "advertised" => Some(Mode::Advertised),
            "efficiency" => Some(Mode::Efficiency),
            _ => None,
        }
    }

    /// Card title in the picker.
    pub fn label(self) -> &'static str {
        match self {
            Mode::Benchmark => "Benchmark",
            Mode::Advertised => "Advertised",
            Mode::Efficiency => "Efficiency",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Mode::Benchmark => "Highest performance and thermal limits at advertised clock speeds",
            Mode::Advertised => {
                "High performance and reasonable thermal limits at advertised clock speeds"
            }
            Mode::Efficiency => "Average performance at underclocked speeds",
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Advertised
    }
}
