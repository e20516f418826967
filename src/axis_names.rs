/// Centralized axis naming utilities
///
/// Provides consistent axis identifiers across the telemetry session,
/// the analyzer and its results.
use serde::{Deserialize, Serialize};

/// Number of control axes analysed per session
pub const AXIS_COUNT: usize = 3;

/// Get all axis names as a static array
pub const AXIS_NAMES: [&str; AXIS_COUNT] = ["Roll", "Pitch", "Yaw"];

/// A flight-controller rotation axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    Roll,
    Pitch,
    Yaw,
}

impl Axis {
    /// All axes in log column order
    pub const ALL: [Axis; AXIS_COUNT] = [Axis::Roll, Axis::Pitch, Axis::Yaw];

    /// Column index used by blackbox fields (`gyroADC[i]`, `axisP[i]`)
    pub fn index(self) -> usize {
        match self {
            Axis::Roll => 0,
            Axis::Pitch => 1,
            Axis::Yaw => 2,
        }
    }

    /// Axis for a column index, `None` if out of range
    pub fn from_index(index: usize) -> Option<Axis> {
        Axis::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        AXIS_NAMES[self.index()]
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
