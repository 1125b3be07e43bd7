use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default reference coordinates of the first barcode half
pub const DEFAULT_FIRST_WINDOW: (i64, i64) = (6419, 6429);

/// Default reference coordinates of the second barcode half
pub const DEFAULT_SECOND_WINDOW: (i64, i64) = (6457, 6464);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WindowError {
    #[error("Invalid barcode window [{start}, {end}]: end must not precede start")]
    Inverted { start: i64, end: i64 },

    #[error("Invalid barcode window [{start}, {end}]: coordinates are 1-based")]
    NotPositive { start: i64, end: i64 },
}

/// Reference interval where a barcode half is expected to align
///
/// Both coordinates are 1-based and inclusive, so `[6419, 6429]` spans
/// eleven bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeWindow {
    pub start: i64,
    pub end: i64,
}

impl BarcodeWindow {
    /// Create a window, checking that it covers at least one base
    ///
    /// # Errors
    ///
    /// Returns `WindowError::NotPositive` for coordinates below 1 and
    /// `WindowError::Inverted` when `end < start`.
    pub fn new(start: i64, end: i64) -> Result<Self, WindowError> {
        if start < 1 || end < 1 {
            return Err(WindowError::NotPositive { start, end });
        }
        if end < start {
            return Err(WindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Number of reference positions covered
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // end >= start checked on construction
    pub fn len(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl std::fmt::Display for BarcodeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// The pair of windows searched for in every read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPair {
    pub first: BarcodeWindow,
    pub second: BarcodeWindow,
}

impl Default for WindowPair {
    fn default() -> Self {
        Self {
            first: BarcodeWindow {
                start: DEFAULT_FIRST_WINDOW.0,
                end: DEFAULT_FIRST_WINDOW.1,
            },
            second: BarcodeWindow {
                start: DEFAULT_SECOND_WINDOW.0,
                end: DEFAULT_SECOND_WINDOW.1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_length() {
        let window = BarcodeWindow::new(6419, 6429).unwrap();
        assert_eq!(window.len(), 11);

        let pair = WindowPair::default();
        assert_eq!(pair.first.len(), 11);
        assert_eq!(pair.second.len(), 8);
    }

    #[test]
    fn test_single_base_window() {
        let window = BarcodeWindow::new(5, 5).unwrap();
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_invalid_windows() {
        assert_eq!(
            BarcodeWindow::new(10, 5),
            Err(WindowError::Inverted { start: 10, end: 5 })
        );
        assert_eq!(
            BarcodeWindow::new(0, 5),
            Err(WindowError::NotPositive { start: 0, end: 5 })
        );
    }
}
