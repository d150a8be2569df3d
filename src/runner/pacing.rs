use serde::Deserialize;
use std::time::Duration;

/// Delivery rhythm of a runner.
///
/// The first bunch goes out at once so the user sees something while still
/// typing. After it, the runner pauses; if the query hasn't changed by then,
/// more results are welcome and arrive in smaller bunches with shorter
/// pauses, up to a hard maximum per query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Pacing {
    pub first_bunch: usize,
    pub first_pause_ms: u64,
    pub later_bunch: usize,
    pub later_pause_ms: u64,
    pub maximum: usize,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            first_bunch: 4,
            first_pause_ms: 1300,
            later_bunch: 8,
            later_pause_ms: 400,
            maximum: 200,
        }
    }
}

impl Pacing {
    /// How long to pause after `count` results have been delivered.
    pub fn pause_after(&self, count: usize) -> Option<Duration> {
        if count == self.first_bunch {
            Some(Duration::from_millis(self.first_pause_ms))
        } else if count > self.first_bunch && self.later_bunch > 0 && count % self.later_bunch == 0 {
            Some(Duration::from_millis(self.later_pause_ms))
        } else {
            None
        }
    }

    pub fn is_exhausted(&self, count: usize) -> bool {
        count >= self.maximum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rhythm() {
        let pacing = Pacing::default();
        let pauses: Vec<usize> = (1..=40).filter(|&n| pacing.pause_after(n).is_some()).collect();
        assert_eq!(pauses, vec![4, 8, 16, 24, 32, 40]);
        assert_eq!(pacing.pause_after(4), Some(Duration::from_millis(1300)));
        assert_eq!(pacing.pause_after(16), Some(Duration::from_millis(400)));
        assert!(!pacing.is_exhausted(199));
        assert!(pacing.is_exhausted(200));
    }

    #[test]
    fn no_bunch_larger_than_the_later_size() {
        let pacing = Pacing::default();
        let mut last_pause = 0;
        for n in 1..=pacing.maximum {
            if pacing.pause_after(n).is_some() {
                assert!(n - last_pause <= pacing.later_bunch);
                last_pause = n;
            }
        }
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let pacing: Pacing = toml::from_str("maximum = 20").unwrap();
        assert_eq!(pacing.maximum, 20);
        assert_eq!(pacing.first_bunch, 4);
    }
}
