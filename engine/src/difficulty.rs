//! Difficulty presets: a 1..=4 level mapped to engine tuning.

/// Skill throttle and search bounds for one difficulty level.
///
/// `skill_level` feeds the UCI `Skill Level` option (0..=20), `depth` bounds
/// depth-limited searches, `move_time_ms` bounds timed searches. All three
/// grow with the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Difficulty {
    pub level: u8,
    pub skill_level: u8,
    pub depth: u8,
    pub move_time_ms: u64,
}

const LEVELS: [Difficulty; 4] = [
    Difficulty {
        level: 1,
        skill_level: 0,
        depth: 2,
        move_time_ms: 1000,
    },
    Difficulty {
        level: 2,
        skill_level: 5,
        depth: 4,
        move_time_ms: 2000,
    },
    Difficulty {
        level: 3,
        skill_level: 10,
        depth: 6,
        move_time_ms: 3000,
    },
    Difficulty {
        level: 4,
        skill_level: 15,
        depth: 8,
        move_time_ms: 5000,
    },
];

const DEFAULT_LEVEL: u8 = 2;

impl Difficulty {
    /// Look up the tuning for a level. Levels outside 1..=4 fall back to the
    /// default (level 2).
    pub fn for_level(level: u8) -> Difficulty {
        LEVELS
            .iter()
            .find(|d| d.level == level)
            .copied()
            .unwrap_or_else(Difficulty::default)
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        LEVELS[(DEFAULT_LEVEL - 1) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_monotonic() {
        for pair in LEVELS.windows(2) {
            assert!(pair[0].skill_level < pair[1].skill_level);
            assert!(pair[0].depth < pair[1].depth);
            assert!(pair[0].move_time_ms < pair[1].move_time_ms);
        }
    }

    #[test]
    fn test_out_of_range_falls_back_to_default() {
        assert_eq!(Difficulty::for_level(0), Difficulty::for_level(2));
        assert_eq!(Difficulty::for_level(5), Difficulty::for_level(2));
        assert_eq!(Difficulty::for_level(200), Difficulty::for_level(2));
    }

    #[test]
    fn test_default_is_level_two() {
        assert_eq!(Difficulty::default().level, 2);
    }
}
