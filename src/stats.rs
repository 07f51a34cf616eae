use serde::{Deserialize, Serialize};

/// Point-in-time statistics pushed by a node on its `stats` frame.
///
/// Each frame replaces the previous snapshot wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Milliseconds
    pub uptime: u64,
    pub players: u32,
    pub playing_players: u32,
    pub memory: MemoryStats,
    pub cpu: CpuStats,
    /// Absent until the node has been running for a minute
    #[serde(default)]
    pub frame_stats: Option<FrameStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryStats {
    pub free: u64,
    pub used: u64,
    pub allocated: u64,
    pub reservable: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CpuStats {
    pub cores: u32,
    pub system_load: f64,
    pub lavalink_load: f64,
}

/// Per-minute audio frame counters. A missing field or -1 means unavailable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameStats {
    #[serde(default)]
    pub sent: Option<i64>,
    #[serde(default)]
    pub nulled: Option<i64>,
    #[serde(default)]
    pub deficit: Option<i64>,
}

impl Stats {
    pub fn penalty(&self) -> Penalty {
        Penalty::from_stats(self)
    }

    // Servers report -1 when a counter is unavailable
    fn frames_nulled(&self) -> Option<i64> {
        self.frame_stats.as_ref().and_then(|f| f.nulled).filter(|n| *n >= 0)
    }

    fn frames_deficit(&self) -> Option<i64> {
        self.frame_stats.as_ref().and_then(|f| f.deficit).filter(|n| *n >= 0)
    }
}

/// Load-balancing cost derived from a [`Stats`] snapshot. Lower is better.
///
/// The CPU term is slightly negative for a near-idle node, so totals are not
/// guaranteed to be non-negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Penalty {
    pub player: f64,
    pub cpu: f64,
    pub null_frame: f64,
    pub deficit_frame: f64,
    pub total: f64,
}

impl Penalty {
    pub fn from_stats(stats: &Stats) -> Self {
        let player = f64::from(stats.playing_players);
        let cpu = 1.05f64.powf(100.0 * stats.cpu.system_load) * 10.0 - 10.0;

        let null_frame = stats
            .frames_nulled()
            .map(|nulled| 2.0 * (1.03f64.powf(500.0 * nulled as f64 / 3000.0) * 300.0 - 300.0))
            .unwrap_or(0.0);

        let deficit_frame = stats
            .frames_deficit()
            .map(|deficit| 1.03f64.powf(500.0 * deficit as f64 / 3000.0) * 600.0 - 600.0)
            .unwrap_or(0.0);

        Self {
            player,
            cpu,
            null_frame,
            deficit_frame,
            total: player + cpu + null_frame + deficit_frame,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn stats_fixture(playing: u32, system_load: f64, frames: Option<(i64, i64)>) -> Stats {
        Stats {
            uptime: 1000,
            players: playing,
            playing_players: playing,
            memory: MemoryStats {
                free: 1,
                used: 1,
                allocated: 2,
                reservable: 4,
            },
            cpu: CpuStats {
                cores: 4,
                system_load,
                lavalink_load: 0.0,
            },
            frame_stats: frames.map(|(nulled, deficit)| FrameStats {
                sent: Some(3000),
                nulled: Some(nulled),
                deficit: Some(deficit),
            }),
        }
    }

    #[test]
    fn idle_node_penalty_is_player_count() {
        let penalty = stats_fixture(5, 0.0, None).penalty();
        assert_eq!(penalty.cpu, 0.0);
        assert_eq!(penalty.null_frame, 0.0);
        assert_eq!(penalty.deficit_frame, 0.0);
        assert_eq!(penalty.total, 5.0);
    }

    #[test]
    fn zero_frame_counters_add_nothing() {
        let penalty = stats_fixture(2, 0.0, Some((0, 0))).penalty();
        assert_eq!(penalty.total, 2.0);
    }

    #[test]
    fn matches_reference_formula() {
        let stats = stats_fixture(3, 0.5, Some((30, 60)));
        let penalty = stats.penalty();

        let cpu = 1.05f64.powf(50.0) * 10.0 - 10.0;
        let nulled = 2.0 * (1.03f64.powf(500.0 * 30.0 / 3000.0) * 300.0 - 300.0);
        let deficit = 1.03f64.powf(500.0 * 60.0 / 3000.0) * 600.0 - 600.0;

        assert!((penalty.cpu - cpu).abs() < 1e-9);
        assert!((penalty.null_frame - nulled).abs() < 1e-9);
        assert!((penalty.deficit_frame - deficit).abs() < 1e-9);
        assert!((penalty.total - (3.0 + cpu + nulled + deficit)).abs() < 1e-9);
    }

    #[test]
    fn unavailable_frame_counters_add_nothing() {
        let penalty = stats_fixture(5, 0.0, Some((-1, -1))).penalty();
        assert_eq!(penalty.null_frame, 0.0);
        assert_eq!(penalty.deficit_frame, 0.0);
        assert_eq!(penalty.total, 5.0);
    }

    #[test]
    fn parses_stats_frame_without_frame_stats() {
        let stats: Stats = serde_json::from_value(json!({
            "uptime": 60000,
            "players": 2,
            "playingPlayers": 1,
            "memory": { "free": 10, "used": 20, "allocated": 30, "reservable": 40 },
            "cpu": { "cores": 8, "systemLoad": 0.1, "lavalinkLoad": 0.05 }
        }))
        .unwrap();
        assert_eq!(stats.playing_players, 1);
        assert!(stats.frame_stats.is_none());
    }
}
