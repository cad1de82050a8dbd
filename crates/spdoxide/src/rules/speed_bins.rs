//! JEDEC standard speed bins.

use crate::profile::Generation;

/// A standard data rate and its minimum clock period.
pub struct SpeedBin {
    pub generation: Generation,
    /// MT/s.
    pub data_rate: u32,
    pub tck_ps: u32,
}

/// Known JEDEC speed bins, slowest first within each generation.
pub static SPEED_BINS: &[SpeedBin] = &[
    // -- DDR2 --
    SpeedBin { generation: Generation::Ddr2, data_rate: 400, tck_ps: 5000 },
    SpeedBin { generation: Generation::Ddr2, data_rate: 533, tck_ps: 3750 },
    SpeedBin { generation: Generation::Ddr2, data_rate: 667, tck_ps: 3000 },
    SpeedBin { generation: Generation::Ddr2, data_rate: 800, tck_ps: 2500 },
    SpeedBin { generation: Generation::Ddr2, data_rate: 1066, tck_ps: 1875 },
    // -- DDR3 --
    SpeedBin { generation: Generation::Ddr3, data_rate: 800, tck_ps: 2500 },
    SpeedBin { generation: Generation::Ddr3, data_rate: 1066, tck_ps: 1875 },
    SpeedBin { generation: Generation::Ddr3, data_rate: 1333, tck_ps: 1500 },
    SpeedBin { generation: Generation::Ddr3, data_rate: 1600, tck_ps: 1250 },
    SpeedBin { generation: Generation::Ddr3, data_rate: 1866, tck_ps: 1071 },
    SpeedBin { generation: Generation::Ddr3, data_rate: 2133, tck_ps: 938 },
    // -- DDR4 --
    SpeedBin { generation: Generation::Ddr4, data_rate: 1600, tck_ps: 1250 },
    SpeedBin { generation: Generation::Ddr4, data_rate: 1866, tck_ps: 1071 },
    SpeedBin { generation: Generation::Ddr4, data_rate: 2133, tck_ps: 938 },
    SpeedBin { generation: Generation::Ddr4, data_rate: 2400, tck_ps: 833 },
    SpeedBin { generation: Generation::Ddr4, data_rate: 2666, tck_ps: 750 },
    SpeedBin { generation: Generation::Ddr4, data_rate: 2933, tck_ps: 682 },
    SpeedBin { generation: Generation::Ddr4, data_rate: 3200, tck_ps: 625 },
];

/// Speed bins of one generation, slowest first.
pub fn bins_for(generation: Generation) -> impl Iterator<Item = &'static SpeedBin> {
    SPEED_BINS.iter().filter(move |b| b.generation == generation)
}

/// Bin whose tCK is within 1% of `tck_ps`.
pub fn find_speed_bin(generation: Generation, tck_ps: i64) -> Option<&'static SpeedBin> {
    bins_for(generation).find(|b| (i64::from(b.tck_ps) - tck_ps).abs() * 100 <= i64::from(b.tck_ps))
}

/// PC module-name prefix (`PC2`, `PC3`, `PC4`).
pub fn module_name_prefix(generation: Generation) -> &'static str {
    match generation {
        Generation::Ddr2 => "PC2",
        Generation::Ddr3 => "PC3",
        Generation::Ddr4 => "PC4",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_speed_bin() {
        assert_eq!(find_speed_bin(Generation::Ddr3, 1250).map(|b| b.data_rate), Some(1600));
        assert_eq!(find_speed_bin(Generation::Ddr4, 833).map(|b| b.data_rate), Some(2400));
        assert_eq!(find_speed_bin(Generation::Ddr3, 1070).map(|b| b.data_rate), Some(1866));
        assert!(find_speed_bin(Generation::Ddr3, 1100).is_none());
    }

    #[test]
    fn test_bins_sorted_slowest_first() {
        for generation in [Generation::Ddr2, Generation::Ddr3, Generation::Ddr4] {
            let rates: Vec<u32> = bins_for(generation).map(|b| b.data_rate).collect();
            assert!(rates.windows(2).all(|w| w[0] < w[1]), "{:?}", generation);
        }
    }
}
