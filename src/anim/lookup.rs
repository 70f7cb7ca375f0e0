//! Per-rank-count layout tables.
//!
//! The chart layout is tuned by hand for each supported top-N: bar thickness,
//! minimum visible width, thumbnail scale and anchoring, and caption spacing
//! all shift as the slot count grows. These tables hold those tuned values.

use crate::data::event::RankBy;

/// Vertical position of a bar that is not on screen.
pub const OFF_SCREEN: f64 = -1.0;

/// Upper clamp for interpolated bar positions.
pub const POSITION_MAX: f64 = 9.0;

/// Gap kept above the top slot when fitting the vertical axis.
pub const TOP_GAP: f64 = 0.3;

/// Gap kept below the bottom slot when fitting the vertical axis.
pub const BOTTOM_GAP: f64 = 0.2;

/// Resting vertical position for each slot, top rank first. Slots are spread
/// over [0.3, 8.9]; a lone slot sits centred at 4.5.
pub fn slot_positions(top_n: usize) -> Vec<f64> {
    if top_n == 1 {
        return vec![4.5];
    }
    (0..top_n)
        .map(|i| 8.9 - i as f64 * (8.6 / (top_n as f64 - 1.0)))
        .collect()
}

/// Minimum rendered width of an active bar, as a fraction of the current
/// leader's value. Keeps newly entered bars legible.
pub fn min_width_fraction(top_n: usize) -> f64 {
    match top_n {
        1 => 0.30,
        2 => 0.54,
        3 => 0.37,
        4 => 0.28,
        5 => 0.22,
        6 => 0.19,
        7 => 0.16,
        8 => 0.14,
        9 => 0.13,
        _ => 0.11,
    }
}

/// Bar thickness in slot-position units.
pub fn bar_height(top_n: usize) -> f64 {
    match top_n {
        1 | 2 => 3.0,
        3 => 2.5,
        4 => 1.7,
        5 => 1.4,
        6 => 1.1,
        7 => 0.9,
        8 => 0.8,
        9 => 0.75,
        _ => 0.7,
    }
}

/// Thumbnail edge length scale, in layout points per bar.
pub fn thumb_scale(top_n: usize) -> f64 {
    match top_n {
        1 | 2 => 70.0,
        3 => 75.0,
        4..=9 => 80.0,
        _ => 82.0,
    }
}

/// Horizontal anchor offset of the thumbnail from the bar tip, in layout
/// points. Negative pulls the art inside the bar.
pub fn thumb_offset_x(top_n: usize) -> f64 {
    match top_n {
        1 | 2 => -127.0,
        3 => -113.0,
        4 => -80.0,
        5 => -69.0,
        6 => -57.0,
        7 => -47.0,
        8 => -41.0,
        9 => -39.0,
        _ => -36.0,
    }
}

/// Label font size in points. Track and album labels shrink as slots multiply;
/// artist labels have no caption below them and keep a fixed size.
pub fn label_font_pt(top_n: usize, rank_by: RankBy) -> f64 {
    match rank_by {
        RankBy::Track | RankBy::Album => match top_n {
            1..=5 => 22.0,
            6..=8 => 20.0,
            9 | 10 => 19.0,
            _ => 22.0,
        },
        RankBy::Artist => 22.0,
    }
}

/// Vertical offset of the parent caption below the label, in slot-position
/// units, keyed by label line count (1..=3).
pub fn caption_offset(top_n: usize, label_lines: usize) -> f64 {
    match (top_n, label_lines) {
        (1, 1) => 0.06,
        (1, 2) => 0.10,
        (1, 3) => 0.22,
        (2, 1) => 0.08,
        (2, 2) => 0.12,
        (2, 3) => 0.14,
        (3, 1) => 0.10,
        (3, 2) => 0.14,
        (3, 3) => 0.19,
        (4, 1) => 0.14,
        (4, 2) => 0.19,
        (4, 3) => 0.25,
        (5, 1) => 0.16,
        (5, 2) => 0.23,
        (5, 3) => 0.29,
        (6, 1) => 0.17,
        (6, 2) => 0.24,
        (6, 3) => 0.32,
        (7, 1) => 0.20,
        (7, 2) => 0.29,
        (7, 3) => 0.36,
        (8, 1) => 0.22,
        (8, 2) => 0.31,
        (8, 3) => 0.39,
        (9, 1) => 0.24,
        (9, 2) => 0.33,
        (9, 3) => 0.43,
        (10, 1) => 0.25,
        (10, 2) => 0.35,
        (10, 3) => 0.45,
        _ => 0.30,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_slot_sits_centered() {
        assert_eq!(slot_positions(1), vec![4.5]);
    }

    #[test]
    fn slot_positions_span_fixed_band() {
        for n in 2..=10 {
            let pos = slot_positions(n);
            assert_eq!(pos.len(), n);
            assert!((pos[0] - 8.9).abs() < 1e-12);
            assert!((pos[n - 1] - 0.3).abs() < 1e-12);
            assert!(pos.windows(2).all(|w| w[0] > w[1]));
        }
    }

    #[test]
    fn min_width_fraction_spot_checks() {
        assert_eq!(min_width_fraction(5), 0.22);
        assert_eq!(min_width_fraction(10), 0.11);
        assert_eq!(min_width_fraction(37), 0.11);
    }

    #[test]
    fn caption_offset_falls_back_out_of_table() {
        assert_eq!(caption_offset(5, 2), 0.23);
        assert_eq!(caption_offset(5, 4), 0.30);
        assert_eq!(caption_offset(11, 1), 0.30);
    }
}
