//! Channel mixing matrices.
//!
//! Read-only upmix/downmix tables applied by the connection layer when the
//! destination interprets its channels as speaker positions. Each table is
//! row-major `S × D`: entry `[s * D + d]` is the weight of source channel
//! `s` into destination channel `d`.
//!
//! Channel orders follow the usual conventions: stereo is `L R`, 5.1 is
//! `FL FR C LFE BL BR`, 7.1 is `FL FR C LFE BL BR SL SR`. Mono upmixes use
//! equal-power weights; downmixes fold center and surrounds in at -3 dB and
//! are normalized so a full-scale input cannot clip.

/// `1/sqrt(2)`: the -3 dB pan weight.
const HALF_POWER: f32 = 0.707_106_77;

pub const MIX_1_TO_2: &[f32] = &[HALF_POWER, HALF_POWER];

pub const MIX_1_TO_6: &[f32] = &[0.0, 0.0, 1.0, 0.0, 0.0, 0.0];

pub const MIX_1_TO_8: &[f32] = &[0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0];

pub const MIX_2_TO_1: &[f32] = &[0.5, 0.5];

#[rustfmt::skip]
pub const MIX_2_TO_6: &[f32] = &[
    1.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0, 0.0, 0.0,
];

#[rustfmt::skip]
pub const MIX_2_TO_8: &[f32] = &[
    1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
];

// 5.1 downmix weights: front 1.0, center and surrounds at -3 dB, scaled by
// 1 / (1 + 2 * 0.7071) so the loudest fold-in peaks at unity.
const SIX_NORM: f32 = 0.414_213_57;

pub const MIX_6_TO_1: &[f32] = &[
    0.5 * SIX_NORM,
    0.5 * SIX_NORM,
    HALF_POWER * SIX_NORM,
    0.0,
    0.5 * HALF_POWER * SIX_NORM,
    0.5 * HALF_POWER * SIX_NORM,
];

#[rustfmt::skip]
pub const MIX_6_TO_2: &[f32] = &[
    SIX_NORM,              0.0,
    0.0,                   SIX_NORM,
    HALF_POWER * SIX_NORM, HALF_POWER * SIX_NORM,
    0.0,                   0.0,
    HALF_POWER * SIX_NORM, 0.0,
    0.0,                   HALF_POWER * SIX_NORM,
];

#[rustfmt::skip]
pub const MIX_6_TO_8: &[f32] = &[
    1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0,
];

// 7.1 downmix weights: as 5.1 with side channels folded like the backs,
// normalized by 1 / (1 + 3 * 0.7071).
const EIGHT_NORM: f32 = 0.320_377_37;

pub const MIX_8_TO_1: &[f32] = &[
    0.5 * EIGHT_NORM,
    0.5 * EIGHT_NORM,
    HALF_POWER * EIGHT_NORM,
    0.0,
    0.5 * HALF_POWER * EIGHT_NORM,
    0.5 * HALF_POWER * EIGHT_NORM,
    0.5 * HALF_POWER * EIGHT_NORM,
    0.5 * HALF_POWER * EIGHT_NORM,
];

#[rustfmt::skip]
pub const MIX_8_TO_2: &[f32] = &[
    EIGHT_NORM,              0.0,
    0.0,                     EIGHT_NORM,
    HALF_POWER * EIGHT_NORM, HALF_POWER * EIGHT_NORM,
    0.0,                     0.0,
    HALF_POWER * EIGHT_NORM, 0.0,
    0.0,                     HALF_POWER * EIGHT_NORM,
    HALF_POWER * EIGHT_NORM, 0.0,
    0.0,                     HALF_POWER * EIGHT_NORM,
];

// Side channels fold into the backs at -3 dB; the back rows are scaled by
// 1 / (1 + 0.7071) so the fold-in cannot clip.
const REAR_NORM: f32 = 0.585_786_46;

#[rustfmt::skip]
pub const MIX_8_TO_6: &[f32] = &[
    1.0, 0.0, 0.0, 0.0, 0.0,                    0.0,
    0.0, 1.0, 0.0, 0.0, 0.0,                    0.0,
    0.0, 0.0, 1.0, 0.0, 0.0,                    0.0,
    0.0, 0.0, 0.0, 1.0, 0.0,                    0.0,
    0.0, 0.0, 0.0, 0.0, REAR_NORM,              0.0,
    0.0, 0.0, 0.0, 0.0, 0.0,                    REAR_NORM,
    0.0, 0.0, 0.0, 0.0, HALF_POWER * REAR_NORM, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0,                    HALF_POWER * REAR_NORM,
];

/// Look up the mixing matrix for a source/destination channel pair.
///
/// Returns `None` for pairs without a documented matrix; the connection
/// layer then falls back to truncate-or-extend.
pub fn matrix(source_channels: usize, destination_channels: usize) -> Option<&'static [f32]> {
    match (source_channels, destination_channels) {
        (1, 2) => Some(MIX_1_TO_2),
        (1, 6) => Some(MIX_1_TO_6),
        (1, 8) => Some(MIX_1_TO_8),
        (2, 1) => Some(MIX_2_TO_1),
        (2, 6) => Some(MIX_2_TO_6),
        (2, 8) => Some(MIX_2_TO_8),
        (6, 1) => Some(MIX_6_TO_1),
        (6, 2) => Some(MIX_6_TO_2),
        (6, 8) => Some(MIX_6_TO_8),
        (8, 1) => Some(MIX_8_TO_1),
        (8, 2) => Some(MIX_8_TO_2),
        (8, 6) => Some(MIX_8_TO_6),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_documented_pairs_present() {
        let pairs = [
            (1, 2),
            (1, 6),
            (1, 8),
            (2, 1),
            (2, 6),
            (2, 8),
            (6, 1),
            (6, 2),
            (6, 8),
            (8, 1),
            (8, 2),
            (8, 6),
        ];
        for (s, d) in pairs {
            let m = matrix(s, d).unwrap_or_else(|| panic!("missing matrix {s}->{d}"));
            assert_eq!(m.len(), s * d, "matrix {s}->{d} has wrong shape");
        }
    }

    #[test]
    fn test_undocumented_pairs_absent() {
        assert!(matrix(2, 2).is_none());
        assert!(matrix(3, 2).is_none());
        assert!(matrix(6, 6).is_none());
        assert!(matrix(1, 4).is_none());
    }

    #[test]
    fn test_downmix_rows_bounded() {
        // No destination channel may receive more than unity total weight
        // from a full-scale all-channels source.
        for (s, d) in [(2, 1), (6, 1), (6, 2), (8, 1), (8, 2), (8, 6)] {
            let m = matrix(s, d).unwrap();
            for dest in 0..d {
                let total: f32 = (0..s).map(|src| m[src * d + dest]).sum();
                assert!(
                    total <= 1.0 + 1e-6,
                    "downmix {s}->{d} can clip on channel {dest}: {total}"
                );
            }
        }
    }
}
