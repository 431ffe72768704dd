//! Display-mode matching heuristic
//!
//! Maps a stored abstract monitor description onto a concrete mode the
//! attached hardware actually supports. A physical panel's mode list is
//! expressed in its native landscape dimensions regardless of the rotation
//! applied on top, so a portrait target is also searched with its dimensions
//! swapped (a "native match").

use crate::constants::matching::{
    EXACT_MATCH_SCORE, NATIVE_MATCH_SCORE, REFRESH_EXACT_BONUS, REFRESH_NEAR_BONUS,
};
use crate::display::api::DisplayMode;

/// Result of searching a device's mode list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// An exact or native match was found
    Matched(DisplayMode),
    /// No match; the highest-resolution mode is offered as a degraded,
    /// best-effort substitute
    Fallback(DisplayMode),
    /// The device reported no usable mode
    NoMatch,
}

/// Select the best available mode for a target of `width` x `height` at
/// `refresh` Hz.
///
/// Scoring: exact dimensions start at 1000, native (swapped) dimensions at
/// 900; an exact refresh adds 100, otherwise `max(0, 50 - |delta|)`. Ties
/// keep the first mode encountered, which depends on OS enumeration order.
/// Independently the greatest-pixel-count mode
/// (ties broken by higher refresh) is tracked as the fallback candidate.
pub fn best_mode(
    modes: &[DisplayMode],
    width: u16,
    height: u16,
    refresh: u16,
    rotated: bool,
    allow_fallback: bool,
) -> MatchOutcome {
    // Portrait targets search the native (unrotated) resolution as well
    let (native_w, native_h) = if rotated || height > width {
        (height, width)
    } else {
        (width, height)
    };

    let mut best: Option<DisplayMode> = None;
    let mut best_score = -1;
    let mut fallback: Option<DisplayMode> = None;

    for mode in modes {
        match fallback {
            Some(f)
                if mode.pixel_count() < f.pixel_count()
                    || (mode.pixel_count() == f.pixel_count() && mode.refresh <= f.refresh) => {}
            _ => fallback = Some(*mode),
        }

        let exact = mode.width == width && mode.height == height;
        let native = mode.width == native_w && mode.height == native_h;
        if !exact && !native {
            continue;
        }

        let mut score = if exact {
            EXACT_MATCH_SCORE
        } else {
            NATIVE_MATCH_SCORE
        };
        if mode.refresh == refresh {
            score += REFRESH_EXACT_BONUS;
        } else {
            let delta = i32::from(mode.refresh.abs_diff(refresh));
            score += (REFRESH_NEAR_BONUS - delta).max(0);
        }

        if score > best_score {
            best_score = score;
            best = Some(*mode);
        }
    }

    match (best, fallback) {
        (Some(mode), _) => MatchOutcome::Matched(mode),
        (None, Some(mode)) if allow_fallback => MatchOutcome::Fallback(mode),
        _ => MatchOutcome::NoMatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(width: u16, height: u16, refresh: u16) -> DisplayMode {
        DisplayMode {
            width,
            height,
            refresh,
            bits_per_pixel: 24,
        }
    }

    #[test]
    fn exact_refresh_beats_near_refresh() {
        // 1100 (exact + exact refresh) over 1050 (exact + refresh off by 50)
        let modes = [mode(1920, 1080, 110), mode(1920, 1080, 60)];
        assert_eq!(
            best_mode(&modes, 1920, 1080, 60, false, true),
            MatchOutcome::Matched(mode(1920, 1080, 60))
        );
    }

    #[test]
    fn exact_match_beats_native_match() {
        let modes = [mode(1080, 1920, 60), mode(1920, 1080, 60)];
        // Exact (1080x1920) scores 1100, native-rotated (1920x1080) at most 1000
        assert_eq!(
            best_mode(&modes, 1080, 1920, 60, true, true),
            MatchOutcome::Matched(mode(1080, 1920, 60))
        );
    }

    #[test]
    fn rotated_target_searches_swapped_dimensions() {
        // Portrait 1080x1920 target against a landscape-only mode list
        let modes = [mode(1280, 1024, 60), mode(1920, 1080, 60)];
        assert_eq!(
            best_mode(&modes, 1080, 1920, 60, true, true),
            MatchOutcome::Matched(mode(1920, 1080, 60))
        );
    }

    #[test]
    fn portrait_dimensions_imply_rotation_without_flag() {
        let modes = [mode(1920, 1080, 60)];
        assert_eq!(
            best_mode(&modes, 1080, 1920, 60, false, true),
            MatchOutcome::Matched(mode(1920, 1080, 60))
        );
    }

    #[test]
    fn refresh_bonus_decays_with_distance() {
        // 75Hz is 15 off (bonus 35), 144Hz is 84 off (bonus 0)
        let modes = [mode(1920, 1080, 144), mode(1920, 1080, 75)];
        assert_eq!(
            best_mode(&modes, 1920, 1080, 60, false, true),
            MatchOutcome::Matched(mode(1920, 1080, 75))
        );
    }

    #[test]
    fn tie_keeps_first_encountered() {
        // Same dimensions, refresh equally far from target on both sides
        let modes = [mode(1920, 1080, 50), mode(1920, 1080, 70)];
        assert_eq!(
            best_mode(&modes, 1920, 1080, 60, false, true),
            MatchOutcome::Matched(mode(1920, 1080, 50))
        );
    }

    #[test]
    fn fallback_picks_highest_pixel_count() {
        let modes = [mode(1280, 1024, 75), mode(2560, 1440, 60), mode(1920, 1080, 60)];
        assert_eq!(
            best_mode(&modes, 3840, 2160, 60, false, true),
            MatchOutcome::Fallback(mode(2560, 1440, 60))
        );
    }

    #[test]
    fn fallback_pixel_tie_prefers_higher_refresh() {
        let modes = [mode(1920, 1080, 60), mode(1920, 1080, 144)];
        assert_eq!(
            best_mode(&modes, 3840, 2160, 60, false, true),
            MatchOutcome::Fallback(mode(1920, 1080, 144))
        );
    }

    #[test]
    fn fallback_disallowed_yields_no_match() {
        let modes = [mode(1280, 1024, 60)];
        assert_eq!(
            best_mode(&modes, 1920, 1080, 60, false, false),
            MatchOutcome::NoMatch
        );
    }

    #[test]
    fn empty_mode_list_yields_no_match() {
        assert_eq!(best_mode(&[], 1920, 1080, 60, false, true), MatchOutcome::NoMatch);
    }
}
