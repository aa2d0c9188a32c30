use crate::collection::PlayerId;
use crate::error::RatingError;

/// Parse a kyu/dan rank string into a seed rating.
///
/// `5k` maps to -5.5 and `3d` to 3.5; there is no rating between -1 and 1,
/// so `0k` and `0d` are rejected.
pub fn parse_rank(player: PlayerId, raw: &str) -> Result<f64, RatingError> {
    let bad = || RatingError::RankFormat {
        player,
        raw: raw.to_string(),
    };

    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    let suffix = chars.next_back().ok_or_else(bad)?;
    let number = chars.as_str().trim().parse::<u32>().map_err(|_| bad())?;
    if number == 0 {
        return Err(bad());
    }
    let n = number as f64;

    match suffix {
        'k' | 'K' => Ok(-(n + 0.5)),
        'd' | 'D' => Ok(n + 0.5),
        _ => Err(bad()),
    }
}

/// Shift a rating one unit toward zero so the kyu/dan gap disappears.
pub fn close_boundary(rating: f64) -> f64 {
    if rating > 0.0 { rating - 1.0 } else { rating + 1.0 }
}

/// Inverse of [`close_boundary`]: shift one unit away from zero.
pub fn open_boundary(rating: f64) -> f64 {
    if rating > 0.0 { rating + 1.0 } else { rating - 1.0 }
}

/// Human label for a rating, e.g. `3.42d` or `5.10k`.
pub fn format_rank(rating: f64) -> String {
    if rating >= 0.0 {
        format!("{:.2}d", rating)
    } else {
        format!("{:.2}k", -rating)
    }
}
