use model::entities::survey::NpsBucket;

use crate::error::{PolicyError, Result};

pub const MIN_SCORE: i32 = 0;
pub const MAX_SCORE: i32 = 10;

/// Buckets a recommendation score: 5 and above promote, 3 and below detract.
pub fn classify_nps(score: i32) -> NpsBucket {
    if score >= 5 {
        NpsBucket::Promoter
    } else if score <= 3 {
        NpsBucket::Detractor
    } else {
        NpsBucket::Passive
    }
}

pub fn validate_score(score: i32) -> Result<i32> {
    if (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(score)
    } else {
        Err(PolicyError::ScoreOutOfRange(score))
    }
}
