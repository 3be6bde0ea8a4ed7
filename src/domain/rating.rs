use super::ids::{CheckInId, RatingId, SalonId, UserId};
use crate::error::SalonError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A star rating, always within 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct RatingScore(u8);

impl RatingScore {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Result<Self, SalonError> {
        match u8::try_from(value) {
            Ok(v) if (Self::MIN..=Self::MAX).contains(&v) => Ok(Self(v)),
            _ => Err(SalonError::InvalidArgument(format!(
                "rating must be an integer between {} and {}, got {value}",
                Self::MIN,
                Self::MAX
            ))),
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for RatingScore {
    type Error = SalonError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RatingScore> for u8 {
    fn from(score: RatingScore) -> Self {
        score.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: RatingId,
    pub salon_id: SalonId,
    pub user_id: UserId,
    /// The visit this rating is for.
    pub check_in_id: CheckInId,
    pub score: RatingScore,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
}
