use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::token::TokenDigest;

#[derive(Debug, Clone)]
pub struct MagicLinkToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: TokenDigest,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MagicLinkToken {
    /// Unconsumed and expiring strictly after `now`.
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.consumed_at.is_none() && self.expires_at > now
    }
}
