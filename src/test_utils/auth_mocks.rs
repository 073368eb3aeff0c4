//! In-memory mock implementations for the auth store traits.
//!
//! Redemptions serialize on a single async lock, which stands in for the
//! row lock Postgres takes with `SELECT ... FOR UPDATE`. Writes made inside a
//! redemption are buffered and only applied on commit.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{clock::Clock, token::TokenDigest},
    domain::entities::{magic_link_token::MagicLinkToken, user::UserProfile},
    use_cases::auth::{AuthStore, MagicLinkClaim, MagicLinkRepo, RedemptionTx, UserRepo},
};

// ============================================================================
// ManualClock
// ============================================================================

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Starts at an RFC 3339 timestamp, e.g. "2026-03-01T12:00:00Z".
    pub fn at(rfc3339: &str) -> Self {
        let now = DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc);
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ============================================================================
// InMemoryAuthStore
// ============================================================================

#[derive(Default)]
struct StoreState {
    users: HashMap<Uuid, UserProfile>,
    tokens: HashMap<Uuid, MagicLinkToken>,
}

#[derive(Default)]
pub struct InMemoryAuthStore {
    state: Arc<Mutex<StoreState>>,
    redemption_lock: Arc<tokio::sync::Mutex<()>>,
    fail_record_login: AtomicBool,
    race_next_insert: AtomicBool,
    collide_next_token: AtomicBool,
    latency_ms: AtomicU64,
}

impl InMemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_auth_store(self: &Arc<Self>) -> AuthStore {
        AuthStore {
            users: self.clone(),
            magic_links: self.clone(),
        }
    }

    /// Makes `record_login` fail inside subsequent redemptions.
    pub fn fail_record_login(&self, fail: bool) {
        self.fail_record_login.store(fail, Ordering::SeqCst);
    }

    /// The next `insert` behaves as if another request created the same
    /// account first: the account appears and the insert reports a conflict.
    pub fn race_next_insert(&self, race: bool) {
        self.race_next_insert.store(race, Ordering::SeqCst);
    }

    /// The next `create_magic_link` reports a duplicate digest.
    pub fn collide_next_token(&self, collide: bool) {
        self.collide_next_token.store(collide, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: std::time::Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn user_count(&self) -> usize {
        self.state.lock().unwrap().users.len()
    }

    pub fn token_count(&self) -> usize {
        self.state.lock().unwrap().tokens.len()
    }

    pub fn consumed_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .tokens
            .values()
            .filter(|t| t.consumed_at.is_some())
            .count()
    }

    pub fn tokens(&self) -> Vec<MagicLinkToken> {
        self.state.lock().unwrap().tokens.values().cloned().collect()
    }

    pub fn user_id_for(&self, email: &str) -> Option<Uuid> {
        self.state
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.email == email)
            .map(|u| u.id)
    }

    pub fn last_login_of(&self, user_id: Uuid) -> Option<DateTime<Utc>> {
        self.state
            .lock()
            .unwrap()
            .users
            .get(&user_id)
            .and_then(|u| u.last_login_at)
    }

    async fn simulate_latency(&self) {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        }
    }

    fn insert_user(state: &mut StoreState, email: &str, now: DateTime<Utc>) -> Uuid {
        let user = UserProfile {
            id: Uuid::new_v4(),
            email: email.to_string(),
            created_at: now,
            last_login_at: None,
        };
        let id = user.id;
        state.users.insert(id, user);
        id
    }
}

#[async_trait]
impl UserRepo for InMemoryAuthStore {
    async fn find_id_by_email(&self, email: &str) -> AppResult<Option<Uuid>> {
        self.simulate_latency().await;
        Ok(self.user_id_for(email))
    }

    async fn insert(&self, email: &str, now: DateTime<Utc>) -> AppResult<Uuid> {
        self.simulate_latency().await;
        let mut state = self.state.lock().unwrap();

        if self.race_next_insert.swap(false, Ordering::SeqCst) {
            Self::insert_user(&mut state, email, now);
            return Err(AppError::Conflict);
        }
        if state.users.values().any(|u| u.email == email) {
            return Err(AppError::Conflict);
        }
        Ok(Self::insert_user(&mut state, email, now))
    }
}

#[async_trait]
impl MagicLinkRepo for InMemoryAuthStore {
    async fn create_magic_link(
        &self,
        user_id: Uuid,
        token_hash: &TokenDigest,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Uuid> {
        self.simulate_latency().await;
        let mut state = self.state.lock().unwrap();

        if !state.users.contains_key(&user_id) {
            return Err(AppError::Database("foreign key violation".into()));
        }
        if self.collide_next_token.swap(false, Ordering::SeqCst)
            || state.tokens.values().any(|t| t.token_hash == *token_hash)
        {
            return Err(AppError::Conflict);
        }

        let token = MagicLinkToken {
            id: Uuid::new_v4(),
            user_id,
            token_hash: *token_hash,
            expires_at,
            consumed_at: None,
            created_at: now,
        };
        let id = token.id;
        state.tokens.insert(id, token);
        Ok(id)
    }

    async fn begin_redemption(&self) -> AppResult<Box<dyn RedemptionTx>> {
        self.simulate_latency().await;
        let guard = self.redemption_lock.clone().lock_owned().await;
        Ok(Box::new(InMemoryRedemptionTx {
            _guard: guard,
            state: self.state.clone(),
            fail_record_login: self.fail_record_login.load(Ordering::SeqCst),
            consumed: None,
            login: None,
        }))
    }
}

pub struct InMemoryRedemptionTx {
    _guard: OwnedMutexGuard<()>,
    state: Arc<Mutex<StoreState>>,
    fail_record_login: bool,
    consumed: Option<(Uuid, DateTime<Utc>)>,
    login: Option<(Uuid, DateTime<Utc>)>,
}

#[async_trait]
impl RedemptionTx for InMemoryRedemptionTx {
    async fn lock_redeemable(
        &mut self,
        token_hash: &TokenDigest,
        now: DateTime<Utc>,
    ) -> AppResult<Option<MagicLinkClaim>> {
        let state = self.state.lock().unwrap();
        let claim = state
            .tokens
            .values()
            .find(|t| t.token_hash == *token_hash && t.is_redeemable(now))
            .map(|t| MagicLinkClaim {
                token_id: t.id,
                user_id: t.user_id,
            });
        Ok(claim)
    }

    async fn mark_consumed(&mut self, token_id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        let state = self.state.lock().unwrap();
        match state.tokens.get(&token_id) {
            Some(t) if t.consumed_at.is_none() && self.consumed.is_none() => {
                self.consumed = Some((token_id, now));
                Ok(())
            }
            _ => Err(AppError::InvalidToken),
        }
    }

    async fn record_login(&mut self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        if self.fail_record_login {
            return Err(AppError::Database("injected record_login failure".into()));
        }
        self.login = Some((user_id, now));
        Ok(())
    }

    async fn email_of(&mut self, user_id: Uuid) -> AppResult<String> {
        let state = self.state.lock().unwrap();
        let email = state.users.get(&user_id).map(|u| u.email.clone());
        email.ok_or_else(|| AppError::Database("user row missing".into()))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some((token_id, at)) = self.consumed {
            if let Some(token) = state.tokens.get_mut(&token_id) {
                token.consumed_at = Some(at);
            }
        }
        if let Some((user_id, at)) = self.login {
            if let Some(user) = state.users.get_mut(&user_id) {
                user.last_login_at = Some(at);
            }
        }
        Ok(())
    }
}
