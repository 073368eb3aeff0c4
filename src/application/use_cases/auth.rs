use std::{future::Future, sync::Arc, time::Duration as StdDuration};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        clock::Clock,
        token::{self, TokenDigest},
        validators::normalize_email,
    },
};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_id_by_email(&self, email: &str) -> AppResult<Option<Uuid>>;
    /// Fails with `AppError::Conflict` when the email is already taken.
    async fn insert(&self, email: &str, now: DateTime<Utc>) -> AppResult<Uuid>;
}

#[async_trait]
pub trait MagicLinkRepo: Send + Sync {
    async fn create_magic_link(
        &self,
        user_id: Uuid,
        token_hash: &TokenDigest,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Uuid>;

    async fn begin_redemption(&self) -> AppResult<Box<dyn RedemptionTx>>;
}

/// One redemption unit of work. Dropping it without `commit` rolls back.
#[async_trait]
pub trait RedemptionTx: Send {
    /// Locks the token row if it is still redeemable at `now`.
    async fn lock_redeemable(
        &mut self,
        token_hash: &TokenDigest,
        now: DateTime<Utc>,
    ) -> AppResult<Option<MagicLinkClaim>>;
    async fn mark_consumed(&mut self, token_id: Uuid, now: DateTime<Utc>) -> AppResult<()>;
    async fn record_login(&mut self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<()>;
    async fn email_of(&mut self, user_id: Uuid) -> AppResult<String>;
    async fn commit(self: Box<Self>) -> AppResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicLinkClaim {
    pub token_id: Uuid,
    pub user_id: Uuid,
}

/// The durable store behind the auth flows.
#[derive(Clone)]
pub struct AuthStore {
    pub users: Arc<dyn UserRepo>,
    pub magic_links: Arc<dyn MagicLinkRepo>,
}

#[derive(Clone, Debug)]
pub struct MagicLinkSettings {
    pub ttl: Duration,
    pub base_url: Url,
    /// Echo the login link in responses and logs. Development only.
    pub expose_dev_link: bool,
    pub request_timeout: StdDuration,
}

#[derive(Debug, Default)]
pub struct IssuedMagicLink {
    pub dev_login_url: Option<String>,
}

#[derive(Debug)]
pub struct RedeemedSession {
    pub access_token: SecretString,
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Clone)]
pub struct AuthUseCases {
    store: Option<AuthStore>,
    clock: Arc<dyn Clock>,
    settings: MagicLinkSettings,
}

impl AuthUseCases {
    pub fn new(
        store: Option<AuthStore>,
        clock: Arc<dyn Clock>,
        settings: MagicLinkSettings,
    ) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    fn store(&self) -> AppResult<&AuthStore> {
        self.store.as_ref().ok_or(AppError::Unavailable)
    }

    async fn within_deadline<T>(&self, fut: impl Future<Output = AppResult<T>>) -> AppResult<T> {
        match tokio::time::timeout(self.settings.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    timeout_ms = self.settings.request_timeout.as_millis() as u64,
                    "store interaction exceeded request deadline"
                );
                Err(AppError::Unavailable)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn request_magic_link(&self, email: &str) -> AppResult<IssuedMagicLink> {
        let store = self.store()?;
        let email = normalize_email(email)
            .ok_or_else(|| AppError::InvalidInput("email is required".into()))?;

        let (user_id, secret) = self
            .within_deadline(async {
                let user_id =
                    resolve_account(store.users.as_ref(), &email, self.clock.now()).await?;
                let generated = token::generate()?;
                let now = self.clock.now();
                let expires_at = now
                    .checked_add_signed(self.settings.ttl)
                    .ok_or_else(|| {
                        AppError::Internal("magic link expiry out of range".into())
                    })?;
                store
                    .magic_links
                    .create_magic_link(user_id, &generated.digest, expires_at, now)
                    .await
                    .map_err(|e| match e {
                        AppError::Conflict => {
                            AppError::Internal("magic link digest collision".into())
                        }
                        other => other,
                    })?;
                Ok::<_, AppError>((user_id, generated.secret))
            })
            .await?;

        if !self.settings.expose_dev_link {
            info!(%user_id, %email, "magic link requested");
            return Ok(IssuedMagicLink::default());
        }

        let link = self.login_url(&secret);
        info!(%user_id, %email, link = %link, "dev magic link");
        Ok(IssuedMagicLink {
            dev_login_url: Some(link),
        })
    }

    #[instrument(skip_all)]
    pub async fn redeem_magic_link(&self, secret: &str) -> AppResult<RedeemedSession> {
        let store = self.store()?;
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(AppError::InvalidInput("token is required".into()));
        }
        let token_hash = token::digest(secret);

        let (user_id, email) = self
            .within_deadline(redeem_in_tx(
                store.magic_links.as_ref(),
                &token_hash,
                self.clock.as_ref(),
            ))
            .await?;

        // Bearer only: the digest of the access credential is not kept.
        let access = token::generate()?;
        info!(%user_id, "magic link redeemed");
        Ok(RedeemedSession {
            access_token: access.secret,
            user_id,
            email,
        })
    }

    fn login_url(&self, secret: &SecretString) -> String {
        let mut url = self.settings.base_url.clone();
        url.query_pairs_mut()
            .append_pair("token", secret.expose_secret());
        url.to_string()
    }
}

/// Maps a normalized email to its account, creating the account on first use.
/// A concurrent insert for the same email is resolved by looking it up again.
pub async fn resolve_account(
    users: &dyn UserRepo,
    email: &str,
    now: DateTime<Utc>,
) -> AppResult<Uuid> {
    if let Some(id) = users.find_id_by_email(email).await? {
        return Ok(id);
    }
    match users.insert(email, now).await {
        Ok(id) => Ok(id),
        Err(AppError::Conflict) => users
            .find_id_by_email(email)
            .await?
            .ok_or_else(|| AppError::Internal("account vanished after conflict".into())),
        Err(e) => Err(e),
    }
}

async fn redeem_in_tx(
    magic_links: &dyn MagicLinkRepo,
    token_hash: &TokenDigest,
    clock: &dyn Clock,
) -> AppResult<(Uuid, String)> {
    let mut tx = magic_links.begin_redemption().await?;
    let now = clock.now();

    let claim = tx
        .lock_redeemable(token_hash, now)
        .await?
        .ok_or(AppError::InvalidToken)?;
    tx.mark_consumed(claim.token_id, now).await?;
    tx.record_login(claim.user_id, now).await?;
    let email = tx.email_of(claim.user_id).await?;
    tx.commit().await?;

    Ok((claim.user_id, email))
}
