use crate::dao;
use crate::error::UrlError;
use crate::model::{ShortenedUrl, VisitErrorCode, VisitOutcome};
use crate::storage::UrlCoreService;
use chrono::{DateTime, Utc};
use std::sync::Arc;

enum VisitLog {
    Missing,
    /// A once-only url whose counter was already past zero when we got the row lock.
    Exhausted,
    Endpoint(String),
}

/// Applies the access policy of a url and logs successful visits.
pub struct UrlVisitService {
    core: Arc<UrlCoreService>,
}

impl UrlVisitService {
    pub fn new(core: Arc<UrlCoreService>) -> Self {
        Self { core }
    }

    pub fn core(&self) -> &UrlCoreService {
        &self.core
    }

    pub async fn attempt_visit(&self, path: &str, password: Option<&str>) -> Result<VisitOutcome, UrlError> {
        self.attempt_visit_at(path, password, Utc::now()).await
    }

    /// Same as [`attempt_visit`](Self::attempt_visit) with an explicit clock.
    /// The counter is only touched once every policy check has passed.
    pub async fn attempt_visit_at(
        &self,
        path: &str,
        password: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<VisitOutcome, UrlError> {
        let password = password.filter(|password| !password.is_empty());
        let Some(url) = self.core.resolve(path).await? else {
            return Ok(reject(path, VisitErrorCode::NotFound));
        };
        if let Err(code) = check_access(&url, password, now) {
            return Ok(reject(path, code));
        }
        if let Some(password) = password {
            if !self.core.matches_password(path, password).await? {
                return Ok(reject(path, VisitErrorCode::WrongPassword));
            }
        }
        Ok(match self.log_visit(path, url.once).await? {
            VisitLog::Endpoint(endpoint) => VisitOutcome::Success {
                endpoint,
                secure: url.secure.unwrap_or(false),
            },
            VisitLog::Exhausted => reject(path, VisitErrorCode::Expired),
            VisitLog::Missing => reject(path, VisitErrorCode::EndpointError),
        })
    }

    /// Increments the visit counter of `path` and returns its decrypted
    /// endpoint, or `None` for an unknown path. No policy is checked here.
    ///
    /// The increment and the decryption share one transaction: if decryption
    /// fails the increment is rolled back before the error is returned.
    pub async fn log_visit_and_decrypt_endpoint(&self, path: &str) -> Result<Option<String>, UrlError> {
        Ok(match self.log_visit(path, false).await? {
            VisitLog::Endpoint(endpoint) => Some(endpoint),
            VisitLog::Exhausted | VisitLog::Missing => None,
        })
    }

    async fn log_visit(&self, path: &str, once: bool) -> Result<VisitLog, UrlError> {
        let mut tx = self.core.pool().begin().await?;
        let Some(visit) = dao::increment_visits(&mut *tx, path).await? else {
            return Ok(VisitLog::Missing);
        };
        if once && visit.visits != 1 {
            tx.rollback().await?;
            return Ok(VisitLog::Exhausted);
        }
        match self
            .core
            .crypto()
            .decrypt_stored(&visit.encrypted_endpoint, &visit.crypto_seed)
        {
            Ok(endpoint) => {
                tx.commit().await?;
                tracing::debug!(path = %path, visits = visit.visits, "Visit logged");
                Ok(VisitLog::Endpoint(endpoint))
            }
            Err(err) => {
                tracing::error!(path = %path, "Endpoint decryption failed, rolling back visit: {}", err);
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(path = %path, "Rolling back visit failed: {}", rollback_err);
                }
                Err(err.into())
            }
        }
    }
}

/// The policy checks that need nothing but the public projection, in the
/// order they apply. The stored password itself is verified afterwards.
pub fn check_access(url: &ShortenedUrl, password: Option<&str>, now: DateTime<Utc>) -> Result<(), VisitErrorCode> {
    if url.disabled {
        return Err(VisitErrorCode::NotFound);
    }
    if url.once && url.visits != 0 {
        return Err(VisitErrorCode::Expired);
    }
    if url.expiration.is_some_and(|expiration| now > expiration) {
        return Err(VisitErrorCode::Expired);
    }
    if url.has_password && password.is_none() {
        return Err(VisitErrorCode::WrongPassword);
    }
    Ok(())
}

fn reject(path: &str, code: VisitErrorCode) -> VisitOutcome {
    tracing::debug!(path = %path, code = code.as_str(), "Visit rejected");
    code.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn url() -> ShortenedUrl {
        let created_at = Utc::now();
        ShortenedUrl {
            id: 1,
            path: "demo".into(),
            expiration: None,
            visits: 0,
            once: false,
            disabled: false,
            secure: None,
            created_at,
            updated_at: created_at,
            has_password: false,
        }
    }

    #[test]
    fn open_url_passes() {
        assert_eq!(check_access(&url(), None, Utc::now()), Ok(()));
    }

    #[test]
    fn disabled_wins_over_everything_else() {
        let now = Utc::now();
        let url = ShortenedUrl {
            disabled: true,
            once: true,
            visits: 3,
            expiration: Some(now - TimeDelta::minutes(1)),
            has_password: true,
            ..url()
        };
        assert_eq!(check_access(&url, None, now), Err(VisitErrorCode::NotFound));
    }

    #[test]
    fn used_once_url_is_expired_regardless_of_password() {
        let url = ShortenedUrl {
            once: true,
            visits: 1,
            has_password: true,
            ..url()
        };
        assert_eq!(check_access(&url, None, Utc::now()), Err(VisitErrorCode::Expired));
        assert_eq!(check_access(&url, Some("secret"), Utc::now()), Err(VisitErrorCode::Expired));

        let fresh = ShortenedUrl { visits: 0, ..url };
        assert_eq!(check_access(&fresh, Some("secret"), Utc::now()), Ok(()));
    }

    #[test]
    fn expiration_is_strictly_after() {
        let expiration = Utc::now();
        let url = ShortenedUrl {
            expiration: Some(expiration),
            ..url()
        };
        assert_eq!(check_access(&url, None, expiration - TimeDelta::seconds(1)), Ok(()));
        assert_eq!(check_access(&url, None, expiration), Ok(()));
        assert_eq!(
            check_access(&url, None, expiration + TimeDelta::milliseconds(1)),
            Err(VisitErrorCode::Expired)
        );
    }

    #[test]
    fn expired_is_reported_before_missing_password() {
        let now = Utc::now();
        let url = ShortenedUrl {
            expiration: Some(now - TimeDelta::minutes(1)),
            has_password: true,
            ..url()
        };
        assert_eq!(check_access(&url, None, now), Err(VisitErrorCode::Expired));
    }

    #[test]
    fn password_protected_url_requires_password() {
        let url = ShortenedUrl {
            has_password: true,
            ..url()
        };
        assert_eq!(check_access(&url, None, Utc::now()), Err(VisitErrorCode::WrongPassword));
        // correctness of the password is verified against storage later
        assert_eq!(check_access(&url, Some("anything"), Utc::now()), Ok(()));
    }
}
