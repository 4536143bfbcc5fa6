use async_trait::async_trait;

use crate::handle::extract_handle;
use crate::model::{FetchFailure, Outcome, ProfileRecord};
use crate::request::{Credentials, ProfileProvider};
use crate::{error_time, info_time, Result};

/// One fetch attempt for one reference.
///
/// `Ok` is terminal, whether it carries a profile or a failure.
/// `Err` means the attempt itself blew up (auth, client setup) and may be retried.
#[async_trait]
pub trait FetchProfile: Send + Sync {
    async fn fetch_profile(&self, reference: &str) -> Result<Outcome>;
}

pub struct ProfileFetcher<P> {
    provider: P,
    credentials: Credentials,
}

impl<P: ProfileProvider> ProfileFetcher<P> {
    pub fn new(provider: P, credentials: Credentials) -> Self {
        Self {
            provider,
            credentials,
        }
    }
}

#[async_trait]
impl<P: ProfileProvider> FetchProfile for ProfileFetcher<P> {
    async fn fetch_profile(&self, reference: &str) -> Result<Outcome> {
        let username = extract_handle(reference);
        if username.is_empty() {
            error_time!("Username is empty for profile URL: {reference}");
            return Ok(Outcome::Failure(FetchFailure::new(
                reference,
                "Username is empty",
            )));
        }

        let session = self.provider.login(&self.credentials).await?;

        match session.user_info_by_username(username).await {
            Ok(info) => {
                info_time!("scraping {username}, {reference}, 200");
                Ok(Outcome::Profile(ProfileRecord::from_user_info(
                    reference, info,
                )))
            }
            Err(e) => {
                error_time!("scraping {username}, {reference}, 404: {e}");
                Ok(Outcome::Failure(FetchFailure::new(reference, e.to_string())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::model::UserInfo;
    use crate::request::ProviderSession;
    use crate::Error;

    #[derive(Default)]
    struct Calls {
        logins: AtomicUsize,
        lookups: AtomicUsize,
    }

    struct FakeProvider {
        calls: Arc<Calls>,
        fail_login: bool,
    }

    struct FakeSession {
        calls: Arc<Calls>,
    }

    #[async_trait]
    impl ProfileProvider for FakeProvider {
        async fn login(&self, _credentials: &Credentials) -> Result<Box<dyn ProviderSession>> {
            self.calls.logins.fetch_add(1, Ordering::SeqCst);
            if self.fail_login {
                return Err(Error::InvalidSession);
            }
            Ok(Box::new(FakeSession {
                calls: self.calls.clone(),
            }))
        }
    }

    #[async_trait]
    impl ProviderSession for FakeSession {
        async fn user_info_by_username(&self, username: &str) -> Result<UserInfo> {
            self.calls.lookups.fetch_add(1, Ordering::SeqCst);
            if username == "ghost" {
                return Err(Error::UserNotFound(username.into()));
            }
            Ok(UserInfo {
                pk: 1,
                username: username.into(),
                full_name: "Full Name".into(),
                media_count: 2,
                follower_count: 3,
                following_count: 4,
                biography: String::new(),
                is_verified: false,
                is_private: true,
            })
        }
    }

    fn fetcher(fail_login: bool) -> (ProfileFetcher<FakeProvider>, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let provider = FakeProvider {
            calls: calls.clone(),
            fail_login,
        };
        let creds = Credentials::new("1%3Aabc").unwrap();
        (ProfileFetcher::new(provider, creds), calls)
    }

    #[tokio::test]
    async fn empty_handle_skips_provider() {
        let (fetcher, calls) = fetcher(false);
        let outcome = fetcher.fetch_profile("").await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Failure(FetchFailure::new("", "Username is empty"))
        );
        assert_eq!(calls.logins.load(Ordering::SeqCst), 0);
        assert_eq!(calls.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn success_maps_record() {
        let (fetcher, calls) = fetcher(false);
        let url = "https://www.instagram.com/someone/";
        let Outcome::Profile(rec) = fetcher.fetch_profile(url).await.unwrap() else {
            panic!("expected a profile");
        };
        assert_eq!(rec.profile_url, url);
        assert_eq!(rec.profile_name, "someone");
        assert!(rec.private);
        assert_eq!(calls.logins.load(Ordering::SeqCst), 1);
        assert_eq!(calls.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn lookup_error_is_returned_failure() {
        let (fetcher, _) = fetcher(false);
        let outcome = fetcher.fetch_profile("https://x/ghost").await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Failure(FetchFailure::new("https://x/ghost", "User not found: ghost"))
        );
    }

    #[tokio::test]
    async fn login_error_is_raised() {
        let (fetcher, calls) = fetcher(true);
        let res = fetcher.fetch_profile("https://x/someone").await;
        assert!(matches!(res, Err(Error::InvalidSession)));
        assert_eq!(calls.lookups.load(Ordering::SeqCst), 0);
    }
}
