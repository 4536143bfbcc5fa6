use serde::Deserialize;

/// Profile attributes as the provider hands them out.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserInfo {
    #[serde(deserialize_with = "de_pk")]
    pub pk: u64,
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub media_count: u64,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub biography: String,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_private: bool,
}

/// The provider sends `pk` as a number on some endpoints and as a string on others.
fn de_pk<'de, D>(deserializer: D) -> core::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Pk {
        Num(u64),
        Str(String),
    }

    match Pk::deserialize(deserializer)? {
        Pk::Num(n) => Ok(n),
        Pk::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// A successfully scraped profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRecord {
    pub profile_url: String,
    pub profile_name: String,
    pub instagram_id: u64,
    pub full_name: String,
    pub posts_count: u64,
    pub followers_count: u64,
    pub following_count: u64,
    pub bio: String,
    pub verified: bool,
    pub private: bool,
}

impl ProfileRecord {
    pub fn from_user_info(profile_url: impl Into<String>, info: UserInfo) -> Self {
        Self {
            profile_url: profile_url.into(),
            profile_name: info.username,
            instagram_id: info.pk,
            full_name: info.full_name,
            posts_count: info.media_count,
            followers_count: info.follower_count,
            following_count: info.following_count,
            bio: info.biography,
            verified: info.is_verified,
            private: info.is_private,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchFailure {
    pub profile_url: String,
    pub error: String,
}

impl FetchFailure {
    pub fn new(profile_url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            profile_url: profile_url.into(),
            error: error.into(),
        }
    }
}

/// What a single processed reference ends up as.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Profile(ProfileRecord),
    Failure(FetchFailure),
}

impl Outcome {
    pub fn profile_url(&self) -> &str {
        match self {
            Outcome::Profile(record) => &record.profile_url,
            Outcome::Failure(failure) => &failure.profile_url,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }
}
