use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use speakerbob_provider::{LookupField, Record};
use uuid::Uuid;

use crate::new_id;

/// An external identity bound to a user: `<provider>://<provider user id>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(provider: &str, user_id: &str) -> Self {
        Self(format!("{provider}://{user_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub email: String,
    #[serde(default)]
    pub principals: Vec<Principal>,
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
}

impl User {
    pub const EMAIL: &'static str = "email";
    pub const PRINCIPALS: &'static str = "principals";

    pub fn new() -> Self {
        Self {
            id: new_id(),
            created_at: Utc::now(),
            email: String::new(),
            principals: Vec::new(),
            preferences: BTreeMap::new(),
        }
    }
}

impl Default for User {
    fn default() -> Self {
        Self::new()
    }
}

fn user_email(user: &User) -> Vec<String> {
    vec![user.email.clone()]
}

fn user_principals(user: &User) -> Vec<String> {
    user.principals.iter().map(Principal::to_string).collect()
}

impl Record for User {
    const PACKAGE: &'static str = "auth";
    const TYPE_NAME: &'static str = "User";
    const LOOKUPS: &'static [LookupField<Self>] = &[
        LookupField::single(User::EMAIL, user_email),
        LookupField::multi(User::PRINCIPALS, user_principals),
    ];

    fn key(&self) -> &str {
        &self.id
    }
}

/// How a token is presented by the client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    #[default]
    Invalid,
    /// Browser session cookie.
    Session,
    /// `Authorization: Bearer` header, for API clients.
    Bearer,
    /// Short-lived query parameter for websocket upgrades.
    Websocket,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub name: String,
    /// The secret presented by clients.
    pub token: String,
    pub token_type: TokenType,
    pub user_id: String,
    /// `None` for tokens that never expire.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    pub const TOKEN: &'static str = "token";

    /// A new token for `user_id` with a random secret, expiring after `ttl`
    /// when one is given.
    pub fn new(user_id: &str, token_type: TokenType, ttl: Option<Duration>) -> Self {
        let created_at = Utc::now();
        Self {
            id: new_id(),
            created_at,
            name: String::new(),
            token: Uuid::new_v4().simple().to_string(),
            token_type,
            user_id: user_id.to_string(),
            expires_at: ttl.map(|ttl| created_at + ttl),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

fn token_secret(token: &Token) -> Vec<String> {
    vec![token.token.clone()]
}

impl Record for Token {
    const PACKAGE: &'static str = "auth";
    const TYPE_NAME: &'static str = "Token";
    const LOOKUPS: &'static [LookupField<Self>] = &[LookupField::single(Token::TOKEN, token_secret)];

    fn key(&self) -> &str {
        &self.id
    }
}
