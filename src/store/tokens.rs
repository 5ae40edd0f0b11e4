use std::fmt;

use anyhow::Context;
use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::{FromRow, PgPool};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Capability granted to a bearer token. The set is closed; anything else in
/// a stored scope string is ignored on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scope {
    Auth,
    Books,
    Wishlist,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::Auth, Scope::Books, Scope::Wishlist];

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Auth => "auth",
            Scope::Books => "books",
            Scope::Wishlist => "wishlist",
        }
    }

    pub fn parse(raw: &str) -> Option<Scope> {
        match raw {
            "auth" => Some(Scope::Auth),
            "books" => Some(Scope::Books),
            "wishlist" => Some(Scope::Wishlist),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, deduplicated set of scopes, persisted as a comma-joined string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScopeSet(Vec<Scope>);

impl ScopeSet {
    /// Everything a login token is granted.
    pub fn all() -> Self {
        ScopeSet(Scope::ALL.to_vec())
    }

    pub fn contains(&self, scope: Scope) -> bool {
        self.0.contains(&scope)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses the stored representation. Unknown entries are dropped rather
    /// than rejected so a widened scope vocabulary stays backward readable.
    pub fn parse(raw: &str) -> Self {
        let mut scopes: Vec<Scope> = raw
            .split(',')
            .filter_map(|part| Scope::parse(part.trim()))
            .collect();
        scopes.sort();
        scopes.dedup();
        ScopeSet(scopes)
    }

    pub fn to_db_string(&self) -> String {
        self.0
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl From<Scope> for ScopeSet {
    fn from(scope: Scope) -> Self {
        ScopeSet(vec![scope])
    }
}

impl FromIterator<Scope> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
        let mut scopes: Vec<Scope> = iter.into_iter().collect();
        scopes.sort();
        scopes.dedup();
        ScopeSet(scopes)
    }
}

const TOKEN_BYTES: usize = 32;

/// A freshly issued token. The plaintext leaves the process exactly once, in
/// the login response; only the fingerprint is ever stored.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip_serializing)]
    pub hash: Vec<u8>,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry: OffsetDateTime,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub scope: ScopeSet,
}

/// A stored token row as seen at resolution time. Never carries plaintext.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub hash: Vec<u8>,
    pub user_id: Uuid,
    pub expiry: OffsetDateTime,
    pub scope: ScopeSet,
}

/// SHA-256 content fingerprint of a token plaintext. Lookups compare digests,
/// never the raw secret.
pub fn fingerprint(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

/// Generates a token with 256 bits of entropy, base64url-encoded without
/// padding.
pub fn generate(user_id: Uuid, scope: ScopeSet, ttl: Duration) -> Token {
    let mut raw = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut raw);

    let plaintext = Base64UrlUnpadded::encode_string(&raw);
    let hash = fingerprint(&plaintext);

    Token {
        plaintext,
        hash,
        expiry: OffsetDateTime::now_utc() + ttl,
        user_id,
        scope,
    }
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Issues a new token for the user. The returned value is the only copy
    /// of the plaintext.
    async fn create(&self, user_id: Uuid, scope: ScopeSet, ttl: Duration) -> anyhow::Result<Token>;

    /// Resolves a presented plaintext to its stored record. Unknown or
    /// expired tokens resolve to `None`.
    async fn resolve(&self, plaintext: &str) -> anyhow::Result<Option<TokenRecord>>;

    /// Deletes every token of the user whose granted set contains `scope`.
    /// Revoking nothing is a no-op.
    async fn revoke_all(&self, user_id: Uuid, scope: Scope) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PostgresTokenStore {
    db: PgPool,
}

impl PostgresTokenStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(FromRow)]
struct TokenRow {
    hash: Vec<u8>,
    user_id: Uuid,
    expiry: OffsetDateTime,
    scope: String,
}

#[async_trait]
impl TokenStore for PostgresTokenStore {
    async fn create(&self, user_id: Uuid, scope: ScopeSet, ttl: Duration) -> anyhow::Result<Token> {
        let token = generate(user_id, scope, ttl);

        sqlx::query(
            r#"
            INSERT INTO tokens (hash, user_id, expiry, scope)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&token.hash)
        .bind(token.user_id)
        .bind(token.expiry)
        .bind(token.scope.to_db_string())
        .execute(&self.db)
        .await
        .context("insert token")?;

        Ok(token)
    }

    async fn resolve(&self, plaintext: &str) -> anyhow::Result<Option<TokenRecord>> {
        let hash = fingerprint(plaintext);

        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT hash, user_id, expiry, scope
            FROM tokens
            WHERE hash = $1 AND expiry > now()
            "#,
        )
        .bind(&hash)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| TokenRecord {
            hash: r.hash,
            user_id: r.user_id,
            expiry: r.expiry,
            scope: ScopeSet::parse(&r.scope),
        }))
    }

    async fn revoke_all(&self, user_id: Uuid, scope: Scope) -> anyhow::Result<()> {
        // Exact set-membership on the comma-joined column; a substring match
        // would let "auth" shadow any scope name containing it.
        sqlx::query(
            r#"
            DELETE FROM tokens
            WHERE user_id = $1 AND $2 = ANY(string_to_array(scope, ','))
            "#,
        )
        .bind(user_id)
        .bind(scope.as_str())
        .execute(&self.db)
        .await?;

        Ok(())
    }
}
