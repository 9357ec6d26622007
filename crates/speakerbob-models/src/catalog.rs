//! One provider per entity type over a shared durable store.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use speakerbob_provider::Provider;
use speakerbob_store::{ensure_schema_version, DurableStore};
use tracing::{debug, info};

use crate::auth::{Token, User};
use crate::error::{ModelError, ModelResult};
use crate::sound::{Group, Sound};

/// Schema version stamped into the store's meta region.
pub const SCHEMA_VERSION: u32 = 1;

/// Group names must be shorter than this many characters.
pub const GROUP_NAME_LIMIT: usize = 30;
pub const GROUP_MIN_SOUNDS: usize = 2;

/// How long an unnamed upload survives before it is swept.
pub fn hidden_sound_ttl() -> Duration {
    Duration::hours(24)
}

pub struct Catalog {
    store: Arc<dyn DurableStore>,
    pub sounds: Provider<Sound>,
    pub groups: Provider<Group>,
    pub users: Provider<User>,
    pub tokens: Provider<Token>,
}

impl Catalog {
    /// Verify (or stamp) the schema version, then load every provider's
    /// mirror from the store. Fails on the first unreadable record.
    pub fn open(store: Arc<dyn DurableStore>) -> ModelResult<Self> {
        ensure_schema_version(store.as_ref(), SCHEMA_VERSION)?;

        let catalog = Self {
            sounds: Provider::new(Arc::clone(&store))?,
            groups: Provider::new(Arc::clone(&store))?,
            users: Provider::new(Arc::clone(&store))?,
            tokens: Provider::new(Arc::clone(&store))?,
            store,
        };
        catalog.sounds.initialize()?;
        catalog.groups.initialize()?;
        catalog.users.initialize()?;
        catalog.tokens.initialize()?;

        info!(
            sounds = catalog.sounds.len(),
            groups = catalog.groups.len(),
            users = catalog.users.len(),
            tokens = catalog.tokens.len(),
            "catalog opened"
        );
        Ok(catalog)
    }

    pub fn close(&self) -> ModelResult<()> {
        self.store.close()?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sounds and groups
    // -----------------------------------------------------------------------

    /// Sounds that have been named and are ready to play.
    pub fn visible_sounds(&self) -> Vec<Arc<Sound>> {
        self.sounds.list().into_iter().filter(|sound| !sound.hidden).collect()
    }

    /// Groups that play `sound_id`.
    pub fn groups_containing(&self, sound_id: &str) -> Vec<Arc<Group>> {
        self.groups
            .list()
            .into_iter()
            .filter(|group| group.contains(sound_id))
            .collect()
    }

    /// Delete a sound and every group that plays it. Groups go first so a
    /// failure part way never leaves a group pointing at a missing sound.
    /// Returns the deleted groups.
    pub fn delete_sound_with_groups(&self, sound_id: &str) -> ModelResult<Vec<Arc<Group>>> {
        if self.sounds.get(sound_id).is_none() {
            return Err(ModelError::NotFound { entity: "sound", id: sound_id.to_string() });
        }

        let groups = self.groups_containing(sound_id);
        let group_ids: Vec<&str> = groups.iter().map(|group| group.id.as_str()).collect();
        self.groups.delete_ids(&group_ids)?;
        self.sounds.delete_ids(&[sound_id])?;

        info!(sound_id, groups = groups.len(), "deleted sound");
        Ok(groups)
    }

    /// Delete hidden sounds created more than `ttl` before `now`.
    pub fn expire_hidden_sounds(&self, now: DateTime<Utc>, ttl: Duration) -> ModelResult<usize> {
        let cutoff = now - ttl;
        let expired: Vec<Arc<Sound>> = self
            .sounds
            .list()
            .into_iter()
            .filter(|sound| sound.hidden && sound.created_at < cutoff)
            .collect();
        if expired.is_empty() {
            return Ok(0);
        }

        let ids: Vec<&str> = expired.iter().map(|sound| sound.id.as_str()).collect();
        self.sounds.delete_ids(&ids)?;
        info!(count = ids.len(), "expired hidden sounds");
        Ok(ids.len())
    }

    /// Check a group before it is saved: a non-empty name shorter than
    /// [`GROUP_NAME_LIMIT`] characters and at least two sounds, all of which
    /// exist.
    pub fn validate_group(&self, group: &Group) -> ModelResult<()> {
        let name_len = group.name.chars().count();
        if name_len == 0 || name_len >= GROUP_NAME_LIMIT {
            return Err(invalid_group(format!(
                "name must be 1 to {} characters, got {name_len}",
                GROUP_NAME_LIMIT - 1
            )));
        }
        if group.sound_ids.len() < GROUP_MIN_SOUNDS {
            return Err(invalid_group(format!(
                "needs at least {GROUP_MIN_SOUNDS} sounds, got {}",
                group.sound_ids.len()
            )));
        }
        if let Some(missing) = group.sound_ids.iter().find(|id| self.sounds.get(id).is_none()) {
            return Err(invalid_group(format!("unknown sound {missing}")));
        }
        Ok(())
    }

    /// Validate and persist a group, recomputing its duration from its sounds.
    pub fn save_group(&self, group: &mut Group) -> ModelResult<()> {
        self.validate_group(group)?;
        group.duration_ms = self.group_sounds(group).iter().map(|sound| sound.duration_ms).sum();
        self.groups.save(group)?;
        debug!(group_id = %group.id, "saved group");
        Ok(())
    }

    /// The group's sounds in play order. Ids no longer present are skipped.
    pub fn group_sounds(&self, group: &Group) -> Vec<Arc<Sound>> {
        group.sound_ids.iter().filter_map(|id| self.sounds.get(id)).collect()
    }

    // -----------------------------------------------------------------------
    // Users and tokens
    // -----------------------------------------------------------------------

    pub fn user_by_email(&self, email: &str) -> ModelResult<Option<Arc<User>>> {
        Ok(self.users.get_by(User::EMAIL, email)?)
    }

    pub fn user_by_principal(&self, principal: &str) -> ModelResult<Option<Arc<User>>> {
        Ok(self.users.get_by(User::PRINCIPALS, principal)?)
    }

    /// Resolve a presented secret to a live token. Expired tokens resolve to
    /// `None`.
    pub fn token_by_secret(&self, secret: &str, now: DateTime<Utc>) -> ModelResult<Option<Arc<Token>>> {
        let token = self.tokens.get_by(Token::TOKEN, secret)?;
        Ok(token.filter(|token| !token.is_expired(now)))
    }

    /// Tokens issued to `user_id`.
    pub fn user_tokens(&self, user_id: &str) -> Vec<Arc<Token>> {
        self.tokens
            .list()
            .into_iter()
            .filter(|token| token.user_id == user_id)
            .collect()
    }

    /// Delete every token expired as of `now`.
    pub fn purge_expired_tokens(&self, now: DateTime<Utc>) -> ModelResult<usize> {
        let expired: Vec<Arc<Token>> = self
            .tokens
            .list()
            .into_iter()
            .filter(|token| token.is_expired(now))
            .collect();
        if expired.is_empty() {
            return Ok(0);
        }

        let ids: Vec<&str> = expired.iter().map(|token| token.id.as_str()).collect();
        self.tokens.delete_ids(&ids)?;
        info!(count = ids.len(), "purged expired tokens");
        Ok(ids.len())
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("sounds", &self.sounds.len())
            .field("groups", &self.groups.len())
            .field("users", &self.users.len())
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

fn invalid_group(reason: String) -> ModelError {
    ModelError::Validation { entity: "group", reason }
}
