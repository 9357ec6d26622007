//! Hierarchical byte keys.
//!
//! Every key starts with a one-byte region tag followed by length-prefixed
//! components, so keys are compared only by equality and byte prefix and
//! never need to be decoded:
//!
//! ```text
//! object: [0x01][u16 len][package][u16 len][type][u32 len][id]
//! field:  [0x02][u16 len][package][u16 len][type][u32 len][id][u16 len][field]
//! meta:   [0x00][name]
//! ```
//!
//! Because every variable-length component carries its length, the object
//! key of one id can never be a byte prefix of the object key of another id,
//! and field keys live in their own region so an object scan never visits
//! them. All lengths are big-endian.

use std::fmt;

use crate::error::{StoreError, StoreResult};

/// Region tag for store-level metadata (schema version and the like).
pub const META_REGION: u8 = 0x00;
/// Region tag for record metadata keys.
pub const OBJECT_REGION: u8 = 0x01;
/// Region tag for lazy field keys.
pub const FIELD_REGION: u8 = 0x02;

/// An opaque, fully encoded store key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Vec<u8>);

impl Key {
    /// Wrap already-encoded key bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// A key in the meta region.
    pub fn meta(name: &str) -> Self {
        let mut bytes = Vec::with_capacity(name.len() + 1);
        bytes.push(META_REGION);
        bytes.extend_from_slice(name.as_bytes());
        Self(bytes)
    }

    /// The raw encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns `true` if this key begins with `prefix`.
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.0.starts_with(prefix)
    }

    /// The region tag, if the key is non-empty.
    pub fn region(&self) -> Option<u8> {
        self.0.first().copied()
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", hex::encode(&self.0))
    }
}

/// Identifies an entity type: a package/type name pair.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TypeKey {
    package: String,
    name: String,
    // Length-prefixed package and type name, without a region tag.
    body: Vec<u8>,
}

impl TypeKey {
    /// Build a type key. Fails if either component exceeds `u16::MAX` bytes.
    pub fn new(package: &str, name: &str) -> StoreResult<Self> {
        let mut body = Vec::with_capacity(package.len() + name.len() + 4);
        push_u16_prefixed(&mut body, "package", package.as_bytes())?;
        push_u16_prefixed(&mut body, "type name", name.as_bytes())?;
        Ok(Self {
            package: package.to_string(),
            name: name.to_string(),
            body,
        })
    }

    /// Scan prefix matching every object key of this type and nothing else.
    pub fn object_prefix(&self) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(self.body.len() + 1);
        prefix.push(OBJECT_REGION);
        prefix.extend_from_slice(&self.body);
        prefix
    }

    /// The object key for record `id` of this type.
    pub fn object(&self, id: &str) -> StoreResult<ObjectKey> {
        let mut bytes = self.object_prefix();
        let len = u32::try_from(id.len())
            .map_err(|_| StoreError::InvalidKey(format!("id is {} bytes long", id.len())))?;
        bytes.extend_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(id.as_bytes());
        Ok(ObjectKey {
            key: Key(bytes),
        })
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({}.{})", self.package, self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.package, self.name)
    }
}

/// Key of a single record's metadata.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    key: Key,
}

impl ObjectKey {
    pub fn as_bytes(&self) -> &[u8] {
        self.key.as_bytes()
    }

    pub fn as_key(&self) -> &Key {
        &self.key
    }

    /// The key of lazy field `field` belonging to this record.
    pub fn field(&self, field: &str) -> StoreResult<FieldKey> {
        let object = self.key.as_bytes();
        let mut bytes = Vec::with_capacity(object.len() + field.len() + 2);
        bytes.push(FIELD_REGION);
        bytes.extend_from_slice(&object[1..]);
        push_u16_prefixed(&mut bytes, "field name", field.as_bytes())?;
        Ok(FieldKey { key: Key(bytes) })
    }
}

impl From<ObjectKey> for Key {
    fn from(key: ObjectKey) -> Self {
        key.key
    }
}

/// Key of a lazily stored field (a large blob) of a record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
    key: Key,
}

impl FieldKey {
    pub fn as_bytes(&self) -> &[u8] {
        self.key.as_bytes()
    }

    pub fn as_key(&self) -> &Key {
        &self.key
    }
}

impl From<FieldKey> for Key {
    fn from(key: FieldKey) -> Self {
        key.key
    }
}

fn push_u16_prefixed(buf: &mut Vec<u8>, what: &str, bytes: &[u8]) -> StoreResult<()> {
    let len = u16::try_from(bytes.len())
        .map_err(|_| StoreError::InvalidKey(format!("{what} is {} bytes long", bytes.len())))?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}
