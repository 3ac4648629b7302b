//! Typed integer identifiers for compile-time type safety.
//!
//! `Id<T>` wraps the `BIGSERIAL` primary key of a table and carries the entity
//! it belongs to as a phantom type, so an `EscrowId` can never be passed where a
//! `MilestoneId` is expected.
//!
//! # Example
//!
//! ```rust
//! use escrow_core::common::id::Id;
//!
//! pub struct Escrow;
//! pub struct Milestone;
//!
//! pub type EscrowId = Id<Escrow>;
//! pub type MilestoneId = Id<Milestone>;
//!
//! let escrow_id = EscrowId::new(7);
//! assert_eq!(escrow_id.get(), 7);
//!
//! // This would be a compile error:
//! // let wrong: MilestoneId = escrow_id;
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::num::ParseIntError;
use std::str::FromStr;

/// A typed wrapper around a positive `i64` database identifier.
#[repr(transparent)]
pub struct Id<T>(i64, PhantomData<fn() -> T>);

// ============================================================================
// Core implementations
// ============================================================================

impl<T> Id<T> {
    /// Wraps a raw identifier (as loaded from the database or a path segment).
    #[inline]
    pub const fn new(raw: i64) -> Self {
        Self(raw, PhantomData)
    }

    /// Returns the raw identifier.
    #[inline]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Parses an `Id` from a string.
    #[inline]
    pub fn parse(s: &str) -> Result<Self, ParseIntError> {
        s.trim().parse::<i64>().map(Self::new)
    }

    /// Identifiers issued by the database are always positive.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 > 0
    }
}

// ============================================================================
// Standard trait implementations
// ============================================================================

impl<T> Clone for Id<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = std::any::type_name::<T>();
        let short = name.rsplit("::").next().unwrap_or(name);
        write!(f, "{}Id({})", short, self.0)
    }
}

impl<T> Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<T> PartialEq for Id<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl<T> Hash for Id<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<T> From<i64> for Id<T> {
    #[inline]
    fn from(raw: i64) -> Self {
        Self::new(raw)
    }
}

impl<T> From<Id<T>> for i64 {
    #[inline]
    fn from(id: Id<T>) -> Self {
        id.0
    }
}

impl<T> FromStr for Id<T> {
    type Err = ParseIntError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ============================================================================
// Serde support
// ============================================================================

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i64::deserialize(deserializer).map(Self::new)
    }
}

// ============================================================================
// sqlx support
// ============================================================================

use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgHasArrayType, PgTypeInfo, PgValueRef, Postgres};
use sqlx::{Decode, Encode, Type};

impl<T> Type<Postgres> for Id<T> {
    fn type_info() -> PgTypeInfo {
        <i64 as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <i64 as Type<Postgres>>::compatible(ty)
    }
}

impl<T> PgHasArrayType for Id<T> {
    fn array_type_info() -> PgTypeInfo {
        <i64 as PgHasArrayType>::array_type_info()
    }
}

impl<T> Encode<'_, Postgres> for Id<T> {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <i64 as Encode<Postgres>>::encode_by_ref(&self.0, buf)
    }
}

impl<T> Decode<'_, Postgres> for Id<T> {
    fn decode(value: PgValueRef<'_>) -> Result<Self, BoxDynError> {
        <i64 as Decode<Postgres>>::decode(value).map(Self::new)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Escrow;

    type EscrowId = Id<Escrow>;

    #[test]
    fn test_parse_and_display_roundtrip() {
        let id = EscrowId::new(42);
        let parsed = EscrowId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(EscrowId::parse("abc").is_err());
        assert!(EscrowId::parse("").is_err());
    }

    #[test]
    fn test_serializes_as_plain_number() {
        let id = EscrowId::new(9);
        assert_eq!(serde_json::to_string(&id).unwrap(), "9");
        let parsed: EscrowId = serde_json::from_str("9").unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_validity() {
        assert!(EscrowId::new(1).is_valid());
        assert!(!EscrowId::new(0).is_valid());
        assert!(!EscrowId::new(-3).is_valid());
    }

    #[test]
    fn test_debug_includes_type_name() {
        let debug = format!("{:?}", EscrowId::new(5));
        assert_eq!(debug, "EscrowId(5)");
    }

    #[test]
    fn test_hash_map_key() {
        use std::collections::HashMap;
        let mut map: HashMap<EscrowId, &str> = HashMap::new();
        map.insert(EscrowId::new(1), "first");
        assert_eq!(map.get(&EscrowId::new(1)), Some(&"first"));
    }
}
