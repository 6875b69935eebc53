//! Deterministic structural digests for node shapes using blake3.
//!
//! The digest covers exactly the facts in [`NodeShape`]: class access and
//! flags, supertypes, annotations and every member signature with its
//! access, modifiers, return type and constant value. Two shapes with equal
//! digests are treated as compilation-equivalent.
//!
//! # Determinism
//!
//! - Collections are hashed in sorted order (`BTreeSet`, normalized member
//!   list), never in `HashMap` iteration order.
//! - Every variable-length field is length-prefixed so adjacent fields cannot
//!   alias (`"ab" + "c"` vs `"a" + "bc"`).
//! - Optional fields carry a presence tag.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::node::{Access, ClassFlags, Member, MemberKind, NodeShape};

/// A 32-byte blake3 digest over a node's structural facts.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Digest(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = blake3::HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        blake3::Hash::from_hex(s).map(|h| Digest(*h.as_bytes()))
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

fn update_str(hasher: &mut blake3::Hasher, s: &str) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn update_opt_str(hasher: &mut blake3::Hasher, s: Option<&str>) {
    match s {
        Some(s) => {
            hasher.update(&[1]);
            update_str(hasher, s);
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

fn access_byte(access: Access) -> u8 {
    match access {
        Access::Private => 0,
        Access::PackagePrivate => 1,
        Access::Protected => 2,
        Access::Public => 3,
    }
}

fn flags_byte(flags: &ClassFlags) -> u8 {
    (flags.is_interface as u8)
        | (flags.is_abstract as u8) << 1
        | (flags.is_final as u8) << 2
        | (flags.is_enum as u8) << 3
        | (flags.is_annotation as u8) << 4
}

/// Hashes one member signature with all of its dependent-visible attributes.
pub fn member_digest(member: &Member) -> Digest {
    let mut hasher = blake3::Hasher::new();
    hash_member(&mut hasher, member);
    Digest(*hasher.finalize().as_bytes())
}

fn hash_member(hasher: &mut blake3::Hasher, member: &Member) {
    let kind = match member.kind {
        MemberKind::Method => 0u8,
        MemberKind::Field => 1u8,
    };
    hasher.update(&[kind]);
    update_str(hasher, &member.name);
    update_str(hasher, &member.descriptor);
    update_opt_str(hasher, member.return_type.as_deref());
    hasher.update(&[
        access_byte(member.access),
        member.is_static as u8,
        member.is_abstract as u8,
    ]);
    update_opt_str(hasher, member.constant.as_deref());
}

/// Computes the structural digest of a shape.
///
/// The caller is expected to pass a normalized shape (see
/// [`NodeShape::normalize`]); [`crate::Node::new`] always does.
pub fn structural_digest(shape: &NodeShape) -> Digest {
    let mut hasher = blake3::Hasher::new();

    hasher.update(&[access_byte(shape.access), flags_byte(&shape.flags)]);

    hasher.update(&(shape.supertypes.len() as u64).to_le_bytes());
    for supertype in &shape.supertypes {
        update_str(&mut hasher, supertype.as_str());
    }

    hasher.update(&(shape.annotations.len() as u64).to_le_bytes());
    for annotation in &shape.annotations {
        update_str(&mut hasher, annotation.as_str());
    }

    hasher.update(&(shape.members.len() as u64).to_le_bytes());
    for member in &shape.members {
        hash_member(&mut hasher, member);
    }

    Digest(*hasher.finalize().as_bytes())
}
