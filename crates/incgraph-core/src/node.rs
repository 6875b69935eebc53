//! Nodes: one compiled unit's identity, shape and outgoing usages.
//!
//! A node's [`NodeShape`] holds only the facts visible to dependents:
//! access, class kind flags, supertypes, member signatures, constant values
//! and compilation-relevant annotations. Method bodies and debug info are
//! deliberately absent, so they can never change the structural digest.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::digest::{structural_digest, Digest};
use crate::error::CoreError;
use crate::id::NodeId;
use crate::usage::Usage;

/// JVM access level, ordered from most to least restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Private,
    PackagePrivate,
    Protected,
    Public,
}

impl Default for Access {
    fn default() -> Self {
        Access::Public
    }
}

/// Class-level modifiers that change how dependents are compiled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassFlags {
    #[serde(default)]
    pub is_interface: bool,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub is_enum: bool,
    #[serde(default)]
    pub is_annotation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Method,
    Field,
}

/// A method or field signature as seen by dependents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub kind: MemberKind,
    pub name: String,
    /// Erased parameter list for methods (`(ILjava/lang/String;)`), erased
    /// type for fields.
    pub descriptor: String,
    /// Erased return type; `None` for fields.
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_abstract: bool,
    /// Compile-time constant value of a `static final` field.
    #[serde(default)]
    pub constant: Option<String>,
}

impl Member {
    pub fn method(name: &str, descriptor: &str, return_type: &str) -> Self {
        Member {
            kind: MemberKind::Method,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            return_type: Some(return_type.to_string()),
            access: Access::Public,
            is_static: false,
            is_abstract: false,
            constant: None,
        }
    }

    pub fn field(name: &str, descriptor: &str) -> Self {
        Member {
            kind: MemberKind::Field,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            return_type: None,
            access: Access::Public,
            is_static: false,
            is_abstract: false,
            constant: None,
        }
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn with_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Marks the field `static` with the given inlinable constant value.
    pub fn with_constant(mut self, value: &str) -> Self {
        self.is_static = true;
        self.constant = Some(value.to_string());
        self
    }

    /// Identity of the member within its declaring node.
    pub fn signature(&self) -> (MemberKind, &str, &str) {
        (self.kind, &self.name, &self.descriptor)
    }
}

/// The dependent-visible shape of a node.
///
/// Members are kept sorted by signature with at most one entry per
/// signature; [`NodeShape::normalize`] restores that after edits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeShape {
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub flags: ClassFlags,
    #[serde(default)]
    pub supertypes: BTreeSet<NodeId>,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub annotations: BTreeSet<NodeId>,
}

impl NodeShape {
    /// A public, concrete class with no members.
    pub fn class() -> Self {
        NodeShape::default()
    }

    /// A public interface with no members.
    pub fn interface() -> Self {
        NodeShape {
            flags: ClassFlags {
                is_interface: true,
                is_abstract: true,
                ..ClassFlags::default()
            },
            ..NodeShape::default()
        }
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn with_flags(mut self, flags: ClassFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_supertype(mut self, supertype: NodeId) -> Self {
        self.supertypes.insert(supertype);
        self
    }

    pub fn with_annotation(mut self, annotation: NodeId) -> Self {
        self.annotations.insert(annotation);
        self
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self.normalize();
        self
    }

    /// Sorts members by signature and keeps the last entry per signature.
    pub fn normalize(&mut self) {
        // Stable sort keeps insertion order among equal signatures, so
        // reversing before dedup keeps the most recent declaration.
        self.members.reverse();
        self.members
            .sort_by(|a, b| a.signature().cmp(&b.signature()));
        self.members.dedup_by(|a, b| a.signature() == b.signature());
    }

    /// Looks up a declared member by kind, name and descriptor.
    pub fn member(&self, kind: MemberKind, name: &str, descriptor: &str) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| m.signature() == (kind, name, descriptor))
    }

    /// Declared members of `kind` called `name`, any descriptor.
    pub fn members_named<'a>(
        &'a self,
        kind: MemberKind,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Member> + 'a {
        self.members
            .iter()
            .filter(move |m| m.kind == kind && m.name == name)
    }
}

/// One compiled unit in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub digest: Digest,
    pub shape: NodeShape,
    #[serde(default)]
    pub usages: BTreeSet<Usage>,
}

impl Node {
    /// Creates a node, normalizing its shape and computing its digest.
    pub fn new(id: NodeId, mut shape: NodeShape, usages: impl IntoIterator<Item = Usage>) -> Self {
        shape.normalize();
        let digest = structural_digest(&shape);
        Node {
            id,
            digest,
            shape,
            usages: usages.into_iter().collect(),
        }
    }

    /// Creates a node from a collaborator-computed digest, verifying that it
    /// matches the shape.
    pub fn with_digest(
        id: NodeId,
        digest: Digest,
        shape: NodeShape,
        usages: impl IntoIterator<Item = Usage>,
    ) -> Result<Self, CoreError> {
        let node = Node::new(id, shape, usages);
        if node.digest != digest {
            return Err(CoreError::DigestMismatch {
                node: node.id,
                supplied: digest,
                computed: node.digest,
            });
        }
        Ok(node)
    }

    /// Recomputes the digest and checks it against the stored one.
    pub fn verify_digest(&self) -> Result<(), CoreError> {
        let mut shape = self.shape.clone();
        shape.normalize();
        let computed = structural_digest(&shape);
        if computed != self.digest {
            return Err(CoreError::DigestMismatch {
                node: self.id.clone(),
                supplied: self.digest,
                computed,
            });
        }
        Ok(())
    }

    /// Distinct targets of this node's usages.
    pub fn targets(&self) -> BTreeSet<&NodeId> {
        self.usages.iter().map(|u| &u.target).collect()
    }
}
