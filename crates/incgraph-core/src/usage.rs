//! Usage records: typed, directed references from a node to a target symbol.
//!
//! [`UsageKind`] is a closed set. Compatibility after a change is decided per
//! kind by the differencing engine with a plain `match`, so adding a kind is
//! a compile error everywhere a decision must be made.

use serde::{Deserialize, Serialize};

use crate::id::NodeId;

/// What the owning node does with its target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UsageKind {
    /// Invocation of a method declared on (or inherited by) the target.
    MethodCall { name: String, descriptor: String },
    /// Read or write of a field declared on (or inherited by) the target.
    FieldAccess { name: String, descriptor: String },
    /// A compile-time constant of the target was inlined into the owner.
    ConstantInline { name: String },
    /// The owner extends or implements the target.
    Supertype,
    /// Plain type reference: signatures, casts, `instanceof`, `new`.
    ClassReference,
    /// The owner is annotated with the target annotation type.
    AnnotationUse,
    /// Reflection-like access to an unspecified member of the target.
    AnyMember,
}

impl UsageKind {
    /// Name of the member this usage refers to, if it is member-level.
    pub fn member_name(&self) -> Option<&str> {
        match self {
            UsageKind::MethodCall { name, .. }
            | UsageKind::FieldAccess { name, .. }
            | UsageKind::ConstantInline { name } => Some(name),
            UsageKind::Supertype
            | UsageKind::ClassReference
            | UsageKind::AnnotationUse
            | UsageKind::AnyMember => None,
        }
    }

    /// Short label used in logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            UsageKind::MethodCall { .. } => "method-call",
            UsageKind::FieldAccess { .. } => "field-access",
            UsageKind::ConstantInline { .. } => "constant-inline",
            UsageKind::Supertype => "supertype",
            UsageKind::ClassReference => "class-reference",
            UsageKind::AnnotationUse => "annotation-use",
            UsageKind::AnyMember => "any-member",
        }
    }
}

/// An outgoing edge of a node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Usage {
    pub target: NodeId,
    #[serde(flatten)]
    pub kind: UsageKind,
}

impl Usage {
    pub fn new(target: NodeId, kind: UsageKind) -> Self {
        Usage { target, kind }
    }

    pub fn method_call(target: NodeId, name: &str, descriptor: &str) -> Self {
        Usage::new(
            target,
            UsageKind::MethodCall {
                name: name.to_string(),
                descriptor: descriptor.to_string(),
            },
        )
    }

    pub fn field_access(target: NodeId, name: &str, descriptor: &str) -> Self {
        Usage::new(
            target,
            UsageKind::FieldAccess {
                name: name.to_string(),
                descriptor: descriptor.to_string(),
            },
        )
    }

    pub fn constant_inline(target: NodeId, name: &str) -> Self {
        Usage::new(
            target,
            UsageKind::ConstantInline {
                name: name.to_string(),
            },
        )
    }

    pub fn supertype(target: NodeId) -> Self {
        Usage::new(target, UsageKind::Supertype)
    }

    pub fn class_reference(target: NodeId) -> Self {
        Usage::new(target, UsageKind::ClassReference)
    }

    pub fn annotation_use(target: NodeId) -> Self {
        Usage::new(target, UsageKind::AnnotationUse)
    }

    pub fn any_member(target: NodeId) -> Self {
        Usage::new(target, UsageKind::AnyMember)
    }
}
