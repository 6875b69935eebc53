//! Member-level comparison of two shapes of the same node.

use serde::Serialize;

use incgraph_core::{member_digest, Access, Member, MemberKind, NodeShape};

/// What changed between the old and new shape of one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShapeDiff {
    /// Members whose signature no longer exists.
    pub removed_members: Vec<Member>,
    /// Members whose signature did not exist before.
    pub added_members: Vec<Member>,
    /// Same signature, different attributes: `(old, new)`.
    pub modified_members: Vec<(Member, Member)>,
    pub supertypes_changed: bool,
    pub flags_changed: bool,
    /// `(old, new)` class access, if it changed.
    pub access_changed: Option<(Access, Access)>,
    pub annotations_changed: bool,
}

impl ShapeDiff {
    /// Compares two normalized shapes.
    pub fn between(old: &NodeShape, new: &NodeShape) -> Self {
        let mut diff = ShapeDiff {
            supertypes_changed: old.supertypes != new.supertypes,
            flags_changed: old.flags != new.flags,
            access_changed: (old.access != new.access).then_some((old.access, new.access)),
            annotations_changed: old.annotations != new.annotations,
            ..ShapeDiff::default()
        };

        for member in &old.members {
            let (kind, name, descriptor) = member.signature();
            match new.member(kind, name, descriptor) {
                None => diff.removed_members.push(member.clone()),
                Some(current) if member_digest(current) != member_digest(member) => {
                    diff.modified_members.push((member.clone(), current.clone()));
                }
                Some(_) => {}
            }
        }
        for member in &new.members {
            let (kind, name, descriptor) = member.signature();
            if old.member(kind, name, descriptor).is_none() {
                diff.added_members.push(member.clone());
            }
        }
        diff
    }

    pub fn is_empty(&self) -> bool {
        !self.members_changed()
            && !self.supertypes_changed
            && !self.flags_changed
            && self.access_changed.is_none()
            && !self.annotations_changed
    }

    pub fn members_changed(&self) -> bool {
        !self.removed_members.is_empty()
            || !self.added_members.is_empty()
            || !self.modified_members.is_empty()
    }

    /// Whether a member of `kind` called `name` was added or removed under
    /// any descriptor.
    pub fn overloads_changed(&self, kind: MemberKind, name: &str) -> bool {
        self.removed_members
            .iter()
            .chain(&self.added_members)
            .any(|m| m.kind == kind && m.name == name)
    }

    pub fn added_abstract_method(&self) -> bool {
        self.added_members
            .iter()
            .any(|m| m.kind == MemberKind::Method && m.is_abstract)
    }
}
