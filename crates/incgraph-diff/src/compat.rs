//! Per-kind compatibility predicates.
//!
//! Given how a target node changed, decide whether one usage of it is still
//! compatible with the caller's compiled output. Dispatch is a plain `match`
//! over [`UsageKind`]; every kind has exactly one rule.
//!
//! The rules err towards "incompatible": an unnecessary recompilation only
//! costs time, a missed one ships stale bytecode.

use incgraph_core::{Access, Member, MemberKind, NodeId, NodeShape, UsageKind};

use crate::shape::ShapeDiff;

/// How a usage's target changed in this round.
#[derive(Debug, Clone, Copy)]
pub enum TargetChange<'a> {
    /// The target node no longer exists.
    Removed,
    /// The target's digest changed.
    Changed {
        /// Node whose shape changed. For usages reaching it through a
        /// subtype this is the supertype, not the usage target.
        declarer: &'a NodeId,
        old: &'a NodeShape,
        new: &'a NodeShape,
        diff: &'a ShapeDiff,
    },
}

/// Whether code in `caller` may reference something with `access` declared
/// in `declarer`.
///
/// Protected is treated like package access: the caller's subclass
/// relationship is not known here, and assuming it absent over-recompiles.
pub fn accessible(access: Access, caller: &NodeId, declarer: &NodeId) -> bool {
    match access {
        Access::Public => true,
        Access::Protected | Access::PackagePrivate => caller.same_package(declarer),
        Access::Private => caller.outermost() == declarer.outermost(),
    }
}

/// Returns `true` if the usage `kind` by `caller` is broken by `change`.
pub fn is_incompatible(kind: &UsageKind, caller: &NodeId, change: TargetChange<'_>) -> bool {
    let TargetChange::Changed {
        declarer,
        old,
        new,
        diff,
    } = change
    else {
        return true;
    };

    match kind {
        UsageKind::MethodCall { name, descriptor } => {
            method_call_broken(name, descriptor, caller, declarer, old, new, diff)
        }
        UsageKind::FieldAccess { name, descriptor } => {
            field_access_broken(name, descriptor, caller, declarer, old, new, diff)
        }
        UsageKind::ConstantInline { name } => constant_broken(name, old, new),
        UsageKind::Supertype => {
            diff.supertypes_changed
                || diff.flags_changed
                || diff.access_changed.is_some()
                || !diff.removed_members.is_empty()
                || !diff.modified_members.is_empty()
                || diff.added_abstract_method()
        }
        UsageKind::ClassReference => {
            class_access_forbids(caller, declarer, diff) || diff.flags_changed
        }
        UsageKind::AnnotationUse => {
            class_access_forbids(caller, declarer, diff)
                || diff.annotations_changed
                || diff.members_changed()
                || diff.flags_changed
        }
        UsageKind::AnyMember => !diff.is_empty(),
    }
}

fn class_access_forbids(caller: &NodeId, declarer: &NodeId, diff: &ShapeDiff) -> bool {
    matches!(diff.access_changed, Some((_, new)) if !accessible(new, caller, declarer))
}

/// Whether the target switched between class, interface, enum and
/// annotation. Member references compile to a different opcode or constant
/// pool entry for each.
fn type_kind_changed(old: &NodeShape, new: &NodeShape) -> bool {
    old.flags.is_interface != new.flags.is_interface
        || old.flags.is_enum != new.flags.is_enum
        || old.flags.is_annotation != new.flags.is_annotation
}

fn member_access_forbids(old: &Member, new: &Member, caller: &NodeId, declarer: &NodeId) -> bool {
    old.access != new.access && !accessible(new.access, caller, declarer)
}

fn method_call_broken(
    name: &str,
    descriptor: &str,
    caller: &NodeId,
    declarer: &NodeId,
    old: &NodeShape,
    new: &NodeShape,
    diff: &ShapeDiff,
) -> bool {
    if diff.supertypes_changed
        || type_kind_changed(old, new)
        || class_access_forbids(caller, declarer, diff)
    {
        return true;
    }
    // Adding or removing any overload can change which method javac picks.
    if diff.overloads_changed(MemberKind::Method, name) {
        return true;
    }
    match (
        old.member(MemberKind::Method, name, descriptor),
        new.member(MemberKind::Method, name, descriptor),
    ) {
        (Some(_), None) => true,
        (Some(before), Some(after)) => {
            before.return_type != after.return_type
                || before.is_static != after.is_static
                || member_access_forbids(before, after, caller, declarer)
        }
        // Newly declared here: it now overrides or hides an inherited one.
        (None, Some(_)) => true,
        (None, None) => false,
    }
}

fn field_access_broken(
    name: &str,
    descriptor: &str,
    caller: &NodeId,
    declarer: &NodeId,
    old: &NodeShape,
    new: &NodeShape,
    diff: &ShapeDiff,
) -> bool {
    if diff.supertypes_changed
        || type_kind_changed(old, new)
        || class_access_forbids(caller, declarer, diff)
    {
        return true;
    }
    // Fields resolve by name; a type change shows up as a different descriptor.
    let before = old.members_named(MemberKind::Field, name).next();
    let after = new.members_named(MemberKind::Field, name).next();
    match (before, after) {
        (Some(_), None) => true,
        (Some(before), Some(after)) => {
            after.descriptor != descriptor
                || before.descriptor != after.descriptor
                || before.is_static != after.is_static
                || member_access_forbids(before, after, caller, declarer)
        }
        (None, Some(_)) => true,
        (None, None) => false,
    }
}

fn constant_broken(name: &str, old: &NodeShape, new: &NodeShape) -> bool {
    let before = old.members_named(MemberKind::Field, name).next();
    let after = new.members_named(MemberKind::Field, name).next();
    match (before, after) {
        (Some(before), Some(after)) => before.constant != after.constant,
        (None, None) => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use incgraph_core::ClassFlags;

    fn id(name: &str) -> NodeId {
        NodeId::new(name).unwrap()
    }

    fn check(kind: &UsageKind, caller: &str, old: &NodeShape, new: &NodeShape) -> bool {
        let diff = ShapeDiff::between(old, new);
        let declarer = id("p/A");
        is_incompatible(
            kind,
            &id(caller),
            TargetChange::Changed {
                declarer: &declarer,
                old,
                new,
                diff: &diff,
            },
        )
    }

    fn call(name: &str, descriptor: &str) -> UsageKind {
        UsageKind::MethodCall {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }

    fn with(members: Vec<Member>) -> NodeShape {
        members.into_iter().fold(NodeShape::class(), NodeShape::with_member)
    }

    #[test]
    fn removed_target_breaks_every_kind() {
        for kind in [
            call("f", "()"),
            UsageKind::Supertype,
            UsageKind::ClassReference,
            UsageKind::AnyMember,
        ] {
            assert!(is_incompatible(&kind, &id("q/B"), TargetChange::Removed));
        }
    }

    #[test]
    fn method_signature_change_breaks_call() {
        let old = with(vec![Member::method("f", "()", "V")]);
        let new = with(vec![Member::method("f", "(I)", "V")]);
        assert!(check(&call("f", "()"), "q/B", &old, &new));
    }

    #[test]
    fn unrelated_method_change_keeps_call() {
        let old = with(vec![Member::method("f", "()", "V"), Member::method("g", "()", "V")]);
        let new = with(vec![Member::method("f", "()", "V"), Member::method("g", "()", "I")]);
        assert!(!check(&call("f", "()"), "q/B", &old, &new));
        assert!(check(&call("g", "()"), "q/B", &old, &new));
    }

    #[test]
    fn added_overload_breaks_call() {
        let old = with(vec![Member::method("f", "(J)", "V")]);
        let new = with(vec![Member::method("f", "(J)", "V"), Member::method("f", "(I)", "V")]);
        assert!(check(&call("f", "(J)"), "q/B", &old, &new));
    }

    #[test]
    fn narrowed_access_breaks_only_outside_callers() {
        let old = with(vec![Member::method("f", "()", "V")]);
        let new = with(vec![Member::method("f", "()", "V").with_access(Access::PackagePrivate)]);
        assert!(check(&call("f", "()"), "q/B", &old, &new));
        assert!(!check(&call("f", "()"), "p/C", &old, &new));
    }

    #[test]
    fn static_toggle_breaks_call() {
        let old = with(vec![Member::method("f", "()", "V")]);
        let new = with(vec![Member::method("f", "()", "V").with_static()]);
        assert!(check(&call("f", "()"), "p/C", &old, &new));
    }

    #[test]
    fn field_type_change_breaks_access() {
        let kind = UsageKind::FieldAccess {
            name: "x".to_string(),
            descriptor: "I".to_string(),
        };
        let old = with(vec![Member::field("x", "I")]);
        let new = with(vec![Member::field("x", "J")]);
        assert!(check(&kind, "q/B", &old, &new));
        let widened = with(vec![Member::field("x", "I"), Member::field("y", "I")]);
        assert!(!check(&kind, "q/B", &old, &widened));
    }

    #[test]
    fn constant_value_change_breaks_inline() {
        let kind = UsageKind::ConstantInline {
            name: "MAX".to_string(),
        };
        let old = with(vec![Member::field("MAX", "I").with_constant("10")]);
        let same = with(vec![
            Member::field("MAX", "I").with_constant("10"),
            Member::method("g", "()", "V"),
        ]);
        let new = with(vec![Member::field("MAX", "I").with_constant("11")]);
        assert!(check(&kind, "q/B", &old, &new));
        assert!(!check(&kind, "q/B", &old, &same));
    }

    #[test]
    fn supertype_rules() {
        let old = with(vec![Member::method("f", "()", "V")]);
        let added_concrete = with(vec![
            Member::method("f", "()", "V"),
            Member::method("g", "()", "V"),
        ]);
        let added_abstract = with(vec![
            Member::method("f", "()", "V"),
            Member::method("g", "()", "V").with_abstract(),
        ]);
        assert!(!check(&UsageKind::Supertype, "q/B", &old, &added_concrete));
        assert!(check(&UsageKind::Supertype, "q/B", &old, &added_abstract));
        assert!(check(&UsageKind::Supertype, "q/B", &old, &with(vec![])));
    }

    #[test]
    fn class_reference_rules() {
        let old = NodeShape::class();
        let more_members = with(vec![Member::method("g", "()", "V")]);
        let finalized = NodeShape::class().with_flags(ClassFlags {
            is_final: true,
            ..ClassFlags::default()
        });
        let hidden = NodeShape::class().with_access(Access::PackagePrivate);

        assert!(!check(&UsageKind::ClassReference, "q/B", &old, &more_members));
        assert!(check(&UsageKind::ClassReference, "q/B", &old, &finalized));
        assert!(check(&UsageKind::ClassReference, "q/B", &old, &hidden));
        assert!(!check(&UsageKind::ClassReference, "p/B", &old, &hidden));
    }

    #[test]
    fn class_turned_interface_breaks_member_usages() {
        let old = NodeShape::class()
            .with_flags(ClassFlags {
                is_abstract: true,
                ..ClassFlags::default()
            })
            .with_member(Member::method("f", "()", "V").with_abstract())
            .with_member(Member::field("x", "I"));
        let new = NodeShape::class()
            .with_flags(ClassFlags {
                is_interface: true,
                is_abstract: true,
                ..ClassFlags::default()
            })
            .with_member(Member::method("f", "()", "V").with_abstract())
            .with_member(Member::field("x", "I"));
        let field = UsageKind::FieldAccess {
            name: "x".to_string(),
            descriptor: "I".to_string(),
        };

        assert!(check(&call("f", "()"), "q/B", &old, &new));
        assert!(check(&field, "q/B", &old, &new));
    }

    #[test]
    fn finalizing_a_class_keeps_member_usages() {
        let old = with(vec![Member::method("f", "()", "V")]);
        let new = old.clone().with_flags(ClassFlags {
            is_final: true,
            ..ClassFlags::default()
        });
        assert!(!check(&call("f", "()"), "q/B", &old, &new));
    }

    #[test]
    fn annotation_use_rules() {
        let old = NodeShape::class().with_flags(ClassFlags {
            is_annotation: true,
            is_interface: true,
            ..ClassFlags::default()
        });
        let hidden = old.clone().with_access(Access::PackagePrivate);
        let retained = old.clone().with_annotation(id("java/lang/annotation/Retention"));

        assert!(check(&UsageKind::AnnotationUse, "q/B", &old, &hidden));
        assert!(!check(&UsageKind::AnnotationUse, "p/B", &old, &hidden));
        assert!(check(&UsageKind::AnnotationUse, "p/B", &old, &retained));
    }

    #[test]
    fn any_member_breaks_on_any_change() {
        let old = NodeShape::class();
        let new = with(vec![Member::method("g", "()", "V")]);
        assert!(check(&UsageKind::AnyMember, "q/B", &old, &new));
    }

    #[test]
    fn private_access_is_nestmate_only() {
        assert!(accessible(Access::Private, &id("p/A$Inner"), &id("p/A")));
        assert!(!accessible(Access::Private, &id("p/B"), &id("p/A")));
        assert!(accessible(Access::Protected, &id("p/B"), &id("p/A")));
        assert!(!accessible(Access::Protected, &id("q/B"), &id("p/A")));
    }
}
