//! Multi-tenant access policy for proposals and customers.
//!
//! Two ownership rules coexist in this domain and are selected explicitly
//! per operation rather than inferred: [`OwnershipPolicy::Creator`] guards
//! single-record read/update/delete paths, [`OwnershipPolicy::Group`]
//! drives list scoping and acceptance (any member of the owning group may
//! accept, with a creator fallback for legacy rows without an owner group).

use serde::{Deserialize, Serialize};

use crate::domain::proposal::Proposal;
use crate::domain::user::{AuthUser, GroupId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnershipPolicy {
    Creator,
    Group,
}

/// Pure predicate: may this user touch this proposal under the given policy?
/// Non-contractors (admins and internal staff) are never restricted here.
pub fn can_access_proposal(user: &AuthUser, proposal: &Proposal, policy: OwnershipPolicy) -> bool {
    if !user.is_contractor() {
        return true;
    }

    match policy {
        OwnershipPolicy::Creator => proposal.created_by_user_id == Some(user.id),
        OwnershipPolicy::Group => match (proposal.owner_group_id, user.group_id) {
            (Some(owner), Some(group)) => owner == group,
            _ => proposal.created_by_user_id == Some(user.id),
        },
    }
}

/// Listing constraint derived from the caller, translated to SQL by the
/// store layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListScope {
    Unrestricted,
    /// Admin narrowing by an explicit `group_id` query parameter.
    GroupOnly { group_id: GroupId },
    /// Contractor with a group: rows owned by the group, plus ungrouped
    /// legacy rows the user created themselves.
    Group { group_id: GroupId, creator_fallback: UserId },
    /// Contractor without a group: own creations only.
    Creator { user_id: UserId },
}

pub fn build_list_scope(user: &AuthUser, requested_group: Option<GroupId>) -> ListScope {
    if !user.is_contractor() {
        return match requested_group {
            Some(group_id) => ListScope::GroupOnly { group_id },
            None => ListScope::Unrestricted,
        };
    }

    match user.group_id {
        Some(group_id) => ListScope::Group { group_id, creator_fallback: user.id },
        None => ListScope::Creator { user_id: user.id },
    }
}

/// Designer assignment is admin-side only; contractor payloads carrying a
/// `designer` field are silently stripped before persistence.
pub fn can_set_designer(user: &AuthUser) -> bool {
    !user.is_contractor()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::Value;

    use super::{build_list_scope, can_access_proposal, can_set_designer, ListScope, OwnershipPolicy};
    use crate::domain::proposal::{Proposal, ProposalId, ProposalKind};
    use crate::domain::user::{AuthUser, GroupId, GroupKind, Role, UserId};

    fn proposal(owner_group: Option<i64>, creator: Option<i64>) -> Proposal {
        let now = Utc::now();
        Proposal {
            id: ProposalId(1),
            proposal_number: None,
            customer_id: None,
            description: None,
            status: "draft".to_owned(),
            kind: ProposalKind::Quote,
            is_locked: false,
            is_deleted: false,
            manufacturers_data: Value::Null,
            owner_group_id: owner_group.map(GroupId),
            created_by_user_id: creator.map(UserId),
            designer: None,
            location: None,
            sales_rep: None,
            lead_source: None,
            manufacturer_id: None,
            date: None,
            sent_at: None,
            accepted_at: None,
            accepted_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn contractor(id: i64, group: Option<i64>) -> AuthUser {
        AuthUser {
            id: UserId(id),
            name: "contractor".to_owned(),
            email: None,
            role: Role::Standard,
            group_id: group.map(GroupId),
            group_type: Some(GroupKind::Contractor),
        }
    }

    fn admin() -> AuthUser {
        AuthUser {
            id: UserId(99),
            name: "admin".to_owned(),
            email: None,
            role: Role::Admin,
            group_id: None,
            group_type: None,
        }
    }

    #[test]
    fn admins_pass_every_policy() {
        let foreign = proposal(Some(5), Some(7));
        assert!(can_access_proposal(&admin(), &foreign, OwnershipPolicy::Creator));
        assert!(can_access_proposal(&admin(), &foreign, OwnershipPolicy::Group));
    }

    #[test]
    fn creator_policy_requires_exact_creator_match() {
        let user = contractor(7, Some(5));
        assert!(can_access_proposal(&user, &proposal(Some(5), Some(7)), OwnershipPolicy::Creator));
        // Same group, different creator: still denied under the creator rule.
        assert!(!can_access_proposal(&user, &proposal(Some(5), Some(8)), OwnershipPolicy::Creator));
        assert!(!can_access_proposal(&user, &proposal(Some(6), Some(8)), OwnershipPolicy::Creator));
    }

    #[test]
    fn group_policy_admits_group_members_and_falls_back_to_creator() {
        let user = contractor(7, Some(5));
        assert!(can_access_proposal(&user, &proposal(Some(5), Some(8)), OwnershipPolicy::Group));
        assert!(!can_access_proposal(&user, &proposal(Some(6), Some(8)), OwnershipPolicy::Group));
        // Ungrouped legacy row created by the user.
        assert!(can_access_proposal(&user, &proposal(None, Some(7)), OwnershipPolicy::Group));
        assert!(!can_access_proposal(&user, &proposal(None, Some(8)), OwnershipPolicy::Group));
    }

    #[test]
    fn list_scope_is_unrestricted_for_admins_unless_narrowed() {
        assert_eq!(build_list_scope(&admin(), None), ListScope::Unrestricted);
        assert_eq!(
            build_list_scope(&admin(), Some(GroupId(3))),
            ListScope::GroupOnly { group_id: GroupId(3) }
        );
    }

    #[test]
    fn list_scope_pins_contractors_to_their_tenancy() {
        assert_eq!(
            build_list_scope(&contractor(7, Some(5)), Some(GroupId(3))),
            ListScope::Group { group_id: GroupId(5), creator_fallback: UserId(7) },
            "contractors cannot widen scope via the group parameter"
        );
        assert_eq!(
            build_list_scope(&contractor(7, None), None),
            ListScope::Creator { user_id: UserId(7) }
        );
    }

    #[test]
    fn designer_assignment_is_denied_to_contractors() {
        assert!(can_set_designer(&admin()));
        assert!(!can_set_designer(&contractor(7, Some(5))));
    }
}
