/*
    core_rbac - Role-based authorization decisions

    Pure decision functions over resolved records. Callers resolve ids
    to records first; a reference that does not resolve, or resolves
    into a different server, is a denial here, never an error. Store
    failures are a separate channel (StoreError) and must not be
    conflated with denials.

    The role matrix:
    - edit message: author only, regardless of rank
    - delete message: own, or OWNER/MODERATOR over authors of equal or
      lower rank (OWNER-authored only by OWNER)
    - kick: OWNER kicks MODERATOR/GUEST, MODERATOR kicks GUEST; never
      self, never the OWNER
    - role change: OWNER only, never the OWNER member, never to OWNER
    - post: any member, except GUEST in a restricted server
    - invite generation, member list: rank-gated as below
*/

use crate::core_store::model::{Member, Message, Role, Server, User};
use std::fmt;

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Turn a denial into an Err for `?`-style gating
    pub fn require(self) -> Result<(), DenyReason> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason),
        }
    }
}

/// Why an action was denied. Internal detail for logs and tests; at
/// the wire every variant collapses into a 403.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Actor has no membership in the server
    NotAMember,
    /// Actor is not the author of the message
    NotAuthor,
    /// Action targets the actor's own membership
    SelfTarget,
    /// Action targets the OWNER member or the OWNER position
    OwnerImmune,
    /// Actor's rank does not cover the target
    InsufficientRole,
    /// GUEST posting into a restricted server
    RestrictedServer,
    /// Referenced resource belongs to a different server
    CrossServer,
    /// Referenced resource does not exist; reported exactly like any
    /// other denial so callers cannot probe for existence
    TargetNotFound,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DenyReason::NotAMember => "not a member of this server",
            DenyReason::NotAuthor => "not the author of this message",
            DenyReason::SelfTarget => "cannot target yourself",
            DenyReason::OwnerImmune => "the server owner cannot be targeted",
            DenyReason::InsufficientRole => "insufficient role",
            DenyReason::RestrictedServer => "guests cannot post in this server",
            DenyReason::CrossServer => "resource belongs to a different server",
            DenyReason::TargetNotFound => "permission denied",
        };
        write!(f, "{}", s)
    }
}

/// True when `user` owns `server`
pub fn is_server_owner(user: &User, server: &Server) -> bool {
    server.owner_id == user.id
}

/// May `member` post into `server`? Restricted servers block GUESTs.
pub fn can_post(member: &Member, server: &Server) -> Decision {
    if member.server_id != server.id {
        return Decision::Deny(DenyReason::CrossServer);
    }
    if server.is_restricted && member.role == Role::Guest {
        return Decision::Deny(DenyReason::RestrictedServer);
    }
    Decision::Allow
}

/// May `actor` edit `message`? Only the author, whatever their rank.
pub fn can_edit_message(actor: &Member, message: &Message, author: &Member) -> Decision {
    if message.server_id != actor.server_id {
        return Decision::Deny(DenyReason::CrossServer);
    }
    if author.user_id != actor.user_id {
        return Decision::Deny(DenyReason::NotAuthor);
    }
    Decision::Allow
}

/// May `actor` delete `message`? Own messages always; otherwise the
/// actor must rank MODERATOR or above and at least the author's rank,
/// so OWNER-authored messages fall to the OWNER alone.
pub fn can_delete_message(actor: &Member, message: &Message, author: &Member) -> Decision {
    if message.server_id != actor.server_id {
        return Decision::Deny(DenyReason::CrossServer);
    }
    if author.user_id == actor.user_id {
        return Decision::Allow;
    }
    if !actor.role.at_least(Role::Moderator) {
        return Decision::Deny(DenyReason::InsufficientRole);
    }
    if !actor.role.at_least(author.role) {
        return Decision::Deny(DenyReason::InsufficientRole);
    }
    Decision::Allow
}

/// May `actor` kick `target` out of the server?
pub fn can_kick(actor: &Member, target: &Member) -> Decision {
    if actor.server_id != target.server_id {
        return Decision::Deny(DenyReason::CrossServer);
    }
    if actor.user_id == target.user_id {
        return Decision::Deny(DenyReason::SelfTarget);
    }
    if target.role == Role::Owner {
        return Decision::Deny(DenyReason::OwnerImmune);
    }
    match actor.role {
        Role::Owner => Decision::Allow,
        Role::Moderator => {
            if target.role == Role::Guest {
                Decision::Allow
            } else {
                Decision::Deny(DenyReason::InsufficientRole)
            }
        }
        Role::Guest => Decision::Deny(DenyReason::InsufficientRole),
    }
}

/// May `actor` set `target`'s role to `new_role`? OWNER only; the
/// OWNER position can be neither vacated nor granted this way.
pub fn can_change_role(actor: &User, server: &Server, target: &Member, new_role: Role) -> Decision {
    if !is_server_owner(actor, server) {
        return Decision::Deny(DenyReason::InsufficientRole);
    }
    if target.server_id != server.id {
        return Decision::Deny(DenyReason::CrossServer);
    }
    if target.role == Role::Owner {
        return Decision::Deny(DenyReason::OwnerImmune);
    }
    if new_role == Role::Owner {
        return Decision::Deny(DenyReason::OwnerImmune);
    }
    Decision::Allow
}

/// May `member` read the invite code / generate invites?
pub fn can_generate_invite(member: &Member) -> Decision {
    if member.role.at_least(Role::Moderator) {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::InsufficientRole)
    }
}

/// May `user` edit the server's settings? Owner only.
pub fn can_edit_server(user: &User, server: &Server) -> Decision {
    if is_server_owner(user, server) {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::InsufficientRole)
    }
}

/// May `user` delete the server? Owner only.
pub fn can_delete_server(user: &User, server: &Server) -> Decision {
    if is_server_owner(user, server) {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::InsufficientRole)
    }
}
