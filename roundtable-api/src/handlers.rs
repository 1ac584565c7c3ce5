//! HTTP API handlers
//!
//! Each handler runs the same gate sequence: authenticate, then
//! authorize, then validate, then act. Request bodies are unwrapped
//! only after the authorization gates so outsiders get the same 403
//! no matter what they send.

use crate::auth::authenticate;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::*;
use axum::{
    extract::rejection::JsonRejection,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use roundtable_core::core_identity::IdentityError;
use roundtable_core::core_rbac::{can_post, DenyReason};
use roundtable_core::core_server::{ServerError, ServerPatch};
use roundtable_core::core_store::{ClientId, MemberId, MessageId, Role, ServerId};
use roundtable_core::core_timeline::{NewMessage, TimelineError};
use std::sync::Arc;
use uuid::Uuid;

/// Upper bound on message content, counted after trimming
const MESSAGE_MAX_CHARS: usize = 2000;

// ============================================================================
// Server Handlers
// ============================================================================

/// POST /api/servers - Create a server with the caller as owner
pub async fn create_server(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<CreateServerRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ServerDetailResponse>)> {
    let user = authenticate(&state, &headers)?;

    let Json(req) = body.map_err(|_| ApiError::validation("Invalid JSON body"))?;

    let (server, owner_member) = state
        .servers
        .create(&user, req.name.as_deref().unwrap_or(""), req.is_restricted)
        .map_err(|err| server_op_error(err, "Forbidden"))?;

    Ok((
        StatusCode::CREATED,
        Json(ServerDetailResponse::from_created(
            &server,
            &owner_member,
            &user,
        )),
    ))
}

/// GET /api/servers - Servers the caller belongs to
pub async fn list_servers(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<ServerListResponse>> {
    let user = authenticate(&state, &headers)?;

    let servers = state
        .servers
        .list_for_user(&user)
        .map_err(|err| ApiError::internal("Internal server error", err))?;

    Ok(Json(ServerListResponse {
        servers: servers.iter().map(ServerSummary::from_server).collect(),
    }))
}

/// GET /api/servers/:id - Server detail, members only
pub async fn get_server(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(server_id): Path<String>,
) -> ApiResult<Json<ServerDetailResponse>> {
    let user = authenticate(&state, &headers)?;

    let view = state
        .servers
        .get(&user, &ServerId(server_id))
        .map_err(|err| server_op_error(err, "Forbidden: You are not a member of this server"))?;

    Ok(Json(ServerDetailResponse::from_view(&view)))
}

/// PATCH /api/servers/:id - Update server settings (owner only)
pub async fn update_server(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(server_id): Path<String>,
    body: Result<Json<UpdateServerRequest>, JsonRejection>,
) -> ApiResult<Json<ServerSummary>> {
    let user = authenticate(&state, &headers)?;

    let Json(req) = body.map_err(|_| ApiError::validation("Invalid JSON body"))?;

    let patch = ServerPatch {
        name: req.name,
        is_restricted: req.is_restricted,
    };
    let server = state
        .servers
        .update(&user, &ServerId(server_id), patch)
        .map_err(|err| {
            server_op_error(err, "Forbidden: Only the server owner can edit this server")
        })?;

    Ok(Json(ServerSummary::from_server(&server)))
}

/// DELETE /api/servers/:id - Delete a server and everything in it
/// (owner only)
pub async fn delete_server(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(server_id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    let user = authenticate(&state, &headers)?;

    state
        .servers
        .delete(&user, &ServerId(server_id))
        .map_err(|err| {
            server_op_error(err, "Forbidden: Only the server owner can delete this server")
        })?;

    Ok(Json(SuccessResponse {
        success: true,
        message: "Server deleted successfully".to_string(),
    }))
}

// ============================================================================
// Member Handlers
// ============================================================================

/// GET /api/servers/:id/members - Member list, role-ordered
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(server_id): Path<String>,
) -> ApiResult<Json<MemberListResponse>> {
    let user = authenticate(&state, &headers)?;

    let members = state
        .servers
        .list_members(&user, &ServerId(server_id))
        .map_err(|err| server_op_error(err, "You are not a member of this server"))?;

    Ok(Json(MemberListResponse {
        members: members
            .iter()
            .map(|(m, u)| MemberResponse::from_pair(m, u))
            .collect(),
    }))
}

/// PATCH /api/servers/:id/members/:member_id - Change a member's role
/// (owner only)
pub async fn change_member_role(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((server_id, member_id)): Path<(String, String)>,
    body: Result<Json<UpdateMemberRoleRequest>, JsonRejection>,
) -> ApiResult<Json<RoleChangeResponse>> {
    let user = authenticate(&state, &headers)?;

    let Json(req) = body.map_err(|_| ApiError::validation("Invalid JSON body"))?;

    // OWNER can be neither granted nor requested here
    let new_role = match Role::from_str(&req.role) {
        Some(Role::Moderator) => Role::Moderator,
        Some(Role::Guest) => Role::Guest,
        _ => return Err(ApiError::validation("Role must be MODERATOR or GUEST")),
    };

    let (member, target_user) = state
        .servers
        .change_role(&user, &ServerId(server_id), &MemberId(member_id), new_role)
        .map_err(role_change_error)?;

    Ok(Json(RoleChangeResponse {
        success: true,
        member: MemberWithUserResponse::from_pair(&member, &target_user),
    }))
}

/// DELETE /api/servers/:id/members/:member_id - Kick a member
pub async fn kick_member(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((server_id, member_id)): Path<(String, String)>,
) -> ApiResult<Json<SuccessResponse>> {
    let user = authenticate(&state, &headers)?;

    state
        .servers
        .kick(&user, &ServerId(server_id), &MemberId(member_id))
        .map_err(|err| {
            server_op_error(
                err,
                "Forbidden: You do not have permission to kick this member",
            )
        })?;

    Ok(Json(SuccessResponse {
        success: true,
        message: "Member kicked successfully".to_string(),
    }))
}

// ============================================================================
// Message Handlers
// ============================================================================

/// GET /api/servers/:id/messages - Page of the timeline, chronological
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(server_id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<Json<MessageListResponse>> {
    let user = authenticate(&state, &headers)?;

    let (server, _member) = state
        .servers
        .membership(&user, &ServerId(server_id))
        .map_err(|err| server_op_error(err, "You are not a member of this server"))?;

    if query.limit == Some(0) {
        return Err(ApiError::validation("Limit must be at least 1"));
    }

    let before = query.before.map(MessageId);
    let page = state
        .timeline
        .page(&server, before.as_ref(), query.limit)
        .map_err(|err| timeline_error(err, "You are not a member of this server"))?;

    Ok(Json(MessageListResponse {
        messages: page
            .iter()
            .map(|(msg, member, author)| MessageResponse::from_parts(msg, member, author))
            .collect(),
    }))
}

/// POST /api/servers/:id/messages - Post through the ordering protocol.
/// A replayed submission returns 201 with the stored message, same as
/// the first delivery.
pub async fn create_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(server_id): Path<String>,
    body: Result<Json<CreateMessageRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let user = authenticate(&state, &headers)?;

    let (server, member) = state
        .servers
        .membership(&user, &ServerId(server_id))
        .map_err(|err| server_op_error(err, "You are not a member of this server"))?;

    if !can_post(&member, &server).is_allowed() {
        return Err(ApiError::forbidden(
            "You do not have permission to post in this server",
        ));
    }

    let Json(req) = body.map_err(|_| ApiError::validation("Invalid JSON body"))?;
    let new = validate_message_body(req)?;

    let posted = state.timeline.post(&server, &member, new).map_err(|err| {
        timeline_error(err, "You do not have permission to post in this server")
    })?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::from_parts(&posted.message, &member, &user)),
    ))
}

/// PATCH /api/servers/:id/messages/:message_id - Edit a message
/// (author only)
pub async fn edit_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((server_id, message_id)): Path<(String, String)>,
    body: Result<Json<UpdateMessageRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let user = authenticate(&state, &headers)?;

    let (_server, member) = state
        .servers
        .membership(&user, &ServerId(server_id))
        .map_err(|err| server_op_error(err, "You are not a member of this server"))?;

    let Json(req) = body.map_err(|_| ApiError::validation("Invalid JSON body"))?;

    let content = req.content.trim();
    if content.is_empty() {
        return Err(ApiError::validation("Message cannot be empty"));
    }
    if content.chars().count() > MESSAGE_MAX_CHARS {
        return Err(ApiError::validation("Message cannot exceed 2000 characters"));
    }

    let message = state
        .timeline
        .edit(&member, &MessageId(message_id), content)
        .map_err(|err| {
            timeline_error(
                err,
                "Forbidden: You do not have permission to edit this message",
            )
        })?;

    Ok(Json(MessageResponse::from_parts(&message, &member, &user)))
}

/// DELETE /api/servers/:id/messages/:message_id - Delete a message per
/// the moderation matrix
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((server_id, message_id)): Path<(String, String)>,
) -> ApiResult<Json<SuccessResponse>> {
    let user = authenticate(&state, &headers)?;

    let (_server, member) = state
        .servers
        .membership(&user, &ServerId(server_id))
        .map_err(|err| server_op_error(err, "You are not a member of this server"))?;

    state
        .timeline
        .delete(&member, &MessageId(message_id))
        .map_err(|err| {
            timeline_error(
                err,
                "Forbidden: You do not have permission to delete this message",
            )
        })?;

    Ok(Json(SuccessResponse {
        success: true,
        message: "Message deleted successfully".to_string(),
    }))
}

// ============================================================================
// Invite Handlers
// ============================================================================

/// POST /api/invites/:code/join - Join a server via invite code.
/// Joining a server you already belong to reports the existing
/// membership instead of failing.
pub async fn join_server(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> ApiResult<Json<JoinResponse>> {
    let user = authenticate(&state, &headers)?;

    let outcome = state.invites.join(&user, &code)?;

    Ok(Json(JoinResponse {
        server_id: outcome.server.id.0.clone(),
        server_name: outcome.server.name.clone(),
        role: outcome.member.role.as_str().to_string(),
        already_member: outcome.already_member,
    }))
}

// ============================================================================
// Account Handlers
// ============================================================================

/// GET /api/account/export - Full account data export
pub async fn export_account(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<ExportResponse>> {
    let user = authenticate(&state, &headers)?;

    let export = state
        .identity
        .export_account(&user.id)
        .map_err(|err| match err {
            IdentityError::UnknownUser => ApiError::not_found("User not found"),
            other => ApiError::internal("Failed to export data", other),
        })?;

    Ok(Json(ExportResponse::from_export(&export)))
}

/// DELETE /api/account - Delete the account and cascade through
/// memberships, owned servers and messages
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<SuccessResponse>> {
    let user = authenticate(&state, &headers)?;

    state
        .identity
        .delete_account(&user.id)
        .map_err(|err| ApiError::internal("Failed to delete account", err))?;

    Ok(Json(SuccessResponse {
        success: true,
        message: "Account deleted successfully".to_string(),
    }))
}

// ============================================================================
// Validation and Error Mapping
// ============================================================================

/// Field validation for message submission. The first violated rule
/// wins, in body field order.
fn validate_message_body(req: CreateMessageRequest) -> Result<NewMessage, ApiError> {
    if Uuid::try_parse(&req.client_id).is_err() {
        return Err(ApiError::validation("Invalid client ID format"));
    }

    let content = req.content.trim();
    if content.is_empty() {
        return Err(ApiError::validation("Message cannot be empty"));
    }
    if content.chars().count() > MESSAGE_MAX_CHARS {
        return Err(ApiError::validation("Message cannot exceed 2000 characters"));
    }

    let sent_at = parse_timestamp(&req.sent_at)
        .ok_or_else(|| ApiError::validation("Invalid timestamp format"))?;

    if req.sequence < 1 {
        return Err(ApiError::validation("Sequence must be >= 1"));
    }

    Ok(NewMessage {
        client_id: ClientId(req.client_id),
        content: content.to_string(),
        sent_at,
        sequence: req.sequence,
    })
}

/// Map a server-management error onto the wire. Every denial collapses
/// into the route's 403 wording; existence leaks only where the
/// operation is allowed to reveal it.
fn server_op_error(err: ServerError, deny_msg: &str) -> ApiError {
    match err {
        ServerError::Validation(msg) => ApiError::Validation(msg),
        ServerError::Denied(_) => ApiError::forbidden(deny_msg),
        ServerError::NotFound("member") => ApiError::not_found("Member not found"),
        ServerError::NotFound(_) => ApiError::not_found("Server not found"),
        ServerError::WrongServer => {
            ApiError::validation("Member does not belong to this server")
        }
        ServerError::Store(cause) => ApiError::internal("Internal server error", cause),
    }
}

/// Role changes distinguish the owner-target denial from the generic
/// owner-only gate
fn role_change_error(err: ServerError) -> ApiError {
    match err {
        ServerError::Denied(DenyReason::OwnerImmune) => {
            ApiError::forbidden("Cannot change the role of the server owner")
        }
        other => server_op_error(other, "Forbidden: Only the server owner can change roles"),
    }
}

fn timeline_error(err: TimelineError, deny_msg: &str) -> ApiError {
    match err {
        TimelineError::ClockSkew { .. } => ApiError::Validation(err.to_string()),
        TimelineError::IdempotencyConflict => ApiError::Conflict(err.to_string()),
        TimelineError::CursorNotFound => ApiError::not_found("Cursor message not found"),
        TimelineError::Denied(_) => ApiError::forbidden(deny_msg),
        TimelineError::Store(cause) => ApiError::internal("Internal server error", cause),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(client_id: &str, content: &str, sent_at: &str, sequence: i64) -> CreateMessageRequest {
        CreateMessageRequest {
            client_id: client_id.to_string(),
            content: content.to_string(),
            sent_at: sent_at.to_string(),
            sequence,
        }
    }

    #[test]
    fn test_validate_message_body_accepts_and_trims() {
        let req = request(
            "550e8400-e29b-41d4-a716-446655440000",
            "  hello there  ",
            "2024-06-01T10:00:00.000Z",
            1,
        );
        let new = validate_message_body(req).unwrap();
        assert_eq!(new.content, "hello there");
        assert_eq!(new.sequence, 1);
    }

    #[test]
    fn test_validate_message_body_first_violation_wins() {
        // Both clientId and content are bad; the clientId message wins
        let err = validate_message_body(request("nope", " ", "junk", 0)).unwrap_err();
        assert_eq!(err.to_string(), "Invalid client ID format");

        let err = validate_message_body(request(
            "550e8400-e29b-41d4-a716-446655440000",
            "   ",
            "junk",
            0,
        ))
        .unwrap_err();
        assert_eq!(err.to_string(), "Message cannot be empty");

        let err = validate_message_body(request(
            "550e8400-e29b-41d4-a716-446655440000",
            "hi",
            "junk",
            0,
        ))
        .unwrap_err();
        assert_eq!(err.to_string(), "Invalid timestamp format");

        let err = validate_message_body(request(
            "550e8400-e29b-41d4-a716-446655440000",
            "hi",
            "2024-06-01T10:00:00.000Z",
            0,
        ))
        .unwrap_err();
        assert_eq!(err.to_string(), "Sequence must be >= 1");
    }

    #[test]
    fn test_validate_message_body_length_cap() {
        let long = "x".repeat(2001);
        let err = validate_message_body(request(
            "550e8400-e29b-41d4-a716-446655440000",
            &long,
            "2024-06-01T10:00:00.000Z",
            1,
        ))
        .unwrap_err();
        assert_eq!(err.to_string(), "Message cannot exceed 2000 characters");

        let exactly = "y".repeat(2000);
        assert!(validate_message_body(request(
            "550e8400-e29b-41d4-a716-446655440000",
            &exactly,
            "2024-06-01T10:00:00.000Z",
            1,
        ))
        .is_ok());
    }
}
