//! Request/Response types for the HTTP API
//!
//! Wire names follow the JSON conventions the web client expects
//! (camelCase keys, ISO-8601 timestamps, role names in caps).

use chrono::{DateTime, SecondsFormat, Utc};
use roundtable_core::core_identity::AccountExport;
use roundtable_core::core_server::ServerView;
use roundtable_core::core_store::{Member, Message, Server, Timestamp, User};
use serde::{Deserialize, Serialize};

// ============================================================================
// Server Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServerRequest {
    /// Absent counts as blank so the name-required error owns this case
    pub name: Option<String>,
    #[serde(default)]
    pub is_restricted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateServerRequest {
    pub name: Option<String>,
    pub is_restricted: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl UserSummary {
    pub fn from_user(user: &User) -> Self {
        UserSummary {
            id: user.id.0.clone(),
            email: user.email.clone(),
            name: user.display_name.clone(),
        }
    }
}

/// One membership row as the client renders it: member identity plus
/// the user behind it, flattened
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub id: String,
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub created_at: String,
}

impl MemberResponse {
    pub fn from_pair(member: &Member, user: &User) -> Self {
        MemberResponse {
            id: member.id.0.clone(),
            user_id: user.id.0.clone(),
            email: user.email.clone(),
            name: user.display_name.clone(),
            role: member.role.as_str().to_string(),
            created_at: format_timestamp(member.created_at),
        }
    }
}

/// Full server payload for the detail view and for creation responses.
/// `invite_code` is omitted entirely for members whose role does not
/// entitle them to share it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDetailResponse {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
    pub is_restricted: bool,
    pub owner: UserSummary,
    pub members: Vec<MemberResponse>,
    pub created_at: String,
}

impl ServerDetailResponse {
    pub fn from_view(view: &ServerView) -> Self {
        let invite_code = if view.can_share_invite {
            Some(view.server.invite_code.clone())
        } else {
            None
        };
        ServerDetailResponse {
            id: view.server.id.0.clone(),
            name: view.server.name.clone(),
            invite_code,
            is_restricted: view.server.is_restricted,
            owner: UserSummary::from_user(&view.owner),
            members: view
                .members
                .iter()
                .map(|(m, u)| MemberResponse::from_pair(m, u))
                .collect(),
            created_at: format_timestamp(view.server.created_at),
        }
    }

    /// Response for a freshly created server: the creator is the owner,
    /// so the member list is just them and the invite code is theirs to
    /// share.
    pub fn from_created(server: &Server, owner_member: &Member, owner: &User) -> Self {
        ServerDetailResponse {
            id: server.id.0.clone(),
            name: server.name.clone(),
            invite_code: Some(server.invite_code.clone()),
            is_restricted: server.is_restricted,
            owner: UserSummary::from_user(owner),
            members: vec![MemberResponse::from_pair(owner_member, owner)],
            created_at: format_timestamp(server.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSummary {
    pub id: String,
    pub name: String,
    pub is_restricted: bool,
    pub created_at: String,
}

impl ServerSummary {
    pub fn from_server(server: &Server) -> Self {
        ServerSummary {
            id: server.id.0.clone(),
            name: server.name.clone(),
            is_restricted: server.is_restricted,
            created_at: format_timestamp(server.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerListResponse {
    pub servers: Vec<ServerSummary>,
}

// ============================================================================
// Member Management Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMemberRoleRequest {
    pub role: String,
}

/// Member record with the nested user, as returned by role updates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberWithUserResponse {
    pub id: String,
    pub user_id: String,
    pub server_id: String,
    pub role: String,
    pub created_at: String,
    pub user: UserSummary,
}

impl MemberWithUserResponse {
    pub fn from_pair(member: &Member, user: &User) -> Self {
        MemberWithUserResponse {
            id: member.id.0.clone(),
            user_id: member.user_id.0.clone(),
            server_id: member.server_id.0.clone(),
            role: member.role.as_str().to_string(),
            created_at: format_timestamp(member.created_at),
            user: UserSummary::from_user(user),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleChangeResponse {
    pub success: bool,
    pub member: MemberWithUserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberListResponse {
    pub members: Vec<MemberResponse>,
}

// ============================================================================
// Message Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageRequest {
    pub client_id: String,
    pub content: String,
    pub sent_at: String,
    pub sequence: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMessageRequest {
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesQuery {
    pub before: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAuthorResponse {
    pub id: String,
    pub role: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub client_id: String,
    pub content: String,
    pub sent_at: String,
    pub sequence: i64,
    pub server_id: String,
    pub member: MessageAuthorResponse,
    pub created_at: String,
}

impl MessageResponse {
    pub fn from_parts(message: &Message, member: &Member, user: &User) -> Self {
        MessageResponse {
            id: message.id.0.clone(),
            client_id: message.client_id.0.clone(),
            content: message.content.clone(),
            sent_at: format_timestamp(message.sent_at),
            sequence: message.sequence,
            server_id: message.server_id.0.clone(),
            member: MessageAuthorResponse {
                id: member.id.0.clone(),
                role: member.role.as_str().to_string(),
                user: UserSummary::from_user(user),
            },
            created_at: format_timestamp(message.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageListResponse {
    pub messages: Vec<MessageResponse>,
}

// ============================================================================
// Invite Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub server_id: String,
    pub server_name: String,
    pub role: String,
    pub already_member: bool,
}

// ============================================================================
// Account Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub export_date: String,
    pub export_type: String,
    pub user: ExportUserResponse,
    pub memberships: Vec<ExportMembershipResponse>,
    pub owned_servers: Vec<ExportOwnedServerResponse>,
    pub messages: Vec<ExportMessageResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportUserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMembershipResponse {
    pub server_id: String,
    pub server_name: String,
    pub role: String,
    pub joined_at: String,
    pub message_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOwnedServerResponse {
    pub id: String,
    pub name: String,
    pub is_restricted: bool,
    pub created_at: String,
    pub member_count: u32,
    pub message_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMessageResponse {
    pub server_id: String,
    pub server_name: String,
    pub content: String,
    pub sent_at: String,
}

impl ExportResponse {
    pub fn from_export(export: &AccountExport) -> Self {
        ExportResponse {
            export_date: format_timestamp(export.exported_at),
            export_type: "GDPR Data Export".to_string(),
            user: ExportUserResponse {
                id: export.user.id.0.clone(),
                email: export.user.email.clone(),
                name: export.user.display_name.clone(),
                created_at: format_timestamp(export.user.created_at),
            },
            memberships: export
                .memberships
                .iter()
                .map(|m| ExportMembershipResponse {
                    server_id: m.server_id.0.clone(),
                    server_name: m.server_name.clone(),
                    role: m.role.as_str().to_string(),
                    joined_at: format_timestamp(m.joined_at),
                    message_count: m.message_count,
                })
                .collect(),
            owned_servers: export
                .owned_servers
                .iter()
                .map(|s| ExportOwnedServerResponse {
                    id: s.server.id.0.clone(),
                    name: s.server.name.clone(),
                    is_restricted: s.server.is_restricted,
                    created_at: format_timestamp(s.server.created_at),
                    member_count: s.member_count,
                    message_count: s.message_count,
                })
                .collect(),
            messages: export
                .messages
                .iter()
                .map(|m| ExportMessageResponse {
                    server_id: m.server_id.0.clone(),
                    server_name: m.server_name.clone(),
                    content: m.content.clone(),
                    sent_at: format_timestamp(m.sent_at),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// ============================================================================
// Timestamp Formatting
// ============================================================================

/// Render an epoch-millisecond timestamp as ISO-8601 with a Z suffix,
/// the format the web client produces and consumes
pub fn format_timestamp(ts: Timestamp) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts.as_millis() as i64)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an ISO-8601 timestamp from the wire. Offsets other than Z are
/// accepted and normalized to UTC.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let parsed = DateTime::parse_from_rfc3339(raw).ok()?;
    let millis = parsed.timestamp_millis();
    if millis < 0 {
        return None;
    }
    Some(Timestamp::from_millis(millis as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp_is_iso_utc() {
        let formatted = format_timestamp(Timestamp::from_millis(1_700_000_000_123));
        assert_eq!(formatted, "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn test_parse_timestamp_round_trips() {
        let ts = parse_timestamp("2023-11-14T22:13:20.123Z").unwrap();
        assert_eq!(ts.as_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_parse_timestamp_normalizes_offsets() {
        let zulu = parse_timestamp("2024-01-01T12:00:00.000Z").unwrap();
        let offset = parse_timestamp("2024-01-01T14:00:00.000+02:00").unwrap();
        assert_eq!(zulu, offset);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2024-13-45T99:00:00Z").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
