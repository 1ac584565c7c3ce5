//! SQL-based storage implementation for users, servers, members and messages

use super::error::StoreError;
use super::migrations;
use super::model::{
    ClientId, Member, MemberId, Message, MessageId, Role, Server, ServerId, Timestamp, User,
    UserId,
};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};

/// SQL-based chat store.
///
/// All reads resolve ids to full records; relationship checks (who may
/// act on what) live in core_rbac, not here.
pub struct ChatStore {
    pool: Pool<SqliteConnectionManager>,
}

impl ChatStore {
    /// Create a store backed by the given connection pool
    pub fn new(pool: Pool<SqliteConnectionManager>) -> Result<Self, StoreError> {
        // Run migrations
        migrations::migrate(&pool)?;

        Ok(Self { pool })
    }

    /// Open a file-backed store at `path`
    pub fn open(path: &str, max_pool_size: u32, enable_wal: bool) -> Result<Self, StoreError> {
        if path == ":memory:" {
            return Self::memory();
        }

        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            if enable_wal {
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            }
            Ok(())
        });
        let pool = Pool::builder()
            .max_size(max_pool_size)
            .build(manager)
            .map_err(StoreError::pool)?;

        Self::new(pool)
    }

    /// Create an in-memory store. Capped at one connection: every
    /// pooled connection would otherwise open its own empty database.
    pub fn memory() -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(StoreError::pool)?;

        Self::new(pool)
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, StoreError> {
        self.pool.get().map_err(StoreError::pool)
    }

    // ===== User Operations =====

    /// Insert or refresh a user keyed by email (just-in-time provisioning).
    /// An existing row keeps its id and created_at; external_id and
    /// display_name are refreshed from the identity provider.
    pub fn upsert_user_by_email(
        &self,
        external_id: &str,
        email: &str,
        display_name: &str,
    ) -> Result<User, StoreError> {
        let conn = self.conn()?;

        let candidate_id = UserId::generate();
        let now = Timestamp::now();

        conn.execute(
            "INSERT INTO users (id, external_id, email, display_name, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(email) DO UPDATE SET
                 external_id = excluded.external_id,
                 display_name = excluded.display_name",
            params![
                candidate_id.0,
                external_id,
                email,
                display_name,
                now.as_millis() as i64,
            ],
        )?;

        conn.query_row(
            "SELECT id, external_id, email, display_name, created_at
             FROM users WHERE email = ?",
            params![email],
            |row| user_from_row(row, 0),
        )
        .optional()?
        .ok_or(StoreError::NotFound("user"))
    }

    /// Get a user by ID
    pub fn get_user(&self, user_id: &UserId) -> Result<Option<User>, StoreError> {
        let conn = self.conn()?;

        let user = conn
            .query_row(
                "SELECT id, external_id, email, display_name, created_at
                 FROM users WHERE id = ?",
                params![user_id.0],
                |row| user_from_row(row, 0),
            )
            .optional()?;

        Ok(user)
    }

    /// Delete a user (cascades to owned servers, memberships and messages)
    pub fn delete_user(&self, user_id: &UserId) -> Result<(), StoreError> {
        let conn = self.conn()?;

        conn.execute("DELETE FROM users WHERE id = ?", params![user_id.0])?;

        Ok(())
    }

    // ===== Server Operations =====

    /// Insert a new server together with its OWNER membership, atomically
    pub fn create_server(&self, server: &Server, owner_member: &Member) -> Result<(), StoreError> {
        let conn = self.conn()?;

        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO servers (id, name, invite_code, is_restricted, owner_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                server.id.0,
                &server.name,
                &server.invite_code,
                server.is_restricted as i64,
                server.owner_id.0,
                server.created_at.as_millis() as i64,
            ],
        )?;

        tx.execute(
            "INSERT INTO members (id, user_id, server_id, role, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                owner_member.id.0,
                owner_member.user_id.0,
                owner_member.server_id.0,
                owner_member.role.as_str(),
                owner_member.created_at.as_millis() as i64,
            ],
        )?;

        tx.commit()?;

        Ok(())
    }

    /// Get a server by ID
    pub fn get_server(&self, server_id: &ServerId) -> Result<Option<Server>, StoreError> {
        let conn = self.conn()?;

        let server = conn
            .query_row(
                "SELECT id, name, invite_code, is_restricted, owner_id, created_at
                 FROM servers WHERE id = ?",
                params![server_id.0],
                server_from_row,
            )
            .optional()?;

        Ok(server)
    }

    /// Get a server by invite code
    pub fn get_server_by_invite_code(&self, code: &str) -> Result<Option<Server>, StoreError> {
        let conn = self.conn()?;

        let server = conn
            .query_row(
                "SELECT id, name, invite_code, is_restricted, owner_id, created_at
                 FROM servers WHERE invite_code = ?",
                params![code],
                server_from_row,
            )
            .optional()?;

        Ok(server)
    }

    /// Update a server's mutable fields (name, is_restricted)
    pub fn update_server(&self, server: &Server) -> Result<(), StoreError> {
        let conn = self.conn()?;

        conn.execute(
            "UPDATE servers SET name = ?, is_restricted = ? WHERE id = ?",
            params![&server.name, server.is_restricted as i64, server.id.0],
        )?;

        Ok(())
    }

    /// Delete a server (cascades to members and messages)
    pub fn delete_server(&self, server_id: &ServerId) -> Result<(), StoreError> {
        let conn = self.conn()?;

        conn.execute("DELETE FROM servers WHERE id = ?", params![server_id.0])?;

        Ok(())
    }

    /// List servers a user belongs to, newest join first
    pub fn list_servers_for_user(&self, user_id: &UserId) -> Result<Vec<Server>, StoreError> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT s.id, s.name, s.invite_code, s.is_restricted, s.owner_id, s.created_at
             FROM servers s
             JOIN members m ON m.server_id = s.id
             WHERE m.user_id = ?
             ORDER BY m.created_at DESC",
        )?;

        let servers = stmt
            .query_map(params![user_id.0], server_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(servers)
    }

    // ===== Member Operations =====

    /// Get a user's membership in a server
    pub fn get_member(
        &self,
        user_id: &UserId,
        server_id: &ServerId,
    ) -> Result<Option<Member>, StoreError> {
        let conn = self.conn()?;

        let member = conn
            .query_row(
                "SELECT id, user_id, server_id, role, created_at
                 FROM members WHERE user_id = ? AND server_id = ?",
                params![user_id.0, server_id.0],
                |row| member_from_row(row, 0),
            )
            .optional()?;

        Ok(member)
    }

    /// Get a membership by ID
    pub fn get_member_by_id(&self, member_id: &MemberId) -> Result<Option<Member>, StoreError> {
        let conn = self.conn()?;

        let member = conn
            .query_row(
                "SELECT id, user_id, server_id, role, created_at
                 FROM members WHERE id = ?",
                params![member_id.0],
                |row| member_from_row(row, 0),
            )
            .optional()?;

        Ok(member)
    }

    /// Get a membership with its user record
    pub fn get_member_with_user(
        &self,
        member_id: &MemberId,
    ) -> Result<Option<(Member, User)>, StoreError> {
        let conn = self.conn()?;

        let pair = conn
            .query_row(
                "SELECT m.id, m.user_id, m.server_id, m.role, m.created_at,
                        u.id, u.external_id, u.email, u.display_name, u.created_at
                 FROM members m
                 JOIN users u ON u.id = m.user_id
                 WHERE m.id = ?",
                params![member_id.0],
                |row| Ok((member_from_row(row, 0)?, user_from_row(row, 5)?)),
            )
            .optional()?;

        Ok(pair)
    }

    /// List a server's members with their users: OWNER first, then
    /// MODERATOR, then GUEST, each group ordered by join time
    pub fn list_members(&self, server_id: &ServerId) -> Result<Vec<(Member, User)>, StoreError> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT m.id, m.user_id, m.server_id, m.role, m.created_at,
                    u.id, u.external_id, u.email, u.display_name, u.created_at
             FROM members m
             JOIN users u ON u.id = m.user_id
             WHERE m.server_id = ?
             ORDER BY CASE m.role
                 WHEN 'OWNER' THEN 0
                 WHEN 'MODERATOR' THEN 1
                 ELSE 2
             END, m.created_at ASC",
        )?;

        let members = stmt
            .query_map(params![server_id.0], |row| {
                Ok((member_from_row(row, 0)?, user_from_row(row, 5)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(members)
    }

    /// Insert a membership. A concurrent join of the same user into the
    /// same server surfaces as `Conflict`.
    pub fn insert_member(&self, member: &Member) -> Result<(), StoreError> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO members (id, user_id, server_id, role, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                member.id.0,
                member.user_id.0,
                member.server_id.0,
                member.role.as_str(),
                member.created_at.as_millis() as i64,
            ],
        )
        .map_err(|e| {
            if StoreError::is_constraint_violation(&e) {
                StoreError::Conflict("membership")
            } else {
                StoreError::Sqlite(e)
            }
        })?;

        Ok(())
    }

    /// Update a membership's role
    pub fn update_member_role(&self, member_id: &MemberId, role: Role) -> Result<(), StoreError> {
        let conn = self.conn()?;

        conn.execute(
            "UPDATE members SET role = ? WHERE id = ?",
            params![role.as_str(), member_id.0],
        )?;

        Ok(())
    }

    /// Delete a membership (cascades to the member's messages)
    pub fn delete_member(&self, member_id: &MemberId) -> Result<(), StoreError> {
        let conn = self.conn()?;

        conn.execute("DELETE FROM members WHERE id = ?", params![member_id.0])?;

        Ok(())
    }

    // ===== Message Operations =====

    /// Insert a message. A concurrent send with the same client_id
    /// surfaces as `Conflict` for the caller to resolve as a replay.
    pub fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO messages (id, client_id, content, sent_at, sequence, member_id, server_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                message.id.0,
                message.client_id.0,
                &message.content,
                message.sent_at.as_millis() as i64,
                message.sequence,
                message.member_id.0,
                message.server_id.0,
                message.created_at.as_millis() as i64,
            ],
        )
        .map_err(|e| {
            if StoreError::is_constraint_violation(&e) {
                StoreError::Conflict("client_id")
            } else {
                StoreError::Sqlite(e)
            }
        })?;

        Ok(())
    }

    /// Get a message by ID
    pub fn get_message(&self, message_id: &MessageId) -> Result<Option<Message>, StoreError> {
        let conn = self.conn()?;

        let message = conn
            .query_row(
                "SELECT id, client_id, content, sent_at, sequence, member_id, server_id, created_at
                 FROM messages WHERE id = ?",
                params![message_id.0],
                message_from_row,
            )
            .optional()?;

        Ok(message)
    }

    /// Get a message by its client-assigned id
    pub fn get_message_by_client_id(
        &self,
        client_id: &ClientId,
    ) -> Result<Option<Message>, StoreError> {
        let conn = self.conn()?;

        let message = conn
            .query_row(
                "SELECT id, client_id, content, sent_at, sequence, member_id, server_id, created_at
                 FROM messages WHERE client_id = ?",
                params![client_id.0],
                message_from_row,
            )
            .optional()?;

        Ok(message)
    }

    /// Get a message with its authoring membership and user
    pub fn get_message_with_author(
        &self,
        message_id: &MessageId,
    ) -> Result<Option<(Message, Member, User)>, StoreError> {
        let conn = self.conn()?;

        let triple = conn
            .query_row(
                "SELECT msg.id, msg.client_id, msg.content, msg.sent_at, msg.sequence,
                        msg.member_id, msg.server_id, msg.created_at,
                        m.id, m.user_id, m.server_id, m.role, m.created_at,
                        u.id, u.external_id, u.email, u.display_name, u.created_at
                 FROM messages msg
                 JOIN members m ON m.id = msg.member_id
                 JOIN users u ON u.id = m.user_id
                 WHERE msg.id = ?",
                params![message_id.0],
                |row| {
                    Ok((
                        message_from_row(row)?,
                        member_from_row(row, 8)?,
                        user_from_row(row, 13)?,
                    ))
                },
            )
            .optional()?;

        Ok(triple)
    }

    /// Replace a message's content
    pub fn update_message_content(
        &self,
        message_id: &MessageId,
        content: &str,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;

        conn.execute(
            "UPDATE messages SET content = ? WHERE id = ?",
            params![content, message_id.0],
        )?;

        Ok(())
    }

    /// Delete a message
    pub fn delete_message(&self, message_id: &MessageId) -> Result<(), StoreError> {
        let conn = self.conn()?;

        conn.execute("DELETE FROM messages WHERE id = ?", params![message_id.0])?;

        Ok(())
    }

    /// Page of a server's timeline, oldest first.
    ///
    /// Fetches the `limit` messages strictly before the cursor in
    /// (sent_at, sequence, id) order, newest-first in SQL, then
    /// reverses to chronological. Without a cursor this is the tail
    /// (latest page) of the timeline.
    pub fn list_messages_page(
        &self,
        server_id: &ServerId,
        before: Option<&Message>,
        limit: u32,
    ) -> Result<Vec<(Message, Member, User)>, StoreError> {
        let conn = self.conn()?;

        let mut page = match before {
            Some(cursor) => {
                let mut stmt = conn.prepare(
                    "SELECT msg.id, msg.client_id, msg.content, msg.sent_at, msg.sequence,
                            msg.member_id, msg.server_id, msg.created_at,
                            m.id, m.user_id, m.server_id, m.role, m.created_at,
                            u.id, u.external_id, u.email, u.display_name, u.created_at
                     FROM messages msg
                     JOIN members m ON m.id = msg.member_id
                     JOIN users u ON u.id = m.user_id
                     WHERE msg.server_id = ?
                       AND (msg.sent_at < ?
                            OR (msg.sent_at = ? AND msg.sequence < ?)
                            OR (msg.sent_at = ? AND msg.sequence = ? AND msg.id < ?))
                     ORDER BY msg.sent_at DESC, msg.sequence DESC, msg.id DESC
                     LIMIT ?",
                )?;

                let sent_at = cursor.sent_at.as_millis() as i64;
                let rows = stmt
                    .query_map(
                        params![
                            server_id.0,
                            sent_at,
                            sent_at,
                            cursor.sequence,
                            sent_at,
                            cursor.sequence,
                            cursor.id.0,
                            limit,
                        ],
                        |row| {
                            Ok((
                                message_from_row(row)?,
                                member_from_row(row, 8)?,
                                user_from_row(row, 13)?,
                            ))
                        },
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT msg.id, msg.client_id, msg.content, msg.sent_at, msg.sequence,
                            msg.member_id, msg.server_id, msg.created_at,
                            m.id, m.user_id, m.server_id, m.role, m.created_at,
                            u.id, u.external_id, u.email, u.display_name, u.created_at
                     FROM messages msg
                     JOIN members m ON m.id = msg.member_id
                     JOIN users u ON u.id = m.user_id
                     WHERE msg.server_id = ?
                     ORDER BY msg.sent_at DESC, msg.sequence DESC, msg.id DESC
                     LIMIT ?",
                )?;

                let rows = stmt
                    .query_map(params![server_id.0, limit], |row| {
                        Ok((
                            message_from_row(row)?,
                            member_from_row(row, 8)?,
                            user_from_row(row, 13)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };

        page.reverse();

        Ok(page)
    }

    // ===== Export Operations =====

    /// List a user's memberships with their servers, oldest join first
    pub fn list_memberships_with_servers(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<(Member, Server)>, StoreError> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT m.id, m.user_id, m.server_id, m.role, m.created_at,
                    s.id, s.name, s.invite_code, s.is_restricted, s.owner_id, s.created_at
             FROM members m
             JOIN servers s ON s.id = m.server_id
             WHERE m.user_id = ?
             ORDER BY m.created_at ASC",
        )?;

        let memberships = stmt
            .query_map(params![user_id.0], |row| {
                let member = member_from_row(row, 0)?;
                let server = Server {
                    id: ServerId::new(row.get(5)?),
                    name: row.get(6)?,
                    invite_code: row.get(7)?,
                    is_restricted: row.get::<_, i64>(8)? != 0,
                    owner_id: UserId::new(row.get(9)?),
                    created_at: Timestamp::from_millis(row.get::<_, i64>(10)?.max(0) as u64),
                };
                Ok((member, server))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(memberships)
    }

    /// List servers owned by a user, oldest first
    pub fn list_servers_owned(&self, user_id: &UserId) -> Result<Vec<Server>, StoreError> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, name, invite_code, is_restricted, owner_id, created_at
             FROM servers WHERE owner_id = ? ORDER BY created_at ASC",
        )?;

        let servers = stmt
            .query_map(params![user_id.0], server_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(servers)
    }

    /// Count members of a server
    pub fn count_members(&self, server_id: &ServerId) -> Result<u32, StoreError> {
        let conn = self.conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM members WHERE server_id = ?",
            params![server_id.0],
            |row| row.get(0),
        )?;

        Ok(count.max(0) as u32)
    }

    /// Count messages in a server
    pub fn count_messages_in_server(&self, server_id: &ServerId) -> Result<u32, StoreError> {
        let conn = self.conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE server_id = ?",
            params![server_id.0],
            |row| row.get(0),
        )?;

        Ok(count.max(0) as u32)
    }

    /// Count messages authored under a membership
    pub fn count_messages_by_member(&self, member_id: &MemberId) -> Result<u32, StoreError> {
        let conn = self.conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE member_id = ?",
            params![member_id.0],
            |row| row.get(0),
        )?;

        Ok(count.max(0) as u32)
    }

    /// List every message a user authored across all servers, in
    /// timeline order, with the server it was posted to
    pub fn list_messages_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<(Message, Server)>, StoreError> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT msg.id, msg.client_id, msg.content, msg.sent_at, msg.sequence,
                    msg.member_id, msg.server_id, msg.created_at,
                    s.id, s.name, s.invite_code, s.is_restricted, s.owner_id, s.created_at
             FROM messages msg
             JOIN members m ON m.id = msg.member_id
             JOIN servers s ON s.id = msg.server_id
             WHERE m.user_id = ?
             ORDER BY msg.sent_at ASC, msg.sequence ASC, msg.id ASC",
        )?;

        let messages = stmt
            .query_map(params![user_id.0], |row| {
                let message = message_from_row(row)?;
                let server = Server {
                    id: ServerId::new(row.get(8)?),
                    name: row.get(9)?,
                    invite_code: row.get(10)?,
                    is_restricted: row.get::<_, i64>(11)? != 0,
                    owner_id: UserId::new(row.get(12)?),
                    created_at: Timestamp::from_millis(row.get::<_, i64>(13)?.max(0) as u64),
                };
                Ok((message, server))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(messages)
    }
}

// ===== Row Mapping =====

fn user_from_row(row: &Row, offset: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId::new(row.get(offset)?),
        external_id: row.get(offset + 1)?,
        email: row.get(offset + 2)?,
        display_name: row.get(offset + 3)?,
        created_at: Timestamp::from_millis(row.get::<_, i64>(offset + 4)?.max(0) as u64),
    })
}

fn server_from_row(row: &Row) -> rusqlite::Result<Server> {
    Ok(Server {
        id: ServerId::new(row.get(0)?),
        name: row.get(1)?,
        invite_code: row.get(2)?,
        is_restricted: row.get::<_, i64>(3)? != 0,
        owner_id: UserId::new(row.get(4)?),
        created_at: Timestamp::from_millis(row.get::<_, i64>(5)?.max(0) as u64),
    })
}

fn member_from_row(row: &Row, offset: usize) -> rusqlite::Result<Member> {
    let role_str: String = row.get(offset + 3)?;
    let role = Role::from_str(&role_str).unwrap_or(Role::Guest);

    Ok(Member {
        id: MemberId::new(row.get(offset)?),
        user_id: UserId::new(row.get(offset + 1)?),
        server_id: ServerId::new(row.get(offset + 2)?),
        role,
        created_at: Timestamp::from_millis(row.get::<_, i64>(offset + 4)?.max(0) as u64),
    })
}

fn message_from_row(row: &Row) -> rusqlite::Result<Message> {
    Ok(Message {
        id: MessageId::new(row.get(0)?),
        client_id: ClientId::new(row.get(1)?),
        content: row.get(2)?,
        sent_at: Timestamp::from_millis(row.get::<_, i64>(3)?.max(0) as u64),
        sequence: row.get(4)?,
        member_id: MemberId::new(row.get(5)?),
        server_id: ServerId::new(row.get(6)?),
        created_at: Timestamp::from_millis(row.get::<_, i64>(7)?.max(0) as u64),
    })
}
