// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation turn queries.

use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use pitchcraft_core::{ConversationId, ConversationTurn, NewTurn, PitchcraftError, Role};
use rusqlite::{TransactionBehavior, params, types::Type};

use crate::database::{Database, map_tr_err};

const TURN_COLUMNS: &str = "sequence_number, role, text, created_at";

fn row_to_turn(
    conversation_id: &ConversationId,
    row: &rusqlite::Row<'_>,
) -> Result<ConversationTurn, rusqlite::Error> {
    let sequence: i64 = row.get(0)?;
    let role: String = row.get(1)?;
    let role = Role::from_str(&role)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    Ok(ConversationTurn {
        conversation_id: conversation_id.clone(),
        sequence_number: sequence as u64,
        role,
        text: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Appends `turns` in one immediate transaction.
///
/// `BEGIN IMMEDIATE` takes the write lock before reading the current maximum,
/// so two writers can never compute the same next sequence number.
pub async fn append_turns(
    db: &Database,
    conversation_id: &ConversationId,
    turns: Vec<NewTurn>,
) -> Result<Vec<ConversationTurn>, PitchcraftError> {
    if turns.is_empty() {
        return Ok(Vec::new());
    }
    let cid = conversation_id.clone();
    db.connection()
        .call(move |conn| -> Result<Vec<ConversationTurn>, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let last: i64 = tx.query_row(
                "SELECT COALESCE(MAX(sequence_number), 0) FROM conversation_turns
                 WHERE conversation_id = ?1",
                params![cid.as_str()],
                |row| row.get(0),
            )?;
            let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

            let mut written = Vec::with_capacity(turns.len());
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO conversation_turns
                     (conversation_id, sequence_number, role, text, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for (offset, turn) in turns.into_iter().enumerate() {
                    let sequence = last + 1 + offset as i64;
                    stmt.execute(params![
                        cid.as_str(),
                        sequence,
                        turn.role.as_str(),
                        turn.text,
                        created_at,
                    ])?;
                    written.push(ConversationTurn {
                        conversation_id: cid.clone(),
                        sequence_number: sequence as u64,
                        role: turn.role,
                        text: turn.text,
                        created_at: created_at.clone(),
                    });
                }
            }
            tx.commit()?;
            Ok(written)
        })
        .await
        .map_err(map_tr_err)
}

/// Up to `limit` turns below `before` (all turns when `None`), newest first.
pub async fn turns_before(
    db: &Database,
    conversation_id: &ConversationId,
    before: Option<u64>,
    limit: usize,
) -> Result<Vec<ConversationTurn>, PitchcraftError> {
    let cid = conversation_id.clone();
    let before = before.map_or(i64::MAX, |b| b as i64);
    let limit = limit as i64;
    db.connection()
        .call(move |conn| -> Result<Vec<ConversationTurn>, rusqlite::Error> {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {TURN_COLUMNS} FROM conversation_turns
                 WHERE conversation_id = ?1 AND sequence_number < ?2
                 ORDER BY sequence_number DESC LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![cid.as_str(), before, limit], |row| {
                row_to_turn(&cid, row)
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Every turn of a conversation, oldest first.
pub async fn all_turns(
    db: &Database,
    conversation_id: &ConversationId,
) -> Result<Vec<ConversationTurn>, PitchcraftError> {
    let cid = conversation_id.clone();
    db.connection()
        .call(move |conn| -> Result<Vec<ConversationTurn>, rusqlite::Error> {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {TURN_COLUMNS} FROM conversation_turns
                 WHERE conversation_id = ?1
                 ORDER BY sequence_number ASC"
            ))?;
            let rows = stmt.query_map(params![cid.as_str()], |row| row_to_turn(&cid, row))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn turn_count(
    db: &Database,
    conversation_id: &ConversationId,
) -> Result<u64, PitchcraftError> {
    let cid = conversation_id.clone();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM conversation_turns WHERE conversation_id = ?1",
                params![cid.as_str()],
                |row| row.get(0),
            )
        })
        .await
        .map(|n| n as u64)
        .map_err(map_tr_err)
}
