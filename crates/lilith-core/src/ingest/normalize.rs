//! Mapping raw transport records into canonical rows.
//!
//! Every function here is pure and never fails: missing or mistyped fields
//! become empty strings, `None`, or `MessageType::Unknown`.

use chrono::{DateTime, TimeDelta, Utc};
use lilith_types::chat::ChatRow;
use lilith_types::contact::ContactRow;
use lilith_types::event::{IdentityMapping, RawRecord};
use lilith_types::message::{MessageKey, MessageRow};
use serde_json::Value;
use tracing::warn;

use super::content::{classify, extract_body};
use super::jid;

/// How far ahead of the processing clock a timestamp may be before it is
/// treated as corrupt.
const MAX_FUTURE_SKEW: TimeDelta = TimeDelta::days(1);

/// Build a chat row from a raw chat record.
pub fn to_chat_row(raw: &RawRecord) -> ChatRow {
    let external_key = raw.str_field("id").unwrap_or_default().to_string();
    let name = raw
        .text_field("name")
        .or_else(|| raw.text_field("displayName"))
        .map(str::to_owned);
    let alt_key = raw
        .text_field("pnJid")
        .map(str::to_owned)
        .or_else(|| jid::is_phone_linked(&external_key).then(|| external_key.clone()));

    ChatRow {
        is_group: jid::is_group(&external_key),
        external_key,
        alt_key,
        name,
    }
}

/// Chat row for a chat known only by its key.
pub fn chat_row_for_key(key: &str) -> ChatRow {
    let mut raw = RawRecord::default();
    raw.0.insert("id".to_string(), Value::String(key.to_string()));
    to_chat_row(&raw)
}

/// Build a contact row from a raw contact record.
pub fn to_contact_row(raw: &RawRecord) -> ContactRow {
    let identity_key = raw.str_field("id").unwrap_or_default().to_string();
    let phone_number = raw
        .text_field("phoneNumber")
        .map(normalize_phone)
        .or_else(|| jid::phone_number(&identity_key));
    let anon_key = raw
        .text_field("lid")
        .map(str::to_owned)
        .or_else(|| jid::is_anonymized(&identity_key).then(|| identity_key.clone()));
    let display_name = raw
        .text_field("name")
        .or_else(|| raw.text_field("notify"))
        .or_else(|| raw.text_field("verifiedName"))
        .map(str::to_owned);

    ContactRow {
        identity_key,
        phone_number,
        anon_key,
        display_name,
    }
}

/// Contact row recording that `mapping.lid` belongs to `mapping.pn`.
pub fn contact_row_for_mapping(mapping: &IdentityMapping) -> ContactRow {
    ContactRow {
        identity_key: mapping.lid.clone(),
        phone_number: Some(normalize_phone(&mapping.pn)),
        anon_key: Some(mapping.lid.clone()),
        display_name: None,
    }
}

/// Phone-linked keys are reduced to their digits; anything else is kept.
fn normalize_phone(value: &str) -> String {
    jid::phone_number(value).unwrap_or_else(|| value.trim().to_string())
}

/// Read the addressing block (`key`) of a raw message.
///
/// Empty strings count as absent, so a message with `"id": ""` is unkeyable.
pub fn message_key(raw: &RawRecord) -> MessageKey {
    let Some(key) = raw.object("key") else {
        return MessageKey::default();
    };
    let text = |field: &str| key.text_field(field).map(str::to_owned);

    MessageKey {
        remote_key: text("remoteJid"),
        remote_key_alt: text("remoteJidAlt"),
        id: text("id"),
        from_me: key.bool_field("fromMe").unwrap_or(false),
        participant: text("participant"),
        participant_alt: text("participantAlt"),
    }
}

/// Build a message row, using the wall clock as processing time.
pub fn to_message_row(chat_id: i64, key: &MessageKey, raw: &RawRecord) -> MessageRow {
    to_message_row_at(chat_id, key, raw, Utc::now())
}

/// Build a message row relative to an explicit processing time `now`.
pub fn to_message_row_at(
    chat_id: i64,
    key: &MessageKey,
    raw: &RawRecord,
    now: DateTime<Utc>,
) -> MessageRow {
    let conversation_key = key.remote_key.clone().unwrap_or_default();
    let external_message_id = key.id.clone().unwrap_or_default();
    let content = raw.get("message");

    MessageRow {
        chat_id,
        timestamp: message_timestamp(raw, now, &external_message_id),
        message_type: classify(content),
        body_text: extract_body(content),
        phone_number: counterparty_phone(key),
        raw_payload: content.filter(|c| c.is_object()).cloned(),
        conversation_alt_key: key.remote_key_alt.clone(),
        participant_key: key.participant.clone(),
        participant_alt_key: key.participant_alt.clone(),
        is_outbound: key.from_me,
        external_message_id,
        conversation_key,
    }
}

/// In a group the counterparty is the participant; otherwise it is the
/// conversation itself. The alternate form is used when the primary key is
/// not phone-linked.
fn counterparty_phone(key: &MessageKey) -> Option<String> {
    let conversation = key.remote_key.as_deref().unwrap_or_default();
    let (primary, alternate) = if jid::is_group(conversation) {
        (key.participant.as_deref(), key.participant_alt.as_deref())
    } else {
        (Some(conversation), key.remote_key_alt.as_deref())
    };

    primary
        .and_then(jid::phone_number)
        .or_else(|| alternate.and_then(jid::phone_number))
}

fn message_timestamp(raw: &RawRecord, now: DateTime<Utc>, message_id: &str) -> DateTime<Utc> {
    let Some(seconds) = raw.get("messageTimestamp").and_then(epoch_seconds) else {
        return now;
    };

    match DateTime::from_timestamp(seconds, 0) {
        Some(ts) if ts <= now + MAX_FUTURE_SKEW => ts,
        _ => {
            warn!(
                message_id,
                seconds, "message timestamp is implausibly far in the future, using current time"
            );
            now
        }
    }
}

/// Seconds since the epoch from a number, a numeric string, or a
/// `{low, high}` 64-bit long object.
fn epoch_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|v| v.min(i64::MAX as u64) as i64))
            .or_else(|| n.as_f64().map(|v| v as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(long) => {
            let low = long.get("low")?.as_i64()?;
            let high = long.get("high").and_then(Value::as_i64).unwrap_or(0);
            Some((high << 32) | (low & 0xFFFF_FFFF))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lilith_types::message::MessageType;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        RawRecord::from_value(value).unwrap()
    }

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-12T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn dm_message(timestamp: Value) -> RawRecord {
        record(json!({
            "key": {
                "remoteJid": "31612345678@s.whatsapp.net",
                "id": "3EB0C767D26A1B2C",
                "fromMe": false,
            },
            "messageTimestamp": timestamp,
            "message": { "conversation": "hello" },
        }))
    }

    #[test]
    fn chat_row_individual() {
        let row = to_chat_row(&record(json!({
            "id": "31612345678@s.whatsapp.net",
            "name": "Alice",
        })));
        assert_eq!(row.external_key, "31612345678@s.whatsapp.net");
        assert!(!row.is_group);
        assert_eq!(row.name.as_deref(), Some("Alice"));
        assert_eq!(row.alt_key.as_deref(), Some("31612345678@s.whatsapp.net"));
    }

    #[test]
    fn chat_row_group_uses_display_name() {
        let row = to_chat_row(&record(json!({
            "id": "120363025246125888@g.us",
            "displayName": "Family",
        })));
        assert!(row.is_group);
        assert_eq!(row.name.as_deref(), Some("Family"));
        assert_eq!(row.alt_key, None);
    }

    #[test]
    fn chat_row_anonymized_with_explicit_alt() {
        let row = to_chat_row(&record(json!({
            "id": "214215855980743@lid",
            "pnJid": "60173135062@s.whatsapp.net",
        })));
        assert_eq!(row.alt_key.as_deref(), Some("60173135062@s.whatsapp.net"));
        assert_eq!(row.name, None);
    }

    #[test]
    fn chat_row_missing_id_is_empty_string() {
        let row = to_chat_row(&record(json!({ "id": 12, "name": "" })));
        assert_eq!(row.external_key, "");
        assert_eq!(row.name, None);
        assert!(!row.is_group);
    }

    #[test]
    fn contact_row_name_preference() {
        let saved = to_contact_row(&record(json!({
            "id": "31612345678@s.whatsapp.net",
            "name": "Saved",
            "notify": "Pushed",
            "verifiedName": "Business",
        })));
        assert_eq!(saved.display_name.as_deref(), Some("Saved"));

        let pushed = to_contact_row(&record(json!({
            "id": "31612345678@s.whatsapp.net",
            "notify": "Pushed",
            "verifiedName": "Business",
        })));
        assert_eq!(pushed.display_name.as_deref(), Some("Pushed"));

        let business = to_contact_row(&record(json!({
            "id": "31612345678@s.whatsapp.net",
            "verifiedName": "Business",
        })));
        assert_eq!(business.display_name.as_deref(), Some("Business"));
    }

    #[test]
    fn contact_row_derives_phone_and_anon_key() {
        let pn = to_contact_row(&record(json!({ "id": "31612345678@s.whatsapp.net" })));
        assert_eq!(pn.phone_number.as_deref(), Some("31612345678"));
        assert_eq!(pn.anon_key, None);

        let lid = to_contact_row(&record(json!({ "id": "214215855980743@lid" })));
        assert_eq!(lid.phone_number, None);
        assert_eq!(lid.anon_key.as_deref(), Some("214215855980743@lid"));

        let explicit = to_contact_row(&record(json!({
            "id": "214215855980743@lid",
            "phoneNumber": "60173135062@s.whatsapp.net",
        })));
        assert_eq!(explicit.phone_number.as_deref(), Some("60173135062"));
    }

    #[test]
    fn message_key_reads_addressing_block() {
        let key = message_key(&record(json!({
            "key": {
                "remoteJid": "120363025246125888@g.us",
                "id": "ABC",
                "fromMe": true,
                "participant": "214215855980743@lid",
                "participantAlt": "60173135062@s.whatsapp.net",
            }
        })));
        assert_eq!(key.remote_key.as_deref(), Some("120363025246125888@g.us"));
        assert_eq!(key.id.as_deref(), Some("ABC"));
        assert!(key.from_me);
        assert_eq!(key.participant_alt.as_deref(), Some("60173135062@s.whatsapp.net"));

        assert_eq!(message_key(&record(json!({ "key": "nope" }))), MessageKey::default());
        assert_eq!(
            message_key(&record(json!({ "key": { "remoteJid": "", "id": "X" } }))).remote_key,
            None
        );
    }

    #[test]
    fn message_row_dm_phone_from_conversation_key() {
        let raw = dm_message(json!(1_770_890_000));
        let key = message_key(&raw);
        let row = to_message_row_at(7, &key, &raw, fixed_now());

        assert_eq!(row.chat_id, 7);
        assert_eq!(row.external_message_id, "3EB0C767D26A1B2C");
        assert_eq!(row.conversation_key, "31612345678@s.whatsapp.net");
        assert_eq!(row.phone_number.as_deref(), Some("31612345678"));
        assert_eq!(row.message_type, MessageType::Text);
        assert_eq!(row.body_text.as_deref(), Some("hello"));
        assert_eq!(row.raw_payload, Some(json!({ "conversation": "hello" })));
        assert!(!row.is_outbound);
    }

    #[test]
    fn message_row_group_phone_from_participant() {
        let raw = record(json!({
            "key": {
                "remoteJid": "120363025246125888@g.us",
                "id": "G1",
                "participant": "31687654321@s.whatsapp.net",
            },
            "message": { "imageMessage": { "caption": "pic" } },
        }));
        let key = message_key(&raw);
        let row = to_message_row_at(1, &key, &raw, fixed_now());
        assert_eq!(row.phone_number.as_deref(), Some("31687654321"));
        assert_eq!(row.message_type, MessageType::Image);
    }

    #[test]
    fn message_row_group_anonymized_participant_falls_back_to_alt() {
        let raw = record(json!({
            "key": {
                "remoteJid": "120363025246125888@g.us",
                "id": "G2",
                "participant": "214215855980743@lid",
                "participantAlt": "60173135062@s.whatsapp.net",
            },
        }));
        let row = to_message_row_at(1, &message_key(&raw), &raw, fixed_now());
        assert_eq!(row.phone_number.as_deref(), Some("60173135062"));
        assert_eq!(row.raw_payload, None);
        assert_eq!(row.message_type, MessageType::Unknown);
    }

    #[test]
    fn timestamp_in_past_is_preserved() {
        let raw = dm_message(json!(1_770_890_000));
        let row = to_message_row_at(1, &message_key(&raw), &raw, fixed_now());
        assert_eq!(row.timestamp.timestamp(), 1_770_890_000);
    }

    #[test]
    fn timestamp_within_next_day_is_preserved() {
        let now = fixed_now();
        let soon = now.timestamp() + 23 * 3600;
        let raw = dm_message(json!(soon));
        let row = to_message_row_at(1, &message_key(&raw), &raw, now);
        assert_eq!(row.timestamp.timestamp(), soon);
    }

    #[test]
    fn timestamp_beyond_next_day_is_replaced() {
        let now = fixed_now();
        let corrupt = now.timestamp() + 25 * 3600;
        let raw = dm_message(json!(corrupt));
        let row = to_message_row_at(1, &message_key(&raw), &raw, now);
        assert_eq!(row.timestamp, now);

        let huge = dm_message(json!(u64::MAX));
        let row = to_message_row_at(1, &message_key(&huge), &huge, now);
        assert_eq!(row.timestamp, now);
    }

    #[test]
    fn timestamp_alternate_encodings() {
        let now = fixed_now();
        let as_string = dm_message(json!("1770890000"));
        let row = to_message_row_at(1, &message_key(&as_string), &as_string, now);
        assert_eq!(row.timestamp.timestamp(), 1_770_890_000);

        let as_long = dm_message(json!({ "low": 1_770_890_000, "high": 0, "unsigned": true }));
        let row = to_message_row_at(1, &message_key(&as_long), &as_long, now);
        assert_eq!(row.timestamp.timestamp(), 1_770_890_000);

        let missing = record(json!({ "key": { "remoteJid": "1@s.whatsapp.net", "id": "M" } }));
        let row = to_message_row_at(1, &message_key(&missing), &missing, now);
        assert_eq!(row.timestamp, now);
    }

    #[test]
    fn contact_row_for_mapping_attaches_phone() {
        let row = contact_row_for_mapping(&IdentityMapping {
            lid: "abc@lid".to_string(),
            pn: "31612345678@s.whatsapp.net".to_string(),
        });
        assert_eq!(row.identity_key, "abc@lid");
        assert_eq!(row.anon_key.as_deref(), Some("abc@lid"));
        assert_eq!(row.phone_number.as_deref(), Some("31612345678"));
    }
}
