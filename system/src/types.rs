use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub type ConnectionId = uuid::Uuid;

/// Client-supplied entry data, kept as the client sent it.
pub type Payload = Map<String, Value>;

/// Payload key carrying the stroke set an entry belongs to.
pub const GROUP_KEY: &str = "strokeId";

const KIND_KEY: &str = "type";
const AUTHOR_KEY: &str = "id";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Line,
    Image,
    Text,
}

/// Identifier shared by every line segment of one continuous drag.
///
/// Only a truthy `strokeId` names a group: a non-empty string, a number other
/// than zero, or `true`. Ids compare strictly, so the string `"5"` and the
/// number `5` are different groups while `1` and `1.0` are the same one.
/// Objects and arrays never compare equal to another entry's id, which makes
/// them behave exactly like an ungrouped entry.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupId {
    Text(String),
    Number(f64),
    True,
}

impl GroupId {
    pub fn from_payload(payload: &Payload) -> Option<Self> {
        match payload.get(GROUP_KEY)? {
            Value::String(s) if !s.is_empty() => Some(GroupId::Text(s.clone())),
            Value::Number(n) => n
                .as_f64()
                .filter(|n| *n != 0.0 && !n.is_nan())
                .map(GroupId::Number),
            Value::Bool(true) => Some(GroupId::True),
            _ => None,
        }
    }
}

impl From<&str> for GroupId {
    fn from(id: &str) -> Self {
        GroupId::Text(id.to_string())
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupId::Text(s) => write!(f, "{:?}", s),
            GroupId::Number(n) => write!(f, "{}", n),
            GroupId::True => f.write_str("true"),
        }
    }
}

/// One unit of canvas content.
///
/// On the wire an entry is the client's payload with `type` and `id` merged
/// in, which is what clients replay when they receive `history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireEntry")]
pub struct Entry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(rename = "id")]
    pub author_id: ConnectionId,
    #[serde(skip)]
    pub group_id: Option<GroupId>,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Entry {
    pub fn new(kind: EntryKind, author_id: ConnectionId, mut payload: Payload) -> Self {
        // `type` and `id` belong to the server.
        payload.remove(KIND_KEY);
        payload.remove(AUTHOR_KEY);
        let group_id = GroupId::from_payload(&payload);
        Self {
            kind,
            author_id,
            group_id,
            payload,
        }
    }
}

#[derive(Deserialize)]
struct WireEntry {
    #[serde(rename = "type")]
    kind: EntryKind,
    #[serde(rename = "id")]
    author_id: ConnectionId,
    #[serde(flatten)]
    payload: Payload,
}

impl From<WireEntry> for Entry {
    fn from(wire: WireEntry) -> Self {
        Entry::new(wire.kind, wire.author_id, wire.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    fn group_of(value: Value) -> Option<GroupId> {
        GroupId::from_payload(&payload(json!({ "strokeId": value })))
    }

    #[test]
    fn it_reads_group_id_from_stroke_id() {
        assert_eq!(group_of(json!("s1")), Some(GroupId::from("s1")));
        assert_eq!(
            group_of(json!(1700000000123u64)),
            Some(GroupId::Number(1700000000123.0))
        );
        assert_eq!(group_of(json!(true)), Some(GroupId::True));
    }

    #[test]
    fn it_leaves_entry_ungrouped_for_falsy_stroke_id() {
        assert_eq!(GroupId::from_payload(&payload(json!({}))), None);
        for value in [
            json!(null),
            json!(""),
            json!(0),
            json!(0.0),
            json!(-0.0),
            json!(false),
        ] {
            assert_eq!(group_of(value.clone()), None, "{} must not be a group", value);
        }
    }

    #[test]
    fn it_leaves_entry_ungrouped_for_object_stroke_id() {
        assert_eq!(group_of(json!([1])), None);
        assert_eq!(group_of(json!({ "id": 1 })), None);
    }

    #[test]
    fn it_compares_group_ids_strictly() {
        assert_ne!(group_of(json!("5")), group_of(json!(5)));
        assert_eq!(group_of(json!(1)), group_of(json!(1.0)));
        assert_ne!(group_of(json!("true")), group_of(json!(true)));
    }

    #[test]
    fn it_serializes_entry_as_merged_payload() {
        let author = uuid::Uuid::new_v4();
        let entry = Entry::new(
            EntryKind::Line,
            author,
            payload(json!({ "x0": 0.5, "strokeId": "s1", "type": "spoofed", "id": "spoofed" })),
        );
        assert_eq!(entry.group_id, Some(GroupId::from("s1")));

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value,
            json!({ "type": "line", "id": author.to_string(), "x0": 0.5, "strokeId": "s1" })
        );

        let back: Entry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
    }
}
