//! Decoding of inbound envelopes. Anything that does not decode is dropped before it reaches the
//! dispatcher.

use crate::models::types::UserId;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("envelope is missing '{0}'")]
    MissingField(&'static str),

    #[error("unknown message type '{0}'")]
    UnknownType(String),

    #[error("bad payload for '{kind}': {source}")]
    BadPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Messages a client may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Auth { user_id: UserId, name: String },
    Command(String),
    ShopBuy { shop: String, index: usize, item: String },
    ShopSell { shop: String, slot: usize, amount: u32 },
    Logout,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AuthPayload {
    user_id: UserId,
    name: String,
}

#[derive(Debug, Deserialize)]
struct BuyPayload {
    shop: String,
    index: usize,
    item: String,
}

#[derive(Debug, Deserialize)]
struct SellPayload {
    shop: String,
    slot: usize,
    #[serde(default = "one")]
    amount: u32,
}

fn one() -> u32 {
    1
}

pub fn decode(text: &str) -> Result<Inbound, ProtocolError> {
    let raw: RawEnvelope = serde_json::from_str(text)?;
    let kind = raw.kind.ok_or(ProtocolError::MissingField("type"))?;
    let payload = raw.payload.ok_or(ProtocolError::MissingField("payload"))?;

    match kind.as_str() {
        "auth" => {
            let p: AuthPayload = payload_as(&kind, payload)?;
            Ok(Inbound::Auth {
                user_id: p.user_id,
                name: p.name,
            })
        }
        "command" => Ok(Inbound::Command(payload_as(&kind, payload)?)),
        "shop:buy" => {
            let p: BuyPayload = payload_as(&kind, payload)?;
            Ok(Inbound::ShopBuy {
                shop: p.shop,
                index: p.index,
                item: p.item,
            })
        }
        "shop:sell" => {
            let p: SellPayload = payload_as(&kind, payload)?;
            Ok(Inbound::ShopSell {
                shop: p.shop,
                slot: p.slot,
                amount: p.amount,
            })
        }
        "logout" => Ok(Inbound::Logout),
        _ => Err(ProtocolError::UnknownType(kind)),
    }
}

fn payload_as<T: DeserializeOwned>(kind: &str, payload: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(payload).map_err(|source| ProtocolError::BadPayload {
        kind: kind.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_every_inbound_type() {
        let uid = UserId::new();
        let auth = format!(r#"{{"type":"auth","payload":{{"user_id":"{uid}","name":"Hero"}}}}"#);
        assert_eq!(
            decode(&auth).unwrap(),
            Inbound::Auth {
                user_id: uid,
                name: "Hero".into()
            }
        );
        assert_eq!(
            decode(r#"{"type":"command","payload":"/who"}"#).unwrap(),
            Inbound::Command("/who".into())
        );
        assert_eq!(
            decode(r#"{"type":"shop:buy","payload":{"shop":"grocer","index":0,"item":"apple"}}"#).unwrap(),
            Inbound::ShopBuy {
                shop: "grocer".into(),
                index: 0,
                item: "apple".into()
            }
        );
        assert_eq!(
            decode(r#"{"type":"shop:sell","payload":{"shop":"grocer","slot":2}}"#).unwrap(),
            Inbound::ShopSell {
                shop: "grocer".into(),
                slot: 2,
                amount: 1
            }
        );
        assert_eq!(decode(r#"{"type":"logout","payload":{}}"#).unwrap(), Inbound::Logout);
    }

    #[test]
    fn envelopes_without_both_fields_are_rejected() {
        assert!(matches!(
            decode(r#"{"payload":"/who"}"#),
            Err(ProtocolError::MissingField("type"))
        ));
        assert!(matches!(
            decode(r#"{"type":"command"}"#),
            Err(ProtocolError::MissingField("payload"))
        ));
        assert!(matches!(decode("not json"), Err(ProtocolError::Json(_))));
    }

    #[test]
    fn unknown_types_and_bad_payloads() {
        assert!(matches!(
            decode(r#"{"type":"dance","payload":{}}"#),
            Err(ProtocolError::UnknownType(_))
        ));
        assert!(matches!(
            decode(r#"{"type":"shop:buy","payload":{"shop":"grocer","index":-1,"item":"apple"}}"#),
            Err(ProtocolError::BadPayload { .. })
        ));
    }
}
