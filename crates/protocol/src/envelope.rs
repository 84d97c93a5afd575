use serde::{Deserialize, Serialize};

use crate::constants::{MessageType, WS_ERR_CODE_INTERNAL, WS_ERR_KIND_INTERNAL};

/// Error block of an `error` envelope.
///
/// `code` is the HTTP-style status, `kind` the machine-readable category
/// (`out_of_order_segment`, `integrity_mismatch`, ...). Clients branch on
/// `kind`; `message` is for humans only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("service error {code} ({kind}): {message}")]
pub struct WsError {
    pub code: i32,
    #[serde(default)]
    pub kind: String,
    pub message: String,
}

impl WsError {
    pub fn new(code: i32, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Envelope for all text WebSocket communication.
///
/// The `payload` field uses `serde_json::value::RawValue` to defer
/// deserialization until the receiver knows which type to expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Box<serde_json::value::RawValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WsError>,
}

impl Message {
    /// Creates a new message with the given type and payload.
    pub fn new<T: Serialize>(
        id: impl Into<String>,
        msg_type: MessageType,
        payload: Option<&T>,
    ) -> Result<Self, serde_json::Error> {
        let raw = match payload {
            Some(p) => Some(serde_json::value::to_raw_value(p)?),
            None => None,
        };
        Ok(Self {
            id: id.into(),
            msg_type,
            payload: raw,
            error: None,
        })
    }

    /// Deserializes the payload into the given type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(
        &self,
    ) -> Result<Option<T>, serde_json::Error> {
        match &self.payload {
            Some(raw) => Ok(Some(serde_json::from_str(raw.get())?)),
            None => Ok(None),
        }
    }

    /// Creates an `error` envelope answering request `id`.
    pub fn error(id: impl Into<String>, error: WsError) -> Self {
        Self {
            id: id.into(),
            msg_type: MessageType::Error,
            payload: None,
            error: Some(error),
        }
    }

    /// Creates a response message for this request.
    pub fn reply<T: Serialize>(
        &self,
        msg_type: MessageType,
        payload: Option<&T>,
    ) -> Result<Self, serde_json::Error> {
        Message::new(&self.id, msg_type, payload)
    }

    /// Splits a response into success and failure.
    ///
    /// An `error` envelope that lost its error block still fails, as an
    /// internal error.
    pub fn into_result(self) -> Result<Self, WsError> {
        let Message {
            id,
            msg_type,
            payload,
            error,
        } = self;
        match error {
            Some(err) => Err(err),
            None if msg_type == MessageType::Error => Err(WsError::new(
                WS_ERR_CODE_INTERNAL,
                WS_ERR_KIND_INTERNAL,
                "error response without details",
            )),
            None => Ok(Message {
                id,
                msg_type,
                payload,
                error: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::InfoResponse;

    #[test]
    fn message_new_without_payload() {
        let msg = Message::new::<()>("msg-2", MessageType::Ping, None).unwrap();
        assert!(msg.payload.is_none());
        assert!(msg.error.is_none());
    }

    #[test]
    fn error_envelope_carries_kind() {
        let msg = Message::error("m", WsError::new(409, "out_of_order_segment", "expected 3"));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["error"]["kind"], "out_of_order_segment");
        assert_eq!(json["error"]["code"], 409);
        assert!(json.get("payload").is_none());
    }

    #[test]
    fn error_without_kind_still_parses() {
        let msg: Message =
            serde_json::from_str(r#"{"id":"e1","type":"error","error":{"code":500,"message":"x"}}"#)
                .unwrap();
        let err = msg.into_result().unwrap_err();
        assert_eq!(err.code, 500);
        assert_eq!(err.kind, "");
    }

    #[test]
    fn ws_error_display() {
        let err = WsError::new(406, "integrity_mismatch", "sha256 differs");
        assert_eq!(
            err.to_string(),
            "service error 406 (integrity_mismatch): sha256 differs"
        );
    }

    #[test]
    fn message_parse_payload() {
        let resp = InfoResponse {
            service_type: "svc".into(),
            service_id: "abc".into(),
            version: "0.1.0".into(),
            active_transfers: 2,
        };
        let msg = Message::new("m1", MessageType::InfoResponse, Some(&resp)).unwrap();
        let parsed: Option<InfoResponse> = msg.parse_payload().unwrap();
        assert_eq!(parsed.unwrap(), resp);
    }

    #[test]
    fn into_result_passes_responses_through() {
        let msg = Message::new::<()>("r1", MessageType::Pong, None).unwrap();
        let ok = msg.into_result().unwrap();
        assert_eq!(ok.id, "r1");
        assert_eq!(ok.msg_type, MessageType::Pong);
    }

    #[test]
    fn into_result_rejects_bare_error_type() {
        let msg = Message::new::<()>("r2", MessageType::Error, None).unwrap();
        let err = msg.into_result().unwrap_err();
        assert_eq!(err.code, WS_ERR_CODE_INTERNAL);
        assert_eq!(err.kind, WS_ERR_KIND_INTERNAL);
    }

    #[test]
    fn reply_keeps_request_id() {
        let req = Message::new::<()>("req-42", MessageType::Ping, None).unwrap();
        let pong = req.reply::<()>(MessageType::Pong, None).unwrap();
        assert_eq!(pong.id, "req-42");
        assert_eq!(pong.msg_type, MessageType::Pong);
    }
}
