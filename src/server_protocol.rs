use serde_json::Value;

use crate::types::PlayerInput;

#[derive(Debug, PartialEq)]
pub enum ParsedClientMessage {
    Hello {
        name: Option<String>,
        color: Option<String>,
        reconnect_token: Option<String>,
    },
    Input(PlayerInput),
    Ping {
        t: f64,
    },
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "hello" => {
            let name = parse_optional_string(object.get("name"))?;
            let color = parse_optional_string(object.get("color"))?;
            let reconnect_token = parse_optional_string(object.get("reconnectToken"))?;
            Some(ParsedClientMessage::Hello {
                name,
                color,
                reconnect_token,
            })
        }
        "input" => {
            let attack = parse_optional_i64(object.get("attack"))?;
            let ready = parse_optional_bool(object.get("ready"))?;
            let restart = parse_optional_bool(object.get("restart"))?;
            Some(ParsedClientMessage::Input(PlayerInput {
                attack,
                ready,
                restart,
            }))
        }
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

fn parse_optional_string(value: Option<&Value>) -> Option<Option<String>> {
    match value {
        None | Some(Value::Null) => Some(None),
        Some(value) => Some(Some(value.as_str()?.to_string())),
    }
}

fn parse_optional_bool(value: Option<&Value>) -> Option<Option<bool>> {
    match value {
        None | Some(Value::Null) => Some(None),
        Some(value) => Some(Some(value.as_bool()?)),
    }
}

fn parse_optional_i64(value: Option<&Value>) -> Option<Option<i64>> {
    const MAX_SAFE_INTEGER_F64: f64 = 9_007_199_254_740_991.0;

    let Some(value) = value else {
        return Some(None);
    };
    if value.is_null() {
        return Some(None);
    }
    if let Some(number) = value.as_i64() {
        return Some(Some(number));
    }
    if let Some(number) = value.as_u64() {
        return i64::try_from(number).ok().map(Some);
    }
    if let Some(number) = value.as_f64() {
        if number.is_finite() {
            let floored = number.floor();
            if floored.abs() > MAX_SAFE_INTEGER_F64 {
                return None;
            }
            return Some(Some(floored as i64));
        }
    }
    None
}
