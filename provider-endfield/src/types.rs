//! Endfield API response types
//!
//! Data structures for deserializing the record API and token service.
//! Only the fields the engine stores are modelled; anything else is ignored.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// `GET /api/record/char` response envelope
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    /// `0` on success
    #[serde(default)]
    pub code: Option<i64>,

    #[serde(default)]
    pub msg: Option<String>,

    #[serde(default)]
    pub data: Option<RecordData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordData {
    /// Newest first
    #[serde(default)]
    pub list: Option<Vec<RecordItem>>,

    #[serde(default)]
    pub has_more: bool,
}

/// One pull as it appears on the wire
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordItem {
    #[serde(default)]
    pub pool_id: String,

    pub pool_name: String,

    #[serde(default)]
    pub char_id: String,

    #[serde(default)]
    pub char_name: String,

    #[serde(default)]
    pub rarity: i32,

    #[serde(default)]
    pub is_free: bool,

    #[serde(default)]
    pub is_new: bool,

    /// Milliseconds, sent as either a string or a number
    #[serde(deserialize_with = "string_or_number")]
    pub gacha_ts: String,

    #[serde(deserialize_with = "string_or_number")]
    pub seq_id: String,
}

/// Token service response envelope
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenServiceResponse {
    #[serde(default)]
    pub code: Option<i64>,

    #[serde(default)]
    pub msg: Option<String>,

    #[serde(default)]
    pub data: Option<UserInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default)]
    pub nick_name: Option<String>,

    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub uid: Option<String>,

    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub role_id: Option<String>,

    #[serde(default)]
    pub u8_token: Option<String>,
}

fn value_to_string<E: de::Error>(value: Value) -> Result<Option<String>, E> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(E::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    value_to_string(Value::deserialize(deserializer)?)?
        .ok_or_else(|| de::Error::custom("expected string or number, got null"))
}

fn optional_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    value_to_string(Value::deserialize(deserializer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record_response() {
        let body = r#"{
            "code": 0,
            "msg": "",
            "data": {
                "list": [
                    {
                        "poolId": "special_1_0_1",
                        "poolName": "Scorching Fang",
                        "charId": "chr_0016_laevat",
                        "charName": "Laevatain",
                        "rarity": 6,
                        "isFree": false,
                        "isNew": true,
                        "gachaTs": "1763712000000",
                        "seqId": "692"
                    }
                ],
                "hasMore": true
            }
        }"#;

        let response: RecordResponse = serde_json::from_str(body).unwrap();
        let data = response.data.unwrap();
        let list = data.list.unwrap();

        assert_eq!(response.code, Some(0));
        assert!(data.has_more);
        assert_eq!(list[0].seq_id, "692");
        assert_eq!(list[0].rarity, 6);
        assert!(list[0].is_new);
    }

    #[test]
    fn test_numeric_seq_and_ts_accepted() {
        let item: RecordItem = serde_json::from_str(
            r#"{"poolName": "Pool A", "gachaTs": 1763712000000, "seqId": 41}"#,
        )
        .unwrap();

        assert_eq!(item.seq_id, "41");
        assert_eq!(item.gacha_ts, "1763712000000");
    }

    #[test]
    fn test_missing_data_parses_as_none() {
        let response: RecordResponse =
            serde_json::from_str(r#"{"code": 10001, "msg": "token invalid"}"#).unwrap();

        assert_eq!(response.code, Some(10001));
        assert!(response.data.is_none());
    }

    #[test]
    fn test_parse_user_info() {
        let response: TokenServiceResponse = serde_json::from_str(
            r#"{"data": {"nickName": "Endmin#1234", "uid": 10001, "roleId": "P1", "u8Token": "u8-abc"}}"#,
        )
        .unwrap();
        let info = response.data.unwrap();

        assert_eq!(info.uid.as_deref(), Some("10001"));
        assert_eq!(info.role_id.as_deref(), Some("P1"));
        assert_eq!(info.u8_token.as_deref(), Some("u8-abc"));
    }
}
