//! Request routing for the presentation layer, without a transport.
//!
//! Routes:
//!
//! ```text
//! GET  /keys/:creatorId                  key state
//! POST /keys/:creatorId/quote            {side, quantity}
//! POST /keys/:creatorId/buy              {userId, quantity, maxTotalCost}
//! POST /keys/:creatorId/sell             {userId, quantity}
//! GET  /users/:userId/portfolio          portfolio valuation
//! GET  /users/:userId/access/:creatorId  room access
//! GET  /users/:userId/rooms              rooms the user may enter
//! ```
//!
//! `maxTotalCost` is written in major units (e.g. `"0.0033"`), as a string or a
//! JSON number. Amounts in responses are minor units.

use crate::creator::{Creator, KeyView};
use crate::engine::{Engine, EngineError, TradeQuote};
use crate::portfolio::Portfolio;
use crate::trade::Trade;
use crate::types::{CreatorId, Side, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequest {
    GetKey {
        creator_id: CreatorId,
    },
    Quote {
        creator_id: CreatorId,
        side: Side,
        quantity: u64,
    },
    Buy {
        creator_id: CreatorId,
        user_id: UserId,
        quantity: u64,
        max_total_cost: Decimal,
    },
    Sell {
        creator_id: CreatorId,
        user_id: UserId,
        quantity: u64,
    },
    Portfolio {
        user_id: UserId,
    },
    Access {
        user_id: UserId,
        creator_id: CreatorId,
    },
    Rooms {
        user_id: UserId,
    },
}

impl ApiRequest {
    pub fn parse(method: &str, path: &str, body: &str) -> Result<Self, ApiError> {
        let path = path.split('?').next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let method = method.to_ascii_uppercase();

        match (method.as_str(), segments.as_slice()) {
            ("GET", ["keys", creator]) => Ok(ApiRequest::GetKey {
                creator_id: CreatorId::new(*creator),
            }),
            ("POST", ["keys", creator, "quote"]) => {
                let body = parse_body(body)?;
                Ok(ApiRequest::Quote {
                    creator_id: CreatorId::new(*creator),
                    side: side_field(&body)?,
                    quantity: quantity_field(&body)?,
                })
            }
            ("POST", ["keys", creator, "buy"]) => {
                let body = parse_body(body)?;
                Ok(ApiRequest::Buy {
                    creator_id: CreatorId::new(*creator),
                    user_id: user_field(&body)?,
                    quantity: quantity_field(&body)?,
                    max_total_cost: amount_field(&body, "maxTotalCost")?,
                })
            }
            ("POST", ["keys", creator, "sell"]) => {
                let body = parse_body(body)?;
                Ok(ApiRequest::Sell {
                    creator_id: CreatorId::new(*creator),
                    user_id: user_field(&body)?,
                    quantity: quantity_field(&body)?,
                })
            }
            ("GET", ["users", user, "portfolio"]) => Ok(ApiRequest::Portfolio {
                user_id: UserId::new(*user),
            }),
            ("GET", ["users", user, "access", creator]) => Ok(ApiRequest::Access {
                user_id: UserId::new(*user),
                creator_id: CreatorId::new(*creator),
            }),
            ("GET", ["users", user, "rooms"]) => Ok(ApiRequest::Rooms {
                user_id: UserId::new(*user),
            }),
            (_, ["keys", ..]) | (_, ["users", ..]) if route_exists(&segments) => Err(ApiError::new(
                ErrorCode::MethodNotAllowed,
                format!("{method} not allowed on /{}", segments.join("/")),
            )),
            _ => Err(ApiError::new(
                ErrorCode::RouteNotFound,
                format!("no route for {method} /{}", segments.join("/")),
            )),
        }
    }
}

fn route_exists(segments: &[&str]) -> bool {
    matches!(
        segments,
        ["keys", _]
            | ["keys", _, "quote" | "buy" | "sell"]
            | ["users", _, "portfolio" | "rooms"]
            | ["users", _, "access", _]
    )
}

fn parse_body(body: &str) -> Result<Value, ApiError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ApiError::new(ErrorCode::InvalidRequest, format!("body is not JSON: {e}")))?;
    if !value.is_object() {
        return Err(ApiError::new(ErrorCode::InvalidRequest, "body must be a JSON object"));
    }
    Ok(value)
}

fn user_field(body: &Value) -> Result<UserId, ApiError> {
    match body.get("userId") {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(UserId::new(s.clone())),
        _ => Err(ApiError::new(ErrorCode::InvalidRequest, "userId must be a non-empty string")),
    }
}

// zero, negative, fractional and non-numeric all fail the same way
fn quantity_field(body: &Value) -> Result<u64, ApiError> {
    let invalid = |shown: String| {
        ApiError::new(
            ErrorCode::InvalidQuantity,
            format!("quantity must be a positive integer, got {shown}"),
        )
    };
    match body.get("quantity") {
        Some(Value::Number(n)) => n
            .as_u64()
            .filter(|q| *q > 0)
            .ok_or_else(|| invalid(n.to_string())),
        Some(other) => Err(invalid(other.to_string())),
        None => Err(invalid("nothing".to_string())),
    }
}

fn amount_field(body: &Value, field: &str) -> Result<Decimal, ApiError> {
    let text = match body.get(field) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(ApiError::new(
                ErrorCode::InvalidRequest,
                format!("{field} must be a decimal amount"),
            ))
        }
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| ApiError::new(ErrorCode::InvalidRequest, format!("{field} {text:?} is not a decimal")))
}

fn side_field(body: &Value) -> Result<Side, ApiError> {
    match body.get("side").and_then(Value::as_str) {
        Some("buy") => Ok(Side::Buy),
        Some("sell") => Ok(Side::Sell),
        _ => Err(ApiError::new(ErrorCode::InvalidRequest, "side must be \"buy\" or \"sell\"")),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessView {
    pub user_id: UserId,
    pub creator_id: CreatorId,
    pub has_access: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomView {
    pub creator_id: CreatorId,
    pub username: String,
    pub chat_room_name: String,
    pub chat_room_description: String,
}

impl From<Creator> for RoomView {
    fn from(creator: Creator) -> Self {
        Self {
            creator_id: creator.id,
            username: creator.username,
            chat_room_name: creator.chat_room_name,
            chat_room_description: creator.chat_room_description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ApiResponse {
    Key(KeyView),
    Quote(TradeQuote),
    Trade(Trade),
    Portfolio(Portfolio),
    Access(AccessView),
    Rooms(Vec<RoomView>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidQuantity,
    InsufficientHoldings,
    SupplyExceeded,
    SlippageExceeded,
    EngineBusy,
    Conflict,
    StoreUnavailable,
    NotFound,
    AlreadyExists,
    Unauthorized,
    InvalidRequest,
    Overflow,
    RouteNotFound,
    MethodNotAllowed,
}

impl ErrorCode {
    fn status(self) -> u16 {
        match self {
            ErrorCode::InvalidQuantity | ErrorCode::InvalidRequest => 400,
            ErrorCode::Unauthorized => 403,
            ErrorCode::NotFound | ErrorCode::RouteNotFound => 404,
            ErrorCode::MethodNotAllowed => 405,
            ErrorCode::SupplyExceeded
            | ErrorCode::SlippageExceeded
            | ErrorCode::Conflict
            | ErrorCode::AlreadyExists => 409,
            ErrorCode::InsufficientHoldings | ErrorCode::Overflow => 422,
            ErrorCode::StoreUnavailable => 500,
            ErrorCode::EngineBusy => 503,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub status: u16,
    pub retryable: bool,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: code.status(),
            retryable: false,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let code = match &err {
            EngineError::InvalidQuantity(_) => ErrorCode::InvalidQuantity,
            EngineError::InsufficientHoldings { .. } => ErrorCode::InsufficientHoldings,
            EngineError::SupplyExceeded { .. } => ErrorCode::SupplyExceeded,
            EngineError::SlippageExceeded { .. } => ErrorCode::SlippageExceeded,
            EngineError::EngineBusy(_) => ErrorCode::EngineBusy,
            EngineError::Conflict(_) => ErrorCode::Conflict,
            EngineError::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            EngineError::CreatorNotFound(_) => ErrorCode::NotFound,
            EngineError::CreatorExists(_) => ErrorCode::AlreadyExists,
            EngineError::Unauthorized(_) => ErrorCode::Unauthorized,
            EngineError::InvalidRevenueShare(_) | EngineError::InvalidCurve(_) => ErrorCode::InvalidRequest,
            EngineError::Overflow => ErrorCode::Overflow,
        };
        Self {
            code,
            message: err.to_string(),
            status: err.status_code(),
            retryable: err.is_retryable(),
        }
    }
}

pub fn handle(engine: &Engine, request: ApiRequest) -> Result<ApiResponse, ApiError> {
    match request {
        ApiRequest::GetKey { creator_id } => Ok(ApiResponse::Key(engine.key(&creator_id)?)),
        ApiRequest::Quote {
            creator_id,
            side,
            quantity,
        } => {
            let quote = match side {
                Side::Buy => engine.quote_buy(&creator_id, quantity)?,
                Side::Sell => engine.quote_sell(&creator_id, quantity)?,
            };
            Ok(ApiResponse::Quote(quote))
        }
        ApiRequest::Buy {
            creator_id,
            user_id,
            quantity,
            max_total_cost,
        } => {
            let denomination = &engine.config().denomination;
            let limit = denomination.to_minor(max_total_cost).ok_or_else(|| {
                ApiError::new(
                    ErrorCode::InvalidRequest,
                    format!(
                        "maxTotalCost {max_total_cost} is not a valid {} amount",
                        denomination.symbol
                    ),
                )
            })?;
            Ok(ApiResponse::Trade(engine.buy(&user_id, &creator_id, quantity, limit)?))
        }
        ApiRequest::Sell {
            creator_id,
            user_id,
            quantity,
        } => Ok(ApiResponse::Trade(engine.sell(&user_id, &creator_id, quantity)?)),
        ApiRequest::Portfolio { user_id } => Ok(ApiResponse::Portfolio(engine.portfolio(&user_id)?)),
        ApiRequest::Access { user_id, creator_id } => {
            let has_access = engine.has_access(&user_id, &creator_id)?;
            Ok(ApiResponse::Access(AccessView {
                user_id,
                creator_id,
                has_access,
            }))
        }
        ApiRequest::Rooms { user_id } => Ok(ApiResponse::Rooms(
            engine
                .accessible_rooms(&user_id)?
                .into_iter()
                .map(RoomView::from)
                .collect(),
        )),
    }
}

/// Parses, dispatches and serializes in one step. returns the status and JSON body.
pub fn handle_json(engine: &Engine, method: &str, path: &str, body: &str) -> (u16, String) {
    let result = ApiRequest::parse(method, path, body).and_then(|request| handle(engine, request));
    let (status, json) = match result {
        Ok(response) => (200, serde_json::to_string(&response)),
        Err(err) => {
            if err.status >= 500 {
                tracing::warn!(method, path, code = ?err.code, message = %err.message, "request failed");
            }
            (err.status, serde_json::to_string(&err))
        }
    };
    match json {
        Ok(json) => (status, json),
        Err(e) => (500, internal_error_body(&e.to_string())),
    }
}

fn internal_error_body(message: &str) -> String {
    serde_json::json!({ "code": "internal", "message": message }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurveConfig;
    use crate::engine::EngineConfig;
    use crate::types::{Amount, SharePercent};

    fn engine() -> Engine {
        let engine = Engine::in_memory(EngineConfig::default());
        engine
            .register_creator(Creator::new(
                CreatorId::new("1"),
                "techguru",
                CurveConfig::new(
                    Amount::new(1_000_000_000_000_000),
                    Amount::new(100_000_000_000_000),
                    None,
                ),
                SharePercent::new(10).unwrap(),
            ))
            .unwrap();
        engine
    }

    #[test]
    fn parses_routes() {
        assert_eq!(
            ApiRequest::parse("GET", "/keys/1", "").unwrap(),
            ApiRequest::GetKey {
                creator_id: CreatorId::new("1")
            }
        );
        assert_eq!(
            ApiRequest::parse("get", "/users/bob/access/1?x=y", "").unwrap(),
            ApiRequest::Access {
                user_id: UserId::new("bob"),
                creator_id: CreatorId::new("1")
            }
        );
        assert_eq!(
            ApiRequest::parse("POST", "/keys/1/buy", r#"{"userId":"bob","quantity":3,"maxTotalCost":"0.0033"}"#)
                .unwrap(),
            ApiRequest::Buy {
                creator_id: CreatorId::new("1"),
                user_id: UserId::new("bob"),
                quantity: 3,
                max_total_cost: Decimal::new(33, 4),
            }
        );
    }

    #[test]
    fn bad_quantities() {
        for q in ["0", "-1", "1.5", "\"3\"", "null"] {
            let body = format!(r#"{{"userId":"bob","quantity":{q}}}"#);
            let err = ApiRequest::parse("POST", "/keys/1/sell", &body).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidQuantity, "quantity {q}");
            assert_eq!(err.status, 400);
        }
    }

    #[test]
    fn unknown_route_and_method() {
        assert_eq!(
            ApiRequest::parse("GET", "/nowhere", "").unwrap_err().code,
            ErrorCode::RouteNotFound
        );
        assert_eq!(
            ApiRequest::parse("DELETE", "/keys/1", "").unwrap_err().code,
            ErrorCode::MethodNotAllowed
        );
    }

    #[test]
    fn buy_then_check_access_through_json() {
        let engine = engine();
        let (status, body) = handle_json(
            &engine,
            "POST",
            "/keys/1/buy",
            r#"{"userId":"bob","quantity":3,"maxTotalCost":0.0033}"#,
        );
        assert_eq!(status, 200, "{body}");
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["type"], "trade");
        assert_eq!(value["data"]["supply_after"], 3);

        let (status, body) = handle_json(&engine, "GET", "/users/bob/access/1", "");
        assert_eq!(status, 200);
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["data"]["has_access"], true);
    }

    #[test]
    fn slippage_is_409() {
        let engine = engine();
        let (status, body) = handle_json(
            &engine,
            "POST",
            "/keys/1/buy",
            r#"{"userId":"bob","quantity":3,"maxTotalCost":"0.0032"}"#,
        );
        assert_eq!(status, 409);
        let err: ApiError = serde_json::from_str(&body).unwrap();
        assert_eq!(err.code, ErrorCode::SlippageExceeded);
        assert!(!err.retryable);
    }

    #[test]
    fn unknown_creator_is_404() {
        let engine = engine();
        let (status, _) = handle_json(&engine, "GET", "/keys/42", "");
        assert_eq!(status, 404);
    }

    #[test]
    fn over_precise_limit_rejected() {
        let engine = engine();
        let request = ApiRequest::Buy {
            creator_id: CreatorId::new("1"),
            user_id: UserId::new("bob"),
            quantity: 1,
            max_total_cost: Decimal::from_str("0.0000000000000000001").unwrap(),
        };
        assert_eq!(handle(&engine, request).unwrap_err().code, ErrorCode::InvalidRequest);
    }

    #[test]
    fn internal_error_body_escapes_message() {
        let body = internal_error_body("bad \"value\"\nat line 1");
        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["code"], "internal");
        assert_eq!(parsed["message"], "bad \"value\"\nat line 1");
    }
}
