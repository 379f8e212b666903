//! NIP-47 wallet connect.
//!
//! A connection URI hands the client a dedicated secret and the wallet
//! service's pubkey:
//!
//! ```text
//! nostr+walletconnect://<wallet pubkey hex>?relay=wss://...&secret=<hex>&lud16=name@host
//! ```
//!
//! Requests are kind 23194 events signed with that secret, `p`-tagged with
//! the wallet, their JSON body NIP-04 encrypted between the two keys.
//! Responses come back as kind 23195 with an `e` tag naming the request.

use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;
use url::Url;

use crate::event::{Event, EventError, EventId, Kind, Tag};
use crate::identity::{decode_public, IdentityError, KeyPair};
use crate::nip04::{self, Nip04Error};

pub const URI_SCHEME: &str = "nostr+walletconnect";

/// Errors from wallet connect.
#[derive(Debug, Error)]
pub enum NwcError {
    #[error("invalid connection uri: {0}")]
    Uri(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("key: {0}")]
    Identity(#[from] IdentityError),

    #[error("encryption: {0}")]
    Encryption(#[from] Nip04Error),

    #[error("event: {0}")]
    Event(#[from] EventError),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected event kind {0}")]
    UnexpectedKind(Kind),

    #[error("response not signed by the wallet service")]
    WrongSender,

    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("response has neither result nor error")]
    MissingResult,
}

/// A parsed `nostr+walletconnect://` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletConnectUri {
    pub wallet_pubkey: XOnlyPublicKey,
    pub relays: Vec<Url>,
    /// The client's signing key for this connection.
    pub secret: KeyPair,
    pub lud16: Option<String>,
}

impl WalletConnectUri {
    pub fn parse(uri: &str) -> Result<Self, NwcError> {
        let url = Url::parse(uri.trim())?;
        if url.scheme() != URI_SCHEME {
            return Err(NwcError::Uri(format!("scheme '{}'", url.scheme())));
        }

        // `scheme://pubkey` puts the key in the host, `scheme:pubkey` in the path
        let pubkey = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => url.path().trim_start_matches('/').to_string(),
        };
        let wallet_pubkey = decode_public(&pubkey)?;

        let mut relays = Vec::new();
        let mut secret = None;
        let mut lud16 = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "relay" => relays.push(Url::parse(&value)?),
                "secret" => secret = Some(KeyPair::from_secret_str(&value)?),
                "lud16" => lud16 = Some(value.into_owned()),
                _ => {}
            }
        }

        let secret = secret.ok_or_else(|| NwcError::Uri("missing secret".into()))?;
        if relays.is_empty() {
            return Err(NwcError::Uri("missing relay".into()));
        }

        Ok(Self {
            wallet_pubkey,
            relays,
            secret,
            lud16,
        })
    }

    /// The client-side connection pubkey the wallet sees.
    pub fn client_pubkey(&self) -> XOnlyPublicKey {
        self.secret.public_key()
    }
}

impl fmt::Display for WalletConnectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut url = Url::parse(&format!(
            "{}://{}",
            URI_SCHEME,
            hex::encode(self.wallet_pubkey.serialize())
        ))
        .map_err(|_| fmt::Error)?;
        {
            let mut query = url.query_pairs_mut();
            for relay in &self.relays {
                query.append_pair("relay", relay.as_str());
            }
            query.append_pair("secret", &hex::encode(&*self.secret.secret_bytes()));
            if let Some(lud16) = &self.lud16 {
                query.append_pair("lud16", lud16);
            }
        }
        f.write_str(url.as_str())
    }
}

/// A wallet command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NwcRequest {
    PayInvoice {
        invoice: String,
        /// Needed for zero-amount invoices.
        amount_msats: Option<u64>,
    },
    GetBalance,
    GetInfo,
}

impl NwcRequest {
    pub fn method(&self) -> &'static str {
        match self {
            NwcRequest::PayInvoice { .. } => "pay_invoice",
            NwcRequest::GetBalance => "get_balance",
            NwcRequest::GetInfo => "get_info",
        }
    }

    pub fn to_value(&self) -> Value {
        let params = match self {
            NwcRequest::PayInvoice {
                invoice,
                amount_msats: Some(amount),
            } => json!({ "invoice": invoice, "amount": amount }),
            NwcRequest::PayInvoice { invoice, .. } => json!({ "invoice": invoice }),
            NwcRequest::GetBalance | NwcRequest::GetInfo => json!({}),
        };
        json!({ "method": self.method(), "params": params })
    }

    pub fn from_value(value: &Value) -> Result<Self, NwcError> {
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| NwcError::UnsupportedMethod(String::new()))?;
        match method {
            "pay_invoice" => {
                let params: PayInvoiceParams =
                    serde_json::from_value(value.get("params").cloned().unwrap_or(Value::Null))?;
                Ok(NwcRequest::PayInvoice {
                    invoice: params.invoice,
                    amount_msats: params.amount,
                })
            }
            "get_balance" => Ok(NwcRequest::GetBalance),
            "get_info" => Ok(NwcRequest::GetInfo),
            other => Err(NwcError::UnsupportedMethod(other.to_string())),
        }
    }

    /// Build the signed, encrypted kind 23194 request event.
    pub fn to_event(&self, uri: &WalletConnectUri) -> Result<Event, NwcError> {
        let content = nip04::encrypt_to(
            &uri.secret.secret_key(),
            &uri.wallet_pubkey,
            &self.to_value().to_string(),
        );
        Ok(Event::create(
            &uri.secret,
            Kind::WALLET_CONNECT_REQUEST,
            content,
            vec![Tag::pubkey(&uri.wallet_pubkey)],
            None,
        )?)
    }

    /// Wallet side: decrypt and parse a request event addressed to `wallet`.
    pub fn from_event(wallet: &KeyPair, event: &Event) -> Result<Self, NwcError> {
        if event.kind() != Kind::WALLET_CONNECT_REQUEST {
            return Err(NwcError::UnexpectedKind(event.kind()));
        }
        event.verify()?;
        let plaintext = nip04::decrypt_from(&wallet.secret_key(), event.pubkey(), event.content())?;
        let value: Value = serde_json::from_str(&plaintext)?;
        Self::from_value(&value)
    }
}

#[derive(Deserialize)]
struct PayInvoiceParams {
    invoice: String,
    #[serde(default)]
    amount: Option<u64>,
}

/// Wallet node details from `get_info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub methods: Vec<String>,
}

/// A wallet reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NwcResponse {
    PayInvoice { preimage: String },
    GetBalance { balance_msats: u64 },
    GetInfo(WalletInfo),
    /// The wallet refused or failed; `code` is e.g. `INSUFFICIENT_BALANCE`.
    Error {
        result_type: String,
        code: String,
        message: String,
    },
}

#[derive(Deserialize)]
struct ResponseBody {
    result_type: String,
    #[serde(default)]
    error: Option<ErrorBody>,
    #[serde(default)]
    result: Option<Value>,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct PayInvoiceResult {
    preimage: String,
}

#[derive(Deserialize)]
struct BalanceResult {
    balance: u64,
}

impl NwcResponse {
    pub fn to_value(&self) -> Value {
        match self {
            NwcResponse::PayInvoice { preimage } => json!({
                "result_type": "pay_invoice",
                "error": null,
                "result": { "preimage": preimage },
            }),
            NwcResponse::GetBalance { balance_msats } => json!({
                "result_type": "get_balance",
                "error": null,
                "result": { "balance": balance_msats },
            }),
            NwcResponse::GetInfo(info) => json!({
                "result_type": "get_info",
                "error": null,
                "result": info,
            }),
            NwcResponse::Error {
                result_type,
                code,
                message,
            } => json!({
                "result_type": result_type,
                "error": { "code": code, "message": message },
                "result": null,
            }),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, NwcError> {
        let body: ResponseBody = serde_json::from_str(json)?;
        if let Some(err) = body.error {
            return Ok(NwcResponse::Error {
                result_type: body.result_type,
                code: err.code,
                message: err.message,
            });
        }
        let result = match body.result {
            Some(result) if !result.is_null() => result,
            _ => return Err(NwcError::MissingResult),
        };
        match body.result_type.as_str() {
            "pay_invoice" => {
                let r: PayInvoiceResult = serde_json::from_value(result)?;
                Ok(NwcResponse::PayInvoice { preimage: r.preimage })
            }
            "get_balance" => {
                let r: BalanceResult = serde_json::from_value(result)?;
                Ok(NwcResponse::GetBalance {
                    balance_msats: r.balance,
                })
            }
            "get_info" => Ok(NwcResponse::GetInfo(serde_json::from_value(result)?)),
            other => Err(NwcError::UnsupportedMethod(other.to_string())),
        }
    }

    /// Decrypt and parse a kind 23195 response from the connection's wallet.
    pub fn from_event(uri: &WalletConnectUri, event: &Event) -> Result<Self, NwcError> {
        if event.kind() != Kind::WALLET_CONNECT_RESPONSE {
            return Err(NwcError::UnexpectedKind(event.kind()));
        }
        if event.pubkey() != &uri.wallet_pubkey {
            return Err(NwcError::WrongSender);
        }
        event.verify()?;
        let plaintext = nip04::decrypt_from(&uri.secret.secret_key(), &uri.wallet_pubkey, event.content())?;
        Self::from_json(&plaintext)
    }

    /// Wallet side: build the kind 23195 reply to `request`.
    pub fn to_event(&self, wallet: &KeyPair, request: &Event) -> Result<Event, NwcError> {
        let content = nip04::encrypt_to(&wallet.secret_key(), request.pubkey(), &self.to_value().to_string());
        Ok(Event::create(
            wallet,
            Kind::WALLET_CONNECT_RESPONSE,
            content,
            vec![Tag::pubkey(request.pubkey()), Tag::event(request.id())],
            None,
        )?)
    }
}

/// The request id a response answers, from its `e` tag.
pub fn response_request_id(event: &Event) -> Option<EventId> {
    event
        .first_tag_value("e")
        .and_then(|id| EventId::from_hex(id).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> (KeyPair, WalletConnectUri) {
        let wallet = KeyPair::generate();
        let client = KeyPair::generate();
        let uri = format!(
            "nostr+walletconnect://{}?relay=wss%3A%2F%2Frelay.example%2Fv1&secret={}&lud16=alice%40example.com",
            wallet.public_key_hex(),
            hex::encode(&*client.secret_bytes())
        );
        (wallet, WalletConnectUri::parse(&uri).unwrap())
    }

    #[test]
    fn test_parse_uri() {
        let (wallet, uri) = connection();
        assert_eq!(uri.wallet_pubkey, wallet.public_key());
        assert_eq!(uri.relays.len(), 1);
        assert_eq!(uri.relays[0].as_str(), "wss://relay.example/v1");
        assert_eq!(uri.lud16.as_deref(), Some("alice@example.com"));
        assert_ne!(uri.client_pubkey(), wallet.public_key());
    }

    #[test]
    fn test_uri_display_parses_back() {
        let (_, uri) = connection();
        let again = WalletConnectUri::parse(&uri.to_string()).unwrap();
        assert_eq!(again, uri);
        assert_eq!(again.secret.secret_bytes(), uri.secret.secret_bytes());
    }

    #[test]
    fn test_parse_uri_without_slashes() {
        let wallet = KeyPair::generate();
        let client = KeyPair::generate();
        let uri = format!(
            "nostr+walletconnect:{}?relay=wss://r.example&secret={}",
            wallet.public_key_hex(),
            hex::encode(&*client.secret_bytes())
        );
        let parsed = WalletConnectUri::parse(&uri).unwrap();
        assert_eq!(parsed.wallet_pubkey, wallet.public_key());
        assert_eq!(parsed.lud16, None);
    }

    #[test]
    fn test_parse_uri_errors() {
        let wallet = KeyPair::generate();
        let pk = wallet.public_key_hex();

        assert!(matches!(
            WalletConnectUri::parse(&format!("https://{pk}?relay=wss://r&secret={pk}")),
            Err(NwcError::Uri(_))
        ));
        assert!(matches!(
            WalletConnectUri::parse(&format!("nostr+walletconnect://{pk}?relay=wss://r")),
            Err(NwcError::Uri(_))
        ));
        assert!(matches!(
            WalletConnectUri::parse(&format!(
                "nostr+walletconnect://{pk}?secret={}",
                hex::encode(&*KeyPair::generate().secret_bytes())
            )),
            Err(NwcError::Uri(_))
        ));
        assert!(matches!(
            WalletConnectUri::parse("nostr+walletconnect://nothex?relay=wss://r&secret=00"),
            Err(NwcError::Identity(_))
        ));
    }

    #[test]
    fn test_request_event() {
        let (wallet, uri) = connection();
        let request = NwcRequest::PayInvoice {
            invoice: "lnbc1...".into(),
            amount_msats: None,
        };
        let event = request.to_event(&uri).unwrap();

        assert_eq!(event.kind(), Kind::WALLET_CONNECT_REQUEST);
        assert_eq!(event.pubkey(), &uri.client_pubkey());
        assert_eq!(event.first_tag_value("p"), Some(wallet.public_key_hex().as_str()));
        assert!(event.content().contains("?iv="));
        assert!(!event.content().contains("lnbc"));

        assert_eq!(NwcRequest::from_event(&wallet, &event).unwrap(), request);
    }

    #[test]
    fn test_request_json() {
        let with_amount = NwcRequest::PayInvoice {
            invoice: "lnbc1".into(),
            amount_msats: Some(21_000),
        };
        assert_eq!(
            with_amount.to_value(),
            json!({"method": "pay_invoice", "params": {"invoice": "lnbc1", "amount": 21000}})
        );
        assert_eq!(
            NwcRequest::GetBalance.to_value(),
            json!({"method": "get_balance", "params": {}})
        );
        for req in [with_amount, NwcRequest::GetBalance, NwcRequest::GetInfo] {
            assert_eq!(NwcRequest::from_value(&req.to_value()).unwrap(), req);
        }
        assert!(matches!(
            NwcRequest::from_value(&json!({"method": "make_invoice", "params": {}})),
            Err(NwcError::UnsupportedMethod(m)) if m == "make_invoice"
        ));
    }

    #[test]
    fn test_response_roundtrip_through_events() {
        let (wallet, uri) = connection();
        let request = NwcRequest::GetBalance.to_event(&uri).unwrap();

        let reply = NwcResponse::GetBalance {
            balance_msats: 1_234_000,
        };
        let event = reply.to_event(&wallet, &request).unwrap();
        assert_eq!(event.kind(), Kind::WALLET_CONNECT_RESPONSE);
        assert_eq!(response_request_id(&event), Some(*request.id()));

        assert_eq!(NwcResponse::from_event(&uri, &event).unwrap(), reply);
    }

    #[test]
    fn test_response_bodies() {
        let paid = NwcResponse::from_json(
            r#"{"result_type":"pay_invoice","error":null,"result":{"preimage":"00ff"}}"#,
        )
        .unwrap();
        assert_eq!(
            paid,
            NwcResponse::PayInvoice {
                preimage: "00ff".into()
            }
        );

        let failed = NwcResponse::from_json(
            r#"{"result_type":"pay_invoice","error":{"code":"INSUFFICIENT_BALANCE","message":"low"}}"#,
        )
        .unwrap();
        assert_eq!(
            failed,
            NwcResponse::Error {
                result_type: "pay_invoice".into(),
                code: "INSUFFICIENT_BALANCE".into(),
                message: "low".into(),
            }
        );

        let info = NwcResponse::from_json(
            r#"{"result_type":"get_info","result":{"alias":"node","network":"mainnet","methods":["pay_invoice"]}}"#,
        )
        .unwrap();
        let NwcResponse::GetInfo(info) = info else {
            panic!("expected info");
        };
        assert_eq!(info.alias.as_deref(), Some("node"));
        assert_eq!(info.methods, vec!["pay_invoice".to_string()]);

        assert!(matches!(
            NwcResponse::from_json(r#"{"result_type":"get_balance","error":null,"result":null}"#),
            Err(NwcError::MissingResult)
        ));
    }

    #[test]
    fn test_response_from_impostor_rejected() {
        let (_, uri) = connection();
        let request = NwcRequest::GetInfo.to_event(&uri).unwrap();
        let impostor = KeyPair::generate();
        let event = NwcResponse::GetInfo(WalletInfo::default())
            .to_event(&impostor, &request)
            .unwrap();
        assert!(matches!(
            NwcResponse::from_event(&uri, &event),
            Err(NwcError::WrongSender)
        ));
        assert!(matches!(
            NwcResponse::from_event(&uri, &request),
            Err(NwcError::UnexpectedKind(Kind::WALLET_CONNECT_REQUEST))
        ));
    }
}
