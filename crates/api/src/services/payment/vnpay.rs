//! VNPay payment URLs and return verification.
//!
//! Both directions sign the same way: the `vnp_*` parameters sorted by key,
//! each value form-urlencoded, joined as `key=value` pairs with `&`, then
//! HMAC-SHA512 keyed by the merchant hash secret, rendered as uppercase hex.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use secrecy::ExposeSecret;
use sha2::Sha512;
use tracing::{debug, instrument};

use solestore_core::Money;

use super::{PaymentError, PaymentResult};
use crate::config::VnpayConfig;

const VERSION: &str = "2.1.0";
const COMMAND: &str = "pay";
const CURRENCY: &str = "VND";
const LOCALE: &str = "vn";

/// VNPay dates are written in Vietnam time.
const GATEWAY_UTC_OFFSET_HOURS: i64 = 7;

const RESPONSE_SUCCESS: &str = "00";
const RESPONSE_FAILED: &str = "01";

const SECURE_HASH: &str = "vnp_SecureHash";
const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";

/// Verified result parameters from a VNPay redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReturn {
    /// Our reference for the payment (the order id).
    pub txn_ref: String,
    /// Charged amount in the gateway's unit (VND × 100).
    pub amount: Option<i64>,
    pub result: PaymentResult,
}

/// VNPay signer for one merchant terminal.
#[derive(Clone)]
pub struct VnpayGateway {
    config: VnpayConfig,
}

impl VnpayGateway {
    #[must_use]
    pub const fn new(config: VnpayConfig) -> Self {
        Self { config }
    }

    /// Build the signed payment page URL.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidAmount` for non-positive amounts or
    /// amounts that overflow the gateway's integer field.
    #[instrument(skip(self, order_info), fields(txn_ref = %txn_ref))]
    pub fn create_payment_url(
        &self,
        amount: Money,
        order_info: &str,
        txn_ref: &str,
        ip_addr: &str,
        now: DateTime<Utc>,
    ) -> Result<String, PaymentError> {
        let amount = gateway_amount(amount)?;
        let create_date = (now + TimeDelta::hours(GATEWAY_UTC_OFFSET_HOURS))
            .format("%Y%m%d%H%M%S")
            .to_string();

        let mut params = BTreeMap::new();
        params.insert("vnp_Version".to_string(), VERSION.to_string());
        params.insert("vnp_Command".to_string(), COMMAND.to_string());
        params.insert("vnp_TmnCode".to_string(), self.config.tmn_code.clone());
        params.insert("vnp_Amount".to_string(), amount.to_string());
        params.insert("vnp_CreateDate".to_string(), create_date);
        params.insert("vnp_CurrCode".to_string(), CURRENCY.to_string());
        params.insert("vnp_IpAddr".to_string(), ip_addr.to_string());
        params.insert("vnp_Locale".to_string(), LOCALE.to_string());
        params.insert("vnp_OrderInfo".to_string(), order_info.to_string());
        params.insert("vnp_ReturnUrl".to_string(), self.config.return_url.clone());
        params.insert("vnp_TxnRef".to_string(), txn_ref.to_string());

        let query = build_query(&params);
        let signature = self.sign(&query);

        Ok(format!(
            "{}?{query}&{SECURE_HASH}={signature}",
            self.config.payment_url
        ))
    }

    /// Verify the parameters VNPay redirected back with and interpret them.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` when the signature does not
    /// cover exactly the received parameters, or `MissingParameter` when the
    /// signature or transaction reference is absent.
    #[instrument(skip_all)]
    pub fn verify_return(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<PaymentReturn, PaymentError> {
        let provided = params
            .get(SECURE_HASH)
            .ok_or(PaymentError::MissingParameter(SECURE_HASH))?;

        let signed: BTreeMap<String, String> = params
            .iter()
            .filter(|(k, _)| {
                k.starts_with("vnp_") && k.as_str() != SECURE_HASH && k.as_str() != SECURE_HASH_TYPE
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let provided = hex::decode(provided).map_err(|_| PaymentError::InvalidSignature)?;
        let verified = hmac_sha512(self.config.hash_secret.expose_secret(), &build_query(&signed))
            .is_some_and(|mac| mac.verify_slice(&provided).is_ok());
        if !verified {
            return Err(PaymentError::InvalidSignature);
        }
        debug!("VNPay return signature verified");

        let txn_ref = params
            .get("vnp_TxnRef")
            .cloned()
            .ok_or(PaymentError::MissingParameter("vnp_TxnRef"))?;
        let amount = params.get("vnp_Amount").and_then(|a| a.parse().ok());

        Ok(PaymentReturn {
            txn_ref,
            amount,
            result: interpret_response(params),
        })
    }

    /// `vnp_SecureHash` value for a parameter set.
    #[must_use]
    pub fn signature(&self, params: &BTreeMap<String, String>) -> String {
        self.sign(&build_query(params))
    }

    fn sign(&self, data: &str) -> String {
        hmac_sha512_upper(self.config.hash_secret.expose_secret(), data)
    }
}

/// Convert a VND amount to the gateway's integer unit (amount × 100).
///
/// # Errors
///
/// Returns `PaymentError::InvalidAmount` for non-positive or oversized
/// amounts.
pub fn gateway_amount(amount: Money) -> Result<i64, PaymentError> {
    if amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount);
    }
    (amount * Decimal::ONE_HUNDRED)
        .trunc()
        .to_i64()
        .ok_or(PaymentError::InvalidAmount)
}

fn interpret_response(params: &BTreeMap<String, String>) -> PaymentResult {
    match params.get("vnp_ResponseCode").map(String::as_str) {
        Some(RESPONSE_SUCCESS) => PaymentResult::Success {
            transaction_no: params.get("vnp_TransactionNo").cloned().unwrap_or_default(),
        },
        Some(RESPONSE_FAILED) => PaymentResult::Failed {
            message: "Payment failed".to_string(),
        },
        _ => PaymentResult::Failed {
            message: "Unknown error".to_string(),
        },
    }
}

fn build_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| {
            let value: String = url::form_urlencoded::byte_serialize(v.as_bytes()).collect();
            format!("{k}={value}")
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// HMAC-SHA512 over `data`. Keys of any length are accepted, so this only
/// fails if the hmac crate changes that.
fn hmac_sha512(key: &str, data: &str) -> Option<Hmac<Sha512>> {
    let mut mac = Hmac::<Sha512>::new_from_slice(key.as_bytes()).ok()?;
    mac.update(data.as_bytes());
    Some(mac)
}

fn hmac_sha512_upper(key: &str, data: &str) -> String {
    hmac_sha512(key, data)
        .map(|mac| hex::encode_upper(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use secrecy::SecretString;
    use solestore_core::vnd;

    use super::*;

    fn gateway() -> VnpayGateway {
        VnpayGateway::new(VnpayConfig {
            tmn_code: "SOLETEST".to_string(),
            hash_secret: SecretString::from("VNPAYSECRETFORTESTS0123456789ABC".to_string()),
            payment_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            return_url: "https://shop.test/payments/vnpay/return".to_string(),
        })
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 3, 4, 5).unwrap()
    }

    fn query_params(url: &str) -> BTreeMap<String, String> {
        let parsed = url::Url::parse(url).unwrap();
        parsed.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_payment_url_fields() {
        let url = gateway()
            .create_payment_url(vnd(1_250_000), "Order 42", "abc123", "10.0.0.1", now())
            .unwrap();
        assert!(url.starts_with("https://sandbox.vnpayment.vn/paymentv2/vpcpay.html?"));

        let params = query_params(&url);
        assert_eq!(params["vnp_Amount"], "125000000");
        assert_eq!(params["vnp_CreateDate"], "20250601100405");
        assert_eq!(params["vnp_Command"], "pay");
        assert_eq!(params["vnp_CurrCode"], "VND");
        assert_eq!(params["vnp_Locale"], "vn");
        assert_eq!(params["vnp_OrderInfo"], "Order 42");
        assert_eq!(params["vnp_TmnCode"], "SOLETEST");
        assert_eq!(params["vnp_TxnRef"], "abc123");
        assert_eq!(params["vnp_Version"], "2.1.0");
        assert_eq!(params[SECURE_HASH].len(), 128);
        assert!(params[SECURE_HASH].chars().all(|c| !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_query_is_sorted_and_encoded() {
        let url = gateway()
            .create_payment_url(vnd(1000), "Giày & dép", "r1", "127.0.0.1", now())
            .unwrap();
        let query = url.split_once('?').unwrap().1;
        let keys: Vec<&str> = query
            .split('&')
            .map(|pair| pair.split_once('=').unwrap().0)
            .filter(|k| *k != SECURE_HASH)
            .collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
        assert!(query.contains("vnp_OrderInfo=Gi%C3%A0y+%26+d%C3%A9p"));
    }

    #[test]
    fn test_signature_is_deterministic() {
        let a = gateway()
            .create_payment_url(vnd(500), "x", "r", "127.0.0.1", now())
            .unwrap();
        let b = gateway()
            .create_payment_url(vnd(500), "x", "r", "127.0.0.1", now())
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_known_hmac_vector() {
        // RFC 4231 test case 2.
        assert_eq!(
            hmac_sha512_upper("Jefe", "what do ya want for nothing?"),
            "164B7A7BFCF819E2E395FBE73B56E0A387BD64222E831FD610270CD7EA2505549758BF75C05A994A6D034F65F8F0E6FDCAEAB1A34D4A6B4B636E070A38BCE737"
        );
    }

    fn signed_return(code: &str) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("vnp_Amount".to_string(), "125000000".to_string());
        params.insert("vnp_ResponseCode".to_string(), code.to_string());
        params.insert("vnp_TransactionNo".to_string(), "14226112".to_string());
        params.insert("vnp_TxnRef".to_string(), "abc123".to_string());
        params.insert("vnp_OrderInfo".to_string(), "Order 42".to_string());
        let signature = gateway().signature(&params);
        params.insert(SECURE_HASH.to_string(), signature);
        params.insert(SECURE_HASH_TYPE.to_string(), "HmacSHA512".to_string());
        params
    }

    #[test]
    fn test_verify_return_success() {
        let ret = gateway().verify_return(&signed_return("00")).unwrap();
        assert_eq!(ret.txn_ref, "abc123");
        assert_eq!(ret.amount, Some(125_000_000));
        assert_eq!(
            ret.result,
            PaymentResult::Success {
                transaction_no: "14226112".to_string()
            }
        );
    }

    #[test]
    fn test_verify_return_failure_codes() {
        let failed = gateway().verify_return(&signed_return("01")).unwrap();
        assert_eq!(
            failed.result,
            PaymentResult::Failed {
                message: "Payment failed".to_string()
            }
        );
        let other = gateway().verify_return(&signed_return("24")).unwrap();
        assert_eq!(
            other.result,
            PaymentResult::Failed {
                message: "Unknown error".to_string()
            }
        );
    }

    #[test]
    fn test_verify_return_accepts_lowercase_hash() {
        let mut params = signed_return("00");
        let lower = params[SECURE_HASH].to_ascii_lowercase();
        params.insert(SECURE_HASH.to_string(), lower);
        assert!(gateway().verify_return(&params).is_ok());
    }

    #[test]
    fn test_verify_return_rejects_tampering() {
        let mut params = signed_return("01");
        params.insert("vnp_ResponseCode".to_string(), "00".to_string());
        assert!(matches!(
            gateway().verify_return(&params),
            Err(PaymentError::InvalidSignature)
        ));

        let mut params = signed_return("00");
        params.insert("vnp_BankCode".to_string(), "NCB".to_string());
        assert!(matches!(
            gateway().verify_return(&params),
            Err(PaymentError::InvalidSignature)
        ));
    }

    #[test]
    fn test_verify_return_rejects_malformed_hash() {
        let mut params = signed_return("00");
        let truncated = params[SECURE_HASH][..64].to_string();
        params.insert(SECURE_HASH.to_string(), truncated);
        assert!(matches!(
            gateway().verify_return(&params),
            Err(PaymentError::InvalidSignature)
        ));

        params.insert(SECURE_HASH.to_string(), "not-hex".to_string());
        assert!(matches!(
            gateway().verify_return(&params),
            Err(PaymentError::InvalidSignature)
        ));
    }

    #[test]
    fn test_verify_return_requires_hash() {
        let mut params = signed_return("00");
        params.remove(SECURE_HASH);
        assert!(matches!(
            gateway().verify_return(&params),
            Err(PaymentError::MissingParameter(SECURE_HASH))
        ));
    }

    #[test]
    fn test_gateway_amount() {
        assert_eq!(gateway_amount(vnd(10_000)).unwrap(), 1_000_000);
        assert!(gateway_amount(vnd(0)).is_err());
        assert!(gateway_amount(vnd(-5)).is_err());
    }
}
