//! Push payloads: order notifications, claims and status updates.
//!
//! Servers are loose about shapes (ids may be numbers, addresses may be a
//! plain string or an object), so everything is normalized here and the rest
//! of the client only ever sees the typed forms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::role::Role;

/// Errors from decoding a push payload.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing order id")]
    MissingOrderId,
}

/// Accepts a JSON string or number and yields its string form.
fn string_or_number<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<Raw>::deserialize(d)? {
        Some(Raw::Str(s)) => Some(s),
        Some(Raw::Int(n)) => Some(n.to_string()),
        Some(Raw::Float(f)) => Some(f.to_string()),
        None => None,
    })
}

/// Alternate spellings servers use, canonical key first.
const ORDER_ALIASES: &[(&str, &str)] = &[
    ("orderId", "_id"),
    ("deliveryAddress", "address"),
    ("distanceKm", "distance"),
];
const ITEM_ALIASES: &[(&str, &str)] = &[("unitPrice", "price")];

/// Rewrites alternate keys onto their canonical names.
///
/// Payloads often carry both spellings (`_id` next to `orderId`); the
/// canonical key wins unless it is absent, null or blank.
fn fold_aliases(payload: &Value) -> Value {
    let mut payload = payload.clone();
    if let Value::Object(map) = &mut payload {
        fold_keys(map, ORDER_ALIASES);
        if let Some(Value::Array(items)) = map.get_mut("items") {
            for item in items.iter_mut().filter_map(Value::as_object_mut) {
                fold_keys(item, ITEM_ALIASES);
            }
        }
    }
    payload
}

fn fold_keys(map: &mut Map<String, Value>, aliases: &[(&str, &str)]) {
    for (canonical, alias) in aliases {
        let Some(value) = map.remove(*alias) else {
            continue;
        };
        let missing = match map.get(*canonical) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        };
        if missing {
            map.insert((*canonical).to_string(), value);
        }
    }
}

/// Person or business reachable about an order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub name: String,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub unit_price: f64,
}

fn one() -> u32 {
    1
}

impl OrderItem {
    pub fn line_total(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

/// Delivery address as sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Address {
    Text(String),
    Structured {
        #[serde(default)]
        street: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        city: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lat: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lng: Option<f64>,
    },
}

impl Address {
    /// Single-line rendering for toasts and logs.
    pub fn summary(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Structured { street, city, .. } => match city {
                Some(city) if !street.is_empty() => format!("{street}, {city}"),
                Some(city) => city.clone(),
                None => street.clone(),
            },
        }
    }
}

/// Delivery zone: either a bare name or an id/name pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Zone {
    Name(String),
    Detail {
        #[serde(default, deserialize_with = "string_or_number")]
        id: Option<String>,
        name: String,
    },
}

impl Zone {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(n) | Self::Detail { name: n, .. } => n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[serde(alias = "efectivo")]
    Cash,
    #[serde(alias = "tarjeta")]
    Card,
    #[serde(alias = "transferencia")]
    Transfer,
    #[serde(other)]
    Other,
}

/// Extra fields the operations console receives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<Zone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_payout: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_commission: Option<f64>,
}

/// Extra fields a courier receives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourierDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<Zone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub courier_earnings: Option<f64>,
}

/// Role-specific enrichment of an order notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment {
    Admin(AdminDetails),
    Courier(CourierDetails),
}

impl Enrichment {
    pub fn zone(&self) -> Option<&Zone> {
        match self {
            Self::Admin(d) => d.zone.as_ref(),
            Self::Courier(d) => d.zone.as_ref(),
        }
    }

    pub fn distance_km(&self) -> Option<f64> {
        match self {
            Self::Admin(d) => d.distance_km,
            Self::Courier(d) => d.distance_km,
        }
    }
}

/// Fields shared by every role's new-order payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderWire {
    #[serde(default, deserialize_with = "string_or_number")]
    order_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    order_number: Option<String>,
    #[serde(default)]
    client: Option<Contact>,
    #[serde(default)]
    provider: Option<Contact>,
    #[serde(default)]
    items: Vec<OrderItem>,
    #[serde(default)]
    subtotal: Option<f64>,
    #[serde(default)]
    delivery_fee: Option<f64>,
    #[serde(default)]
    total: Option<f64>,
    #[serde(default)]
    delivery_address: Option<Address>,
    #[serde(default)]
    payment_method: Option<PaymentMethod>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// A new order pushed by the dispatch server. Identity key: `order_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderNotification {
    pub order_id: String,
    pub order_number: Option<String>,
    pub client: Option<Contact>,
    pub provider: Option<Contact>,
    pub items: Vec<OrderItem>,
    pub subtotal: Option<f64>,
    pub delivery_fee: Option<f64>,
    pub total: Option<f64>,
    pub delivery_address: Option<Address>,
    pub payment_method: Option<PaymentMethod>,
    pub created_at: Option<DateTime<Utc>>,
    pub enrichment: Enrichment,
}

impl OrderNotification {
    /// Decodes a new-order payload for the given role.
    pub fn decode(role: Role, payload: &Value) -> Result<Self, DecodeError> {
        let payload = &fold_aliases(payload);
        let wire = OrderWire::deserialize(payload)?;
        let order_id = wire
            .order_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(DecodeError::MissingOrderId)?;

        let enrichment = match role {
            Role::Admin => Enrichment::Admin(AdminDetails::deserialize(payload)?),
            Role::Courier => Enrichment::Courier(CourierDetails::deserialize(payload)?),
        };

        Ok(Self {
            order_id,
            order_number: wire.order_number,
            client: wire.client,
            provider: wire.provider,
            items: wire.items,
            subtotal: wire.subtotal,
            delivery_fee: wire.delivery_fee,
            total: wire.total,
            delivery_address: wire.delivery_address,
            payment_method: wire.payment_method,
            created_at: wire.created_at,
            enrichment,
        })
    }

    /// Total as sent, or the sum of the item lines when the server omitted it.
    pub fn effective_total(&self) -> f64 {
        self.total
            .unwrap_or_else(|| self.items.iter().map(OrderItem::line_total).sum())
    }

    /// Short label for alerts, e.g. `#1001`.
    pub fn label(&self) -> String {
        match &self.order_number {
            Some(n) => format!("#{n}"),
            None => self.order_id.clone(),
        }
    }
}

/// Payload of `order-accepted` / `order-rejected`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderClaim {
    #[serde(default, deserialize_with = "string_or_number")]
    pub order_id: Option<String>,
}

impl OrderClaim {
    pub fn decode(payload: &Value) -> Result<String, DecodeError> {
        // Some servers emit the bare id instead of an object.
        if let Value::String(id) = payload {
            return non_blank(id);
        }
        if let Some(n) = payload.as_i64() {
            return Ok(n.to_string());
        }
        let claim = OrderClaim::deserialize(&fold_aliases(payload))?;
        non_blank(claim.order_id.as_deref().unwrap_or_default())
    }
}

fn non_blank(id: &str) -> Result<String, DecodeError> {
    let id = id.trim();
    if id.is_empty() {
        Err(DecodeError::MissingOrderId)
    } else {
        Ok(id.to_string())
    }
}

/// Payload of the `status` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StatusPayload {
    pub fn decode(payload: &Value) -> Result<Self, DecodeError> {
        Ok(StatusPayload::deserialize(payload)?)
    }
}
