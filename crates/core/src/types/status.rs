//! Status enums for users, orders and payments.

use serde::{Deserialize, Serialize};

/// Account role.
///
/// Missing roles decode as [`Role::User`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular shopper.
    #[default]
    User,
    /// Store staff with access to the dashboard and management screens.
    Admin,
}

impl Role {
    /// Whether this role may use the admin endpoints.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// Order lifecycle status.
///
/// The declaration order is the tracking timeline shown to shoppers. It is a
/// display order only: staff may move an order to any status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order placed, waiting for confirmation.
    #[default]
    Pending,
    /// Confirmed by the seller.
    Confirmed,
    /// Being packed.
    Preparing,
    /// Handed to the courier.
    Shipping,
    /// Received by the customer. Only delivered orders count as revenue.
    Delivered,
    /// Cancelled.
    Cancelled,
}

impl OrderStatus {
    /// Every status in timeline order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Confirmed,
        Self::Preparing,
        Self::Shipping,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Position of this status in the timeline.
    #[must_use]
    pub const fn ordinal(self) -> usize {
        match self {
            Self::Pending => 0,
            Self::Confirmed => 1,
            Self::Preparing => 2,
            Self::Shipping => 3,
            Self::Delivered => 4,
            Self::Cancelled => 5,
        }
    }

    /// Shopper-facing description of the status.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Pending => "Order received, waiting for confirmation",
            Self::Confirmed => "Order confirmed by seller",
            Self::Preparing => "Preparing your order",
            Self::Shipping => "Your order is on the way",
            Self::Delivered => "Order has been delivered",
            Self::Cancelled => "Order has been cancelled",
        }
    }

    /// Whether the order is still moving through fulfilment.
    #[must_use]
    pub const fn is_in_progress(self) -> bool {
        !matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// The tracking timeline for an order currently in this status.
    ///
    /// A step is completed when its ordinal is at or before the current one.
    #[must_use]
    pub fn timeline(self) -> Vec<TimelineStep> {
        Self::ALL
            .iter()
            .map(|&status| TimelineStep {
                status,
                description: status.description(),
                completed: status.ordinal() <= self.ordinal(),
            })
            .collect()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Preparing => "PREPARING",
            Self::Shipping => "SHIPPING",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// One row of the order tracking timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimelineStep {
    pub status: OrderStatus,
    pub description: &'static str,
    pub completed: bool,
}

/// How the shopper chose to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash on delivery.
    #[default]
    Cod,
    /// Redirect payment through the VNPay gateway.
    Vnpay,
}

/// Payment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
    Failed,
}
