use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Purchasable credit packs. The free tier is the initial grant and is not
/// sold through checkout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CreditPlan {
    Starter,
    Weekly,
    Annual,
}

impl CreditPlan {
    pub fn product_name(self) -> &'static str {
        match self {
            CreditPlan::Starter => "Starter Credit Pack",
            CreditPlan::Weekly => "Weekly Credit Pack",
            CreditPlan::Annual => "Annual Credit Pack",
        }
    }

    /// Price in pence (GBP).
    pub fn unit_amount(self) -> i64 {
        match self {
            CreditPlan::Starter => 49,
            CreditPlan::Weekly => 149,
            CreditPlan::Annual => 1999,
        }
    }

    pub fn credits(self) -> i64 {
        match self {
            CreditPlan::Starter => 10,
            CreditPlan::Weekly => 50,
            // effectively unlimited
            CreditPlan::Annual => 1000,
        }
    }
}

pub const CHECKOUT_CURRENCY: &str = "gbp";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub price_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub checkout_url: String,
}
