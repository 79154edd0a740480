use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const PLAN_LIGHT_PRICE: f64 = 19.90;
pub const PLAN_PRO_PRICE: f64 = 39.90;

/// Subscription tiers. `Trial` and `Vip` carry no price: trial is the
/// sign-up default and vip is admin-granted, neither can be purchased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Trial,
    Light,
    Pro,
    Vip,
}

impl Plan {
    pub fn price(&self) -> Option<f64> {
        match self {
            Plan::Light => Some(PLAN_LIGHT_PRICE),
            Plan::Pro => Some(PLAN_PRO_PRICE),
            Plan::Trial | Plan::Vip => None,
        }
    }

    /// Matches a paid amount back to a plan, tolerating sub-cent noise
    /// from the gateway's float serialization.
    pub fn from_price(value: f64) -> Option<Plan> {
        if (value - PLAN_LIGHT_PRICE).abs() < 0.005 {
            Some(Plan::Light)
        } else if (value - PLAN_PRO_PRICE).abs() < 0.005 {
            Some(Plan::Pro)
        } else {
            None
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Plan::Trial => "Período de Testes",
            Plan::Light => "Plano Light",
            Plan::Pro => "Plano Pro",
            Plan::Vip => "Plano VIP",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Plan::Trial => "trial",
            Plan::Light => "light",
            Plan::Pro => "pro",
            Plan::Vip => "vip",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trial" => Ok(Plan::Trial),
            "light" => Ok(Plan::Light),
            "pro" => Ok(Plan::Pro),
            "vip" => Ok(Plan::Vip),
            _ => Err(format!("Unknown plan: {}", s)),
        }
    }
}

/// Formats a value as Brazilian currency ("R$ 19,90").
pub fn format_brl(value: f64) -> String {
    format!("R$ {:.2}", value).replace('.', ",")
}
