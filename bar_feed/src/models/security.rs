use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::RequestError;

/// Instrument class of a requested series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityType {
    Stock,
    Future,
    EquityOption,
    Forex,
    Index,
    Crypto,
}

impl SecurityType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stock => "Stock",
            Self::Future => "Future",
            Self::EquityOption => "Option",
            Self::Forex => "Forex",
            Self::Index => "Index",
            Self::Crypto => "Crypto",
        }
    }
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityType {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stock" | "stk" | "equity" => Ok(Self::Stock),
            "future" | "futures" | "fut" => Ok(Self::Future),
            "option" | "opt" => Ok(Self::EquityOption),
            "forex" | "cash" | "fx" => Ok(Self::Forex),
            "index" | "ind" => Ok(Self::Index),
            "crypto" => Ok(Self::Crypto),
            _ => Err(RequestError::InvalidSecurityType(s.to_string())),
        }
    }
}
