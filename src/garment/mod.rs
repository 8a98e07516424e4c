pub mod asset;

pub use asset::{alpha_bounds, AlphaBounds, GarmentAsset};

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// 服のカテゴリ（カタログ側から渡される）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GarmentCategory {
    Upperwear,
    Outerwear,
    Lowerwear,
}

/// カテゴリの補助タグ。Lowerwear のアンカー位置だけに影響する
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubTag {
    /// 膝までの丈
    Shorts,
}

impl GarmentCategory {
    pub fn is_upper(self) -> bool {
        matches!(self, Self::Upperwear | Self::Outerwear)
    }
}

impl fmt::Display for GarmentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Upperwear => "upperwear",
            Self::Outerwear => "outerwear",
            Self::Lowerwear => "lowerwear",
        };
        f.write_str(name)
    }
}

impl FromStr for GarmentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upperwear" | "upper" | "top" => Ok(Self::Upperwear),
            "outerwear" | "outer" => Ok(Self::Outerwear),
            "lowerwear" | "lower" | "bottom" => Ok(Self::Lowerwear),
            other => Err(format!("unknown garment category: {other}")),
        }
    }
}

impl FromStr for SubTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shorts" => Ok(Self::Shorts),
            other => Err(format!("unknown sub-tag: {other}")),
        }
    }
}
