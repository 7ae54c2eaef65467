use crate::models::item::ItemInstance;
use serde::{Deserialize, Serialize};

/// Stock sentinel carried on the wire and in world files.
pub const UNLIMITED_STOCK: u32 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum Stock {
    Unlimited,
    Finite(u32),
}

impl From<u32> for Stock {
    fn from(v: u32) -> Self {
        if v == UNLIMITED_STOCK {
            Stock::Unlimited
        } else {
            Stock::Finite(v)
        }
    }
}

impl From<Stock> for u32 {
    fn from(s: Stock) -> Self {
        match s {
            Stock::Unlimited => UNLIMITED_STOCK,
            Stock::Finite(n) => n,
        }
    }
}

impl Stock {
    pub fn available(&self) -> bool {
        match self {
            Stock::Unlimited => true,
            Stock::Finite(n) => *n >= 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopListing {
    #[serde(flatten)]
    pub item: ItemInstance,
    #[serde(rename = "shopQuantity")]
    pub stock: Stock,
}

#[derive(Debug, Clone, Serialize)]
pub struct Shop {
    pub id: String,
    pub name: String,
    /// What the shop sells to players
    pub sell: Vec<ShopListing>,
    /// Template ids the shop buys from players
    pub buy: Vec<String>,
    #[serde(rename = "sellPricePercent")]
    pub sell_price_percent: f64,
    #[serde(rename = "buyPricePercent")]
    pub buy_price_percent: f64,
}

impl Shop {
    pub fn is_selling(&self) -> bool {
        !self.sell.is_empty()
    }

    pub fn get_sell_list(&self) -> &[ShopListing] {
        &self.sell
    }

    pub fn buys(&self, template_id: &str) -> bool {
        self.buy.iter().any(|b| b == template_id)
    }

    /// Take one unit of stock from the listing at `index`. Finite listings that reach zero are
    /// removed. Returns true when the sell list changed shape or count.
    pub fn take_stock(&mut self, index: usize) -> bool {
        let Some(listing) = self.sell.get_mut(index) else {
            return false;
        };
        match listing.stock {
            Stock::Unlimited => false,
            Stock::Finite(n) => {
                let left = n.saturating_sub(1);
                if left == 0 {
                    self.sell.remove(index);
                } else {
                    listing.stock = Stock::Finite(left);
                }
                true
            }
        }
    }

    /// Undo a [`Shop::take_stock`] on `index` that returned true.
    pub fn return_stock(&mut self, index: usize, listing: ShopListing) {
        match self.sell.get_mut(index) {
            Some(line) if line.item.id == listing.item.id => {
                if let Stock::Finite(n) = line.stock {
                    line.stock = Stock::Finite(n + 1);
                }
            }
            _ => {
                let at = index.min(self.sell.len());
                self.sell.insert(
                    at,
                    ShopListing {
                        stock: Stock::Finite(1),
                        ..listing
                    },
                );
            }
        }
    }

    pub fn name_matches(&self, prefix: &str) -> bool {
        self.name.to_lowercase().starts_with(&prefix.to_lowercase()) || self.id == prefix
    }
}
