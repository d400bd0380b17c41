// Source: https://docs.cdp.coinbase.com/exchange/reference/exchangerestapi_getproductbook
// GET /products/{product_id}/book?level=1
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct RawBook {
    pub bids: Option<Vec<RawLevel>>,
    pub asks: Option<Vec<RawLevel>>,
    // a number on Coinbase, but other feeds send it as a string
    pub sequence: Option<serde_json::Value>,
    // we ignore the other fields (time, auction_mode, ...) for now
}

/// `[price, size, num_orders]`
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct RawLevel(pub String, pub String, pub u64);

impl RawBook {
    pub fn new(bids: Vec<RawLevel>, asks: Vec<RawLevel>) -> Self {
        Self { bids: Some(bids), asks: Some(asks), sequence: None }
    }

    pub fn sequence_string(&self) -> Option<String> {
        match &self.sequence {
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

impl RawLevel {
    pub fn new(price: &str, size: &str, orders: u64) -> Self {
        Self(price.to_string(), size.to_string(), orders)
    }
}
