//! Weighted aggregation of member quotes into one index value

use crate::baskets::BasketMember;
use crate::error::{AppError, Result};
use crate::quotes::types::Quote;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Composite index value at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    #[serde(rename = "index_id")]
    pub basket_id: String,
    pub price: f64,
    pub market_cap: f64,
    /// Weighted 24h volume of the quoted members
    pub volume_24h: f64,
    /// Members that had a quote
    pub member_count: usize,
    pub timestamp: DateTime<Utc>,
    pub price_change_24h: f64,
    pub price_change_7d: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeValuation {
    #[serde(rename = "index_id")]
    pub basket_id: String,
    pub volume_24h: f64,
    pub volume_7d: f64,
    pub volume_change: f64,
    pub timestamp: DateTime<Utc>,
}

/// Members paired with their quote, skipping those without one
fn quoted<'a>(
    members: &'a [BasketMember],
    quotes: &'a HashMap<String, Quote>,
) -> impl Iterator<Item = (&'a BasketMember, &'a Quote)> {
    members
        .iter()
        .filter_map(move |m| quotes.get(&m.name).map(|q| (m, q)))
}

/// Compute the index value of `members` from `quotes`.
///
/// Price and price changes are averaged over the weight of quoted members and
/// price is scaled by `base_value`. Market cap and volume are plain weighted
/// sums and are not divided by that weight.
pub fn compute(
    basket_id: &str,
    base_value: f64,
    members: &[BasketMember],
    quotes: &HashMap<String, Quote>,
    timestamp: DateTime<Utc>,
) -> Result<Valuation> {
    let mut weighted_price = 0.0;
    let mut market_cap = 0.0;
    let mut volume_24h = 0.0;
    let mut change_24h = 0.0;
    let mut change_7d = 0.0;
    let mut total_weight = 0.0;
    let mut member_count = 0;

    for (member, quote) in quoted(members, quotes) {
        let w = member.weight;
        weighted_price += quote.price * w;
        market_cap += quote.market_cap * w;
        volume_24h += quote.volume_24h * w;
        if let Some(change) = quote.change("24h") {
            change_24h += change * w;
        }
        if let Some(change) = quote.change("7d") {
            change_7d += change * w;
        }
        total_weight += w;
        member_count += 1;
    }

    if member_count == 0 {
        return Err(AppError::NoQuotes(basket_id.to_string()));
    }
    if total_weight == 0.0 {
        return Err(AppError::NoValidWeight(basket_id.to_string()));
    }

    Ok(Valuation {
        basket_id: basket_id.to_string(),
        price: weighted_price / total_weight * base_value,
        market_cap,
        volume_24h,
        member_count,
        timestamp,
        price_change_24h: change_24h / total_weight,
        price_change_7d: change_7d / total_weight,
    })
}

/// Weighted volume figures over the quoted members
pub fn compute_volume(
    basket_id: &str,
    members: &[BasketMember],
    quotes: &HashMap<String, Quote>,
    timestamp: DateTime<Utc>,
) -> VolumeValuation {
    let mut volume = VolumeValuation {
        basket_id: basket_id.to_string(),
        volume_24h: 0.0,
        volume_7d: 0.0,
        volume_change: 0.0,
        timestamp,
    };

    for (member, quote) in quoted(members, quotes) {
        volume.volume_24h += quote.volume_24h * member.weight;
        volume.volume_7d += quote.volume_7d * member.weight;
        volume.volume_change += quote.volume_change * member.weight;
    }
    volume
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotes::testing::quote;
    use crate::quotes::types::TokenAddress;

    const TOLERANCE: f64 = 1e-6;

    fn member(name: &str, weight: f64) -> BasketMember {
        BasketMember {
            name: name.to_string(),
            address: TokenAddress {
                policy_id: format!("policy_{}", name),
                token_name: String::new(),
            },
            weight,
            description: None,
        }
    }

    #[test]
    fn test_full_coverage_price() {
        let members = vec![member("A", 0.2), member("B", 0.3), member("C", 0.5)];
        let quotes = HashMap::from([
            ("A".to_string(), quote(1.5, 1_000.0)),
            ("B".to_string(), quote(0.25, 2_000.0)),
            ("C".to_string(), quote(12.0, 500.0)),
        ]);

        let v = compute("idx", 100.0, &members, &quotes, Utc::now()).unwrap();

        let expected = 100.0 * (0.2 * 1.5 + 0.3 * 0.25 + 0.5 * 12.0);
        assert!((v.price - expected).abs() < TOLERANCE);
        assert!((v.market_cap - (200.0 + 600.0 + 250.0)).abs() < TOLERANCE);
        assert!((v.price_change_24h - 2.0).abs() < TOLERANCE);
        assert!((v.price_change_7d + 4.0).abs() < TOLERANCE);
        assert_eq!(v.member_count, 3);
    }

    #[test]
    fn test_no_overlap_is_no_quotes() {
        let members = vec![member("A", 0.5), member("B", 0.5)];
        let quotes = HashMap::from([("C".to_string(), quote(1.0, 1.0))]);

        let result = compute("idx", 100.0, &members, &quotes, Utc::now());
        assert!(matches!(result, Err(AppError::NoQuotes(id)) if id == "idx"));
    }

    #[test]
    fn test_zero_weight_is_no_valid_weight() {
        let members = vec![member("A", 0.0), member("B", 1.0)];
        let quotes = HashMap::from([("A".to_string(), quote(1.0, 1.0))]);

        let result = compute("idx", 100.0, &members, &quotes, Utc::now());
        assert!(matches!(result, Err(AppError::NoValidWeight(_))));
    }

    #[test]
    fn test_partial_coverage_renormalizes_price_only() {
        let members = vec![member("A", 0.5), member("B", 0.5)];
        let quotes = HashMap::from([("A".to_string(), quote(2.0, 1_000.0))]);

        let v = compute("idx", 10.0, &members, &quotes, Utc::now()).unwrap();

        // Price is averaged over the quoted weight, market cap is not
        assert!((v.price - 20.0).abs() < TOLERANCE);
        assert!((v.market_cap - 500.0).abs() < TOLERANCE);
        assert_eq!(v.member_count, 1);
    }

    #[test]
    fn test_volume_is_weighted_sum() {
        let members = vec![member("A", 0.25), member("B", 0.75)];
        let quotes = HashMap::from([
            ("A".to_string(), quote(1.0, 1.0)),
            ("B".to_string(), quote(1.0, 1.0)),
        ]);

        let v = compute_volume("idx", &members, &quotes, Utc::now());
        assert!((v.volume_24h - 1_000.0).abs() < TOLERANCE);
        assert!((v.volume_7d - 7_000.0).abs() < TOLERANCE);
        assert!((v.volume_change - 10.0).abs() < TOLERANCE);
    }
}
