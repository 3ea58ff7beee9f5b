//! Dynamic basket selection from ranked listings

use crate::baskets::{BasketMember, SelectionCriteria, WeightingMethod};
use crate::error::Result;
use crate::quotes::types::RankedToken;
use crate::quotes::QuoteSource;
use tracing::info;

/// Upper bound on candidates requested from the listing
pub const MAX_CANDIDATES: usize = 100;

/// A member still carrying the market cap it was ranked with
struct Candidate {
    member: BasketMember,
    market_cap: f64,
}

fn passes(token: &RankedToken, symbol: &str, criteria: &SelectionCriteria) -> bool {
    if criteria.excluded.iter().any(|e| e == symbol) {
        return false;
    }
    if token.quote.volume_24h < criteria.min_volume {
        return false;
    }
    if let Some(min_market_cap) = criteria.min_market_cap {
        if token.quote.market_cap < min_market_cap {
            return false;
        }
    }
    if !criteria.included_categories.is_empty()
        && !token
            .categories
            .iter()
            .any(|c| criteria.included_categories.contains(c))
    {
        return false;
    }
    true
}

/// Filter, truncate and weight ranked candidates
pub fn select_from_candidates(
    candidates: Vec<RankedToken>,
    criteria: &SelectionCriteria,
) -> Result<Vec<BasketMember>> {
    let weighting = criteria.weighting_method()?;

    let selected: Vec<Candidate> = candidates
        .into_iter()
        .filter_map(|token| {
            let symbol = token.symbol.clone()?;
            if !passes(&token, &symbol, criteria) {
                return None;
            }
            Some(Candidate {
                market_cap: token.quote.market_cap,
                member: BasketMember {
                    name: symbol,
                    address: token.address,
                    weight: 0.0,
                    description: Some(format!("Market cap: {:.2} ADA", token.quote.market_cap)),
                },
            })
        })
        .take(criteria.limit)
        .collect();

    let count = selected.len();
    let total_market_cap: f64 = selected.iter().map(|c| c.market_cap).sum();

    Ok(selected
        .into_iter()
        .map(|candidate| {
            let weight = match weighting {
                WeightingMethod::Equal => 1.0 / count as f64,
                WeightingMethod::MarketCap if total_market_cap > 0.0 => {
                    candidate.market_cap / total_market_cap
                }
                WeightingMethod::MarketCap => 0.0,
            };
            BasketMember {
                weight,
                ..candidate.member
            }
        })
        .collect())
}

/// Derive a basket's members from the quote source's ranked listing
pub async fn select(
    source: &dyn QuoteSource,
    criteria: &SelectionCriteria,
) -> Result<Vec<BasketMember>> {
    let method = criteria.rank_method()?;
    // Validate weighting before hitting the network
    criteria.weighting_method()?;

    let fetch_limit = criteria.limit.saturating_mul(3).min(MAX_CANDIDATES);
    let candidates = source.list_ranked(method, fetch_limit, 0).await?;
    let members = select_from_candidates(candidates, criteria)?;

    info!(
        "Selected {} tokens dynamically with {} method",
        members.len(),
        method
    );
    Ok(members)
}
