//! Arbitrage scanning - Cross-exchange spread detection
//!
//! Compares simultaneous quotes for one symbol across exchanges and emits
//! ranked spread opportunities above a profitability threshold. Results are
//! ephemeral and recomputed every tick.

use std::collections::HashMap;

use crate::types::{ArbitrageOpportunity, Exchange, ExchangeQuote};

/// Cross-exchange spread scanner
#[derive(Debug, Clone)]
pub struct ArbitrageScanner {
    min_profit_percentage: f64,
    max_opportunities: usize,
}

impl ArbitrageScanner {
    pub fn new(min_profit_percentage: f64, max_opportunities: usize) -> Self {
        Self {
            min_profit_percentage,
            max_opportunities,
        }
    }

    /// Scan every unordered pair of available quotes for one symbol.
    ///
    /// Exchanges whose fetch failed are simply absent from the map; they
    /// are never treated as price zero. The cheaper venue becomes the buy
    /// side.
    pub fn scan(
        &self,
        symbol: &str,
        quotes: &HashMap<Exchange, ExchangeQuote>,
        timestamp: i64,
    ) -> Vec<ArbitrageOpportunity> {
        let mut entries: Vec<(&Exchange, &ExchangeQuote)> = quotes.iter().collect();
        // Deterministic pair order regardless of map iteration
        entries.sort_by_key(|(exchange, _)| format!("{}", exchange));

        let mut opportunities = Vec::new();
        for i in 0..entries.len() {
            for j in (i + 1)..entries.len() {
                let (ex_a, quote_a) = entries[i];
                let (ex_b, quote_b) = entries[j];

                let diff = (quote_a.price - quote_b.price).abs();
                let avg = (quote_a.price + quote_b.price) / 2.0;
                if avg <= 0.0 {
                    continue;
                }
                let pct = diff / avg * 100.0;
                if pct <= self.min_profit_percentage {
                    continue;
                }

                let (buy, sell) = if quote_a.price <= quote_b.price {
                    ((ex_a, quote_a), (ex_b, quote_b))
                } else {
                    ((ex_b, quote_b), (ex_a, quote_a))
                };

                opportunities.push(ArbitrageOpportunity {
                    symbol: symbol.to_string(),
                    buy_exchange: *buy.0,
                    sell_exchange: *sell.0,
                    buy_price: buy.1.price,
                    sell_price: sell.1.price,
                    price_difference: diff,
                    percentage: pct,
                    timestamp,
                });
            }
        }

        opportunities
    }

    /// Rank opportunities across symbols: descending by spread percent,
    /// truncated to the configured maximum.
    pub fn rank(&self, mut opportunities: Vec<ArbitrageOpportunity>) -> Vec<ArbitrageOpportunity> {
        opportunities.sort_by(|a, b| {
            b.percentage
                .partial_cmp(&a.percentage)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        opportunities.truncate(self.max_opportunities);
        opportunities
    }
}

impl Default for ArbitrageScanner {
    fn default() -> Self {
        Self::new(0.1, 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_quote(exchange: Exchange, price: f64) -> ExchangeQuote {
        ExchangeQuote {
            exchange,
            price,
            bid: price - 0.5,
            ask: price + 0.5,
            volume: 100.0,
            timestamp: 1_000,
        }
    }

    fn quote_map(prices: &[(Exchange, f64)]) -> HashMap<Exchange, ExchangeQuote> {
        prices
            .iter()
            .map(|&(ex, p)| (ex, make_quote(ex, p)))
            .collect()
    }

    #[test]
    fn test_one_percent_spread_detected() {
        let scanner = ArbitrageScanner::new(0.5, 10);
        let quotes = quote_map(&[(Exchange::Binance, 100.0), (Exchange::Coinbase, 101.0)]);

        let opps = scanner.scan("BTC/USDT", &quotes, 1_000);
        assert_eq!(opps.len(), 1);
        let opp = &opps[0];
        assert_eq!(opp.buy_exchange, Exchange::Binance);
        assert_eq!(opp.sell_exchange, Exchange::Coinbase);
        assert_eq!(opp.buy_price, 100.0);
        assert_eq!(opp.sell_price, 101.0);
        assert!((opp.percentage - 0.995).abs() < 0.001);
        assert!((opp.price_difference - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_spread_below_threshold_ignored() {
        let scanner = ArbitrageScanner::new(0.5, 10);
        let quotes = quote_map(&[(Exchange::Binance, 100.0), (Exchange::Coinbase, 100.05)]);
        assert!(scanner.scan("BTC/USDT", &quotes, 0).is_empty());
    }

    #[test]
    fn test_all_pairs_scanned() {
        let scanner = ArbitrageScanner::new(0.1, 10);
        let quotes = quote_map(&[
            (Exchange::Binance, 100.0),
            (Exchange::Coinbase, 102.0),
            (Exchange::Kraken, 104.0),
        ]);

        let opps = scanner.scan("BTC/USDT", &quotes, 0);
        // 3 exchanges -> 3 unordered pairs, all above 0.1%
        assert_eq!(opps.len(), 3);
        for opp in &opps {
            assert!(opp.buy_price <= opp.sell_price);
        }
    }

    #[test]
    fn test_missing_exchange_not_zero() {
        let scanner = ArbitrageScanner::new(0.1, 10);
        // One quote only: nothing to pair against, nothing emitted
        let quotes = quote_map(&[(Exchange::Binance, 100.0)]);
        assert!(scanner.scan("BTC/USDT", &quotes, 0).is_empty());
        assert!(scanner.scan("BTC/USDT", &HashMap::new(), 0).is_empty());
    }

    #[test]
    fn test_rank_sorts_and_truncates() {
        let scanner = ArbitrageScanner::new(0.1, 2);
        let quotes = quote_map(&[
            (Exchange::Binance, 100.0),
            (Exchange::Coinbase, 102.0),
            (Exchange::Kraken, 104.0),
        ]);

        let ranked = scanner.rank(scanner.scan("BTC/USDT", &quotes, 0));
        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].percentage >= ranked[1].percentage);
        // Widest spread first: Binance -> Kraken
        assert_eq!(ranked[0].buy_exchange, Exchange::Binance);
        assert_eq!(ranked[0].sell_exchange, Exchange::Kraken);
    }
}
