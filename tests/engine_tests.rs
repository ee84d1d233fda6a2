//! Tests for the sizing and diagnostics engines

#[cfg(test)]
mod tests {
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use ethers::types::{Address, U256};
    use polyclob::clob::{order_amounts, BalanceAllowance, BookLevel, Identity, OrderBookSnapshot, Side};
    use polyclob::onchain::AllowanceLookup;
    use polyclob::polymarket::{
        best_bid_ask, build_report, diagnose_and_recommend, preflight, size_by_budget,
        OnchainAllowance, SizingError,
    };
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    const EXCHANGE: &str = "0x4bFb41d5B3570DeFd03C39a9A4D8dE6Bd8B8982E";
    const NEG_RISK: &str = "0xC5d563A36AE78145C45a50134d48A1215220f80a";

    fn lvl(price: Decimal, size: Decimal) -> BookLevel {
        BookLevel { price, size }
    }

    fn book(bids: Vec<BookLevel>, asks: Vec<BookLevel>, min_order_size: Decimal) -> OrderBookSnapshot {
        OrderBookSnapshot {
            bids,
            asks,
            min_order_size,
            ..Default::default()
        }
    }

    fn identity() -> Identity {
        Identity {
            address: Some("0x1111111111111111111111111111111111111111".parse().unwrap()),
            funder: Some("0x2222222222222222222222222222222222222222".parse().unwrap()),
            signature_type: Some(1),
            host: "https://clob.polymarket.com".to_string(),
            chain_id: 137,
            collateral: "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174".parse().unwrap(),
            exchange: EXCHANGE.parse().unwrap(),
        }
    }

    /// Fixed per-spender answers; unknown spenders fail.
    struct StubLookup {
        answers: HashMap<Address, U256>,
    }

    #[async_trait]
    impl AllowanceLookup for StubLookup {
        async fn allowance(&self, _token: Address, _owner: Address, spender: Address) -> Result<U256> {
            self.answers
                .get(&spender)
                .copied()
                .ok_or_else(|| anyhow!("request timed out"))
        }
    }

    // ============================================================================
    // Best bid / ask
    // ============================================================================

    #[test]
    fn test_empty_book_has_no_best_levels() {
        let q = best_bid_ask(&book(vec![], vec![], Decimal::ZERO));
        assert!(q.best_bid.is_none());
        assert!(q.best_ask.is_none());
    }

    #[test]
    fn test_best_levels_bound_every_level() {
        let bids = vec![
            lvl(dec!(0.12), dec!(1)),
            lvl(dec!(0.47), dec!(3)),
            lvl(dec!(0.33), dec!(2)),
            lvl(dec!(0.01), dec!(9)),
        ];
        let asks = vec![
            lvl(dec!(0.91), dec!(1)),
            lvl(dec!(0.48), dec!(4)),
            lvl(dec!(0.50), dec!(6)),
        ];
        let b = book(bids.clone(), asks.clone(), Decimal::ZERO);
        let q = best_bid_ask(&b);

        let bid = q.best_bid.unwrap();
        let ask = q.best_ask.unwrap();
        assert!(bids.iter().all(|l| bid.price >= l.price));
        assert!(asks.iter().all(|l| ask.price <= l.price));

        // Input is left untouched
        assert_eq!(b.bids, bids);
        assert_eq!(b.asks, asks);
    }

    #[test]
    fn test_equal_best_asks_resolve_to_first_listed() {
        let b = book(
            vec![],
            vec![lvl(dec!(0.70), dec!(1)), lvl(dec!(0.40), dec!(11)), lvl(dec!(0.40), dec!(22))],
            Decimal::ZERO,
        );
        assert_eq!(best_bid_ask(&b).best_ask, Some(lvl(dec!(0.40), dec!(11))));
    }

    // ============================================================================
    // Sizing
    // ============================================================================

    #[test]
    fn test_budget_of_ten_at_half_buys_twenty() {
        let crossing = book(vec![], vec![lvl(dec!(0.50), dec!(100))], Decimal::ZERO);
        let sized = size_by_budget(&crossing, dec!(10), Some(dec!(0.50))).unwrap();
        assert_eq!(sized.size, dec!(20));
        assert!(sized.is_marketable);

        let resting = book(vec![], vec![lvl(dec!(0.55), dec!(100))], Decimal::ZERO);
        let sized = size_by_budget(&resting, dec!(10), Some(dec!(0.50))).unwrap();
        assert_eq!(sized.size, dec!(20));
        assert!(!sized.is_marketable);
    }

    #[test]
    fn test_budget_below_minimum_size_cost() {
        let b = book(vec![], vec![], dec!(5));
        let err = size_by_budget(&b, dec!(0.40), Some(dec!(0.50))).unwrap_err();
        assert_eq!(
            err,
            SizingError::BudgetTooLowForMinimumSize {
                min_cost: dec!(2.5),
                price: dec!(0.50),
            }
        );
    }

    #[test]
    fn test_marketable_notional_floor() {
        let b = book(vec![], vec![lvl(dec!(0.50), dec!(100))], Decimal::ZERO);
        let err = size_by_budget(&b, dec!(0.5), Some(dec!(0.5))).unwrap_err();
        assert!(matches!(err, SizingError::NotionalBelowMinimum { notional } if notional == dec!(0.5)));
    }

    #[test]
    fn test_sized_cost_never_exceeds_budget() {
        let b = book(vec![], vec![lvl(dec!(0.37), dec!(1000))], Decimal::ZERO);
        for budget in [dec!(1.01), dec!(3.33), dec!(7), dec!(19.99), dec!(250)] {
            for price in [dec!(0.07), dec!(0.37), dec!(0.5), dec!(0.93)] {
                if let Ok(sized) = size_by_budget(&b, budget, Some(price)) {
                    assert!(
                        sized.size * sized.price <= budget,
                        "{} x {} exceeds {}",
                        sized.size,
                        sized.price,
                        budget
                    );
                    assert!(sized.size.scale() <= 6);
                }
            }
        }
    }

    #[test]
    fn test_missing_asks_without_limit_is_no_liquidity() {
        let b = book(vec![lvl(dec!(0.2), dec!(5))], vec![], Decimal::ZERO);
        assert_eq!(size_by_budget(&b, dec!(5), None), Err(SizingError::NoLiquidity));
    }

    #[test]
    fn test_order_amounts_for_limit_buy() {
        let (maker, taker) = order_amounts(Side::Buy, dec!(0.55), dec!(10), dec!(0.01)).unwrap();
        assert_eq!(maker, U256::from(5_500_000u64));
        assert_eq!(taker, U256::from(10_000_000u64));
    }

    // ============================================================================
    // Diagnostics
    // ============================================================================

    #[tokio::test]
    async fn test_empty_account_gets_both_hints() {
        let report = build_report(identity(), BalanceAllowance::default(), None).await;
        let report = diagnose_and_recommend(report);

        let recs = report.recommendations.unwrap();
        let steps = report.next_steps.unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(steps.len(), 2);
        assert!(recs[0].contains("Fund"));
        assert!(recs[1].contains("Approve USDC"));
    }

    #[tokio::test]
    async fn test_onchain_failure_is_isolated_per_spender() {
        let lookup = StubLookup {
            answers: [(NEG_RISK.parse::<Address>().unwrap(), U256::from(9u64))].into_iter().collect(),
        };
        let balance = BalanceAllowance {
            balance: dec!(3),
            allowances: [
                (EXCHANGE.to_string(), U256::zero()),
                (NEG_RISK.to_string(), U256::zero()),
            ]
            .into_iter()
            .collect(),
        };

        let report = build_report(identity(), balance, Some(&lookup)).await;
        let onchain = report.onchain_allowances.as_ref().unwrap();
        assert_eq!(
            onchain[EXCHANGE],
            OnchainAllowance::Error("request timed out".to_string())
        );
        assert_eq!(onchain[NEG_RISK], OnchainAllowance::Amount(U256::from(9u64)));

        let report = diagnose_and_recommend(report);
        let recs = report.recommendations.unwrap();
        assert!(recs.iter().any(|r| r.contains("run refresh-balance")));
    }

    #[test]
    fn test_preflight_needs_positive_balance_and_allowance() {
        let mut bal = BalanceAllowance {
            balance: dec!(10),
            allowances: [(EXCHANGE.to_string(), U256::MAX)].into_iter().collect(),
        };
        assert!(preflight(&bal).is_ok());

        bal.balance = Decimal::ZERO;
        let warning = preflight(&bal).unwrap_err();
        assert_eq!(
            warning.to_string(),
            "insufficient balance/allowance (balance or allowance is 0)"
        );
    }
}
