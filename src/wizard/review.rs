use rust_decimal::{Decimal, RoundingStrategy};

use crate::amount;
use crate::error::QuoteError;
use crate::model::{CostEntry, Quote};

/// User's answer at the review gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Back,
    Confirm,
}

/// One bridge or DEX hop of the route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteHop {
    pub tool: String,
    pub kind: String,
}

/// Display-ready summary of a quote. Pure derivation, no I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewSummary {
    pub from_symbol: String,
    pub to_symbol: String,
    pub send_amount: String,
    pub receive_amount: String,
    pub min_receive_amount: String,
    pub gas_cost_usd: Decimal,
    /// `None` unless fees add up to more than zero.
    pub fee_cost_usd: Option<Decimal>,
    pub duration_minutes: u64,
    pub hops: Vec<RouteHop>,
}

fn render(raw: &str, decimals: u8, field: &str) -> Result<String, QuoteError> {
    amount::display_amount(raw, decimals).ok_or_else(|| QuoteError::InvalidResponse {
        reason: format!("{field} '{raw}' is not a base-unit amount"),
    })
}

fn sum_usd(costs: &[CostEntry]) -> Decimal {
    costs
        .iter()
        .filter_map(|cost| cost.amount_usd.as_deref())
        .filter_map(amount::parse_decimal)
        .sum()
}

pub fn format_usd(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("${rounded:.2}")
}

impl ReviewSummary {
    pub fn from_quote(quote: &Quote) -> Result<Self, QuoteError> {
        let action = &quote.action;
        let to_decimals = action.to_token.decimals;
        let send_amount = render(&action.from_amount, action.from_token.decimals, "fromAmount")?;

        let (receive_amount, min_receive_amount, gas_cost_usd, fee_total, duration_minutes) =
            match quote.estimate.as_ref() {
                Some(estimate) => (
                    render(&estimate.to_amount, to_decimals, "toAmount")?,
                    render(&estimate.to_amount_min, to_decimals, "toAmountMin")?,
                    sum_usd(&estimate.gas_costs),
                    sum_usd(&estimate.fee_costs),
                    duration_minutes(estimate.execution_duration),
                ),
                None => {
                    let zero = amount::format_fixed(0, to_decimals, 4);
                    (zero.clone(), zero, Decimal::ZERO, Decimal::ZERO, 0)
                }
            };

        Ok(Self {
            from_symbol: action.from_token.symbol.clone(),
            to_symbol: action.to_token.symbol.clone(),
            send_amount,
            receive_amount,
            min_receive_amount,
            gas_cost_usd,
            fee_cost_usd: (fee_total > Decimal::ZERO).then_some(fee_total),
            duration_minutes,
            hops: quote
                .included_steps
                .iter()
                .map(|step| RouteHop {
                    tool: if step.tool_details.name.is_empty() {
                        step.tool.clone()
                    } else {
                        step.tool_details.name.clone()
                    },
                    kind: step.kind.clone(),
                })
                .collect(),
        })
    }

    pub fn gas_cost_display(&self) -> String {
        format_usd(self.gas_cost_usd)
    }

    pub fn fee_cost_display(&self) -> Option<String> {
        self.fee_cost_usd.map(format_usd)
    }

    /// Label/value rows in display order. Route hops are listed separately.
    pub fn lines(&self) -> Vec<(&'static str, String)> {
        let mut lines = vec![
            ("You send", format!("{} {}", self.send_amount, self.from_symbol)),
            (
                "You receive",
                format!("{} {}", self.receive_amount, self.to_symbol),
            ),
            ("Estimated Time", format!("{} min", self.duration_minutes)),
            ("Gas Cost", self.gas_cost_display()),
        ];
        if let Some(fees) = self.fee_cost_display() {
            lines.push(("Bridge Fees", fees));
        }
        lines.push((
            "Minimum Received",
            format!("{} {}", self.min_receive_amount, self.to_symbol),
        ));
        lines
    }
}

fn duration_minutes(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds / 60.0).ceil() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IncludedStep, QuoteAction, QuoteEstimate, TokenDescriptor, ToolDetails};
    use pretty_assertions::assert_eq;

    fn quote(estimate: Option<QuoteEstimate>) -> Quote {
        let quote = Quote::new(
            "q-1",
            ToolDetails {
                key: "across".into(),
                name: "Across".into(),
                logo_url: None,
            },
            QuoteAction {
                from_chain_id: 42161,
                to_chain_id: 999,
                from_token: TokenDescriptor::new(42161, "0xA", "USDC", 6),
                to_token: TokenDescriptor::new(999, "0xB", "USDC", 6),
                from_amount: "10000000".into(),
                slippage: Some(0.005),
                from_address: None,
                to_address: None,
            },
        );
        match estimate {
            Some(estimate) => quote.with_estimate(estimate),
            None => quote,
        }
    }

    #[test]
    fn gas_only_quote_has_no_fee_row() {
        let summary = ReviewSummary::from_quote(&quote(Some(QuoteEstimate {
            to_amount: "9950000".into(),
            to_amount_min: "9900250".into(),
            execution_duration: 61.0,
            gas_costs: vec![CostEntry::usd("1.20")],
            ..QuoteEstimate::default()
        })))
        .unwrap();

        assert_eq!(summary.send_amount, "10.0000");
        assert_eq!(summary.receive_amount, "9.9500");
        assert_eq!(summary.min_receive_amount, "9.9003");
        assert_eq!(summary.gas_cost_display(), "$1.20");
        assert_eq!(summary.fee_cost_usd, None);
        assert_eq!(summary.duration_minutes, 2);
        assert!(summary.lines().iter().all(|(label, _)| *label != "Bridge Fees"));
    }

    #[test]
    fn costs_sum_and_ignore_bad_values() {
        let summary = ReviewSummary::from_quote(&quote(Some(QuoteEstimate {
            to_amount: "1".into(),
            to_amount_min: "1".into(),
            gas_costs: vec![
                CostEntry::usd("0.40"),
                CostEntry::usd("abc"),
                CostEntry::default(),
                CostEntry::usd("0.125"),
            ],
            fee_costs: vec![CostEntry::usd("0.5"), CostEntry::usd("0.25")],
            ..QuoteEstimate::default()
        })))
        .unwrap();

        assert_eq!(summary.gas_cost_display(), "$0.53");
        assert_eq!(summary.fee_cost_display().as_deref(), Some("$0.75"));
        assert!(summary.lines().iter().any(|(label, _)| *label == "Bridge Fees"));
    }

    #[test]
    fn missing_estimate_renders_zeroes() {
        let summary = ReviewSummary::from_quote(&quote(None)).unwrap();
        assert_eq!(summary.receive_amount, "0.0000");
        assert_eq!(summary.min_receive_amount, "0.0000");
        assert_eq!(summary.duration_minutes, 0);
        assert_eq!(summary.gas_cost_display(), "$0.00");
    }

    #[test]
    fn malformed_amount_is_rejected() {
        let err = ReviewSummary::from_quote(&quote(Some(QuoteEstimate {
            to_amount: "12.5".into(),
            to_amount_min: "1".into(),
            ..QuoteEstimate::default()
        })))
        .unwrap_err();
        assert!(matches!(err, QuoteError::InvalidResponse { .. }));
    }

    #[test]
    fn hops_use_tool_names() {
        let quote = quote(None).with_included_step(IncludedStep {
            id: "s1".into(),
            kind: "cross".into(),
            tool: "across".into(),
            tool_details: ToolDetails {
                key: "across".into(),
                name: "Across".into(),
                logo_url: None,
            },
        });
        let summary = ReviewSummary::from_quote(&quote).unwrap();
        assert_eq!(
            summary.hops,
            vec![RouteHop {
                tool: "Across".into(),
                kind: "cross".into()
            }]
        );
    }

    #[test]
    fn durations_round_up() {
        assert_eq!(duration_minutes(0.0), 0);
        assert_eq!(duration_minutes(1.0), 1);
        assert_eq!(duration_minutes(60.0), 1);
        assert_eq!(duration_minutes(600.5), 11);
        assert_eq!(duration_minutes(f64::NAN), 0);
    }
}
