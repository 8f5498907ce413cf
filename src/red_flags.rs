//! Red-flag scan over merged source results
//!
//! Stateless detectors over a closed category set. The declaration order of
//! `RedFlagCategory` is the action-item priority order; flags sort by
//! (category, ticker) so downstream rendering is deterministic.

use crate::sources::{DataSourceResult, Filing, Headline, Payload};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedFlagCategory {
    LeadershipDeparture,
    AuditorChange,
    GuidanceCut,
    CustomerLoss,
    RegulatorySetback,
    DebtCovenant,
    DilutiveOffering,
    InsiderClusterSelling,
    ShortSellerReport,
    LargePriceMove,
}

impl RedFlagCategory {
    pub fn label(&self) -> &'static str {
        match self {
            RedFlagCategory::LeadershipDeparture => "Leadership departure",
            RedFlagCategory::AuditorChange => "Auditor change",
            RedFlagCategory::GuidanceCut => "Guidance cut",
            RedFlagCategory::CustomerLoss => "Customer loss",
            RedFlagCategory::RegulatorySetback => "Regulatory setback",
            RedFlagCategory::DebtCovenant => "Debt covenant / downgrade",
            RedFlagCategory::DilutiveOffering => "Dilutive offering",
            RedFlagCategory::InsiderClusterSelling => "Insider cluster selling",
            RedFlagCategory::ShortSellerReport => "Short-seller report",
            RedFlagCategory::LargePriceMove => "Large price move",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RedFlag {
    pub category: RedFlagCategory,
    pub ticker: String,
    pub evidence: String,
}

/// Categorize an 8-K item number or registration form type.
fn filing_category(filing: &Filing) -> Option<RedFlagCategory> {
    for item in &filing.items {
        match item.as_str() {
            "5.02" => return Some(RedFlagCategory::LeadershipDeparture),
            "4.01" => return Some(RedFlagCategory::AuditorChange),
            "3.02" => return Some(RedFlagCategory::DilutiveOffering),
            _ => {}
        }
    }
    if filing.filing_type.starts_with("S-3") || filing.filing_type.starts_with("424B") {
        return Some(RedFlagCategory::DilutiveOffering);
    }
    None
}

/// Keyword detectors over headline text. First match wins; the category
/// ordering above resolves any overlap deterministically.
fn headline_category(title: &str) -> Option<RedFlagCategory> {
    const GUIDANCE: [&str; 5] = [
        "cuts guidance",
        "lowers guidance",
        "cuts outlook",
        "lowers outlook",
        "slashes forecast",
    ];
    const CUSTOMER: [&str; 4] = [
        "loses customer",
        "loses contract",
        "cancels order",
        "contract cancellation",
    ];
    const REGULATORY: [&str; 5] = [
        "regulatory setback",
        "export restriction",
        "license denied",
        "investigation",
        "probe",
    ];
    const DEBT: [&str; 3] = ["downgrade", "covenant", "credit rating cut"];
    const SHORT_REPORT: [&str; 3] = ["short seller", "short-seller", "short report"];

    let lower = title.to_lowercase();
    let matches = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if matches(&GUIDANCE) {
        Some(RedFlagCategory::GuidanceCut)
    } else if matches(&CUSTOMER) {
        Some(RedFlagCategory::CustomerLoss)
    } else if matches(&REGULATORY) {
        Some(RedFlagCategory::RegulatorySetback)
    } else if matches(&DEBT) {
        Some(RedFlagCategory::DebtCovenant)
    } else if matches(&SHORT_REPORT) {
        Some(RedFlagCategory::ShortSellerReport)
    } else {
        None
    }
}

fn push_unique(
    flags: &mut Vec<RedFlag>,
    seen: &mut BTreeSet<(RedFlagCategory, String)>,
    category: RedFlagCategory,
    ticker: &str,
    evidence: String,
) {
    if seen.insert((category, ticker.to_string())) {
        flags.push(RedFlag {
            category,
            ticker: ticker.to_string(),
            evidence,
        });
    }
}

/// Scan merged results. Pure: same results and threshold always produce the
/// same flags, sorted by (category, ticker).
pub fn scan(results: &[DataSourceResult], price_move_threshold: f64) -> Vec<RedFlag> {
    let mut flags = Vec::new();
    let mut seen = BTreeSet::new();

    for result in results {
        let Some(payload) = &result.payload else {
            continue;
        };

        match payload {
            Payload::Quotes(snapshots) => {
                for snap in snapshots {
                    if let Some(change) = snap.change_pct {
                        if change.abs() > price_move_threshold {
                            push_unique(
                                &mut flags,
                                &mut seen,
                                RedFlagCategory::LargePriceMove,
                                &snap.symbol,
                                format!("1-day move of {:+.2}%", change),
                            );
                        }
                    }
                }
            }
            Payload::Filings(by_ticker) => {
                for (ticker, filings) in by_ticker {
                    for filing in filings {
                        if let Some(category) = filing_category(filing) {
                            push_unique(
                                &mut flags,
                                &mut seen,
                                category,
                                ticker,
                                format!(
                                    "{} filed {}: {}",
                                    filing.filing_type, filing.filed_date, filing.title
                                ),
                            );
                        }
                    }
                }
            }
            Payload::News(by_ticker) => {
                for (ticker, headlines) in by_ticker {
                    for headline in headlines {
                        if let Some(category) = headline_category(&headline.title) {
                            push_unique(
                                &mut flags,
                                &mut seen,
                                category,
                                ticker,
                                headline.title.clone(),
                            );
                        }
                    }
                }
            }
            Payload::Insider(by_ticker) => {
                for (ticker, activity) in by_ticker {
                    if activity.cluster_alert {
                        push_unique(
                            &mut flags,
                            &mut seen,
                            RedFlagCategory::InsiderClusterSelling,
                            ticker,
                            format!(
                                "{} insider transaction(s) with distinct sellers clustered in the lookback window",
                                activity.transaction_count
                            ),
                        );
                    }
                }
            }
            // Pulse, prediction, consensus, and macro payloads inform the
            // report but carry no flag detectors.
            _ => {}
        }
    }

    flags.sort();
    flags
}

/// Headlines that tripped no detector, for the report's top-headline cut.
pub fn benign_headlines(headlines: &[Headline]) -> Vec<&Headline> {
    headlines
        .iter()
        .filter(|h| headline_category(&h.title).is_none())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{InsiderActivity, QuoteSnapshot, SourceId};
    use std::collections::BTreeMap;

    fn quote_result(symbol: &str, change_pct: f64) -> DataSourceResult {
        DataSourceResult::ok(
            SourceId::Quotes,
            Payload::Quotes(vec![QuoteSnapshot {
                symbol: symbol.to_string(),
                company: symbol.to_string(),
                price: Some(100.0),
                change_pct: Some(change_pct),
                market_cap: None,
                pe_trailing: None,
                pe_forward: None,
                ev_ebitda: None,
                ps_ratio: None,
                last_trade_date: None,
                error: None,
            }]),
        )
    }

    #[test]
    fn test_nine_percent_move_is_flagged() {
        let flags = scan(&[quote_result("NVDA", -9.0)], 7.0);

        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].category, RedFlagCategory::LargePriceMove);
        assert_eq!(flags[0].ticker, "NVDA");
        assert!(flags[0].evidence.contains("-9.00%"));
    }

    #[test]
    fn test_threshold_move_is_not_flagged() {
        // Guardrails treat exactly-at-threshold as a trigger; the flag
        // detector requires a strict exceedance.
        let flags = scan(&[quote_result("NVDA", 7.0)], 7.0);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_eight_k_items_map_to_categories() {
        let mut by_ticker = BTreeMap::new();
        by_ticker.insert(
            "LUMN".to_string(),
            vec![
                Filing {
                    filing_type: "8-K".to_string(),
                    filed_date: "2026-08-05".to_string(),
                    title: "Lumen Technologies".to_string(),
                    url: String::new(),
                    items: vec!["5.02".to_string()],
                },
                Filing {
                    filing_type: "424B5".to_string(),
                    filed_date: "2026-08-06".to_string(),
                    title: "Prospectus supplement".to_string(),
                    url: String::new(),
                    items: vec![],
                },
            ],
        );

        let flags = scan(
            &[DataSourceResult::ok(SourceId::Filings, Payload::Filings(by_ticker))],
            7.0,
        );

        assert_eq!(flags.len(), 2);
        assert_eq!(flags[0].category, RedFlagCategory::LeadershipDeparture);
        assert_eq!(flags[1].category, RedFlagCategory::DilutiveOffering);
    }

    #[test]
    fn test_headline_keywords() {
        let mut by_ticker = BTreeMap::new();
        by_ticker.insert(
            "MRVL".to_string(),
            vec![
                Headline {
                    title: "Marvell lowers outlook on soft custom silicon demand".to_string(),
                    source: None,
                    published: None,
                    url: None,
                },
                Headline {
                    title: "Short-seller report targets Marvell accounting".to_string(),
                    source: None,
                    published: None,
                    url: None,
                },
                Headline {
                    title: "Marvell announces new design win".to_string(),
                    source: None,
                    published: None,
                    url: None,
                },
            ],
        );

        let flags = scan(
            &[DataSourceResult::ok(SourceId::News, Payload::News(by_ticker))],
            7.0,
        );

        let categories: Vec<RedFlagCategory> = flags.iter().map(|f| f.category).collect();
        assert_eq!(
            categories,
            vec![RedFlagCategory::GuidanceCut, RedFlagCategory::ShortSellerReport]
        );
    }

    #[test]
    fn test_insider_cluster_flag() {
        let mut by_ticker = BTreeMap::new();
        by_ticker.insert(
            "OKLO".to_string(),
            InsiderActivity {
                transactions: vec![],
                transaction_count: 4,
                cluster_alert: true,
            },
        );
        by_ticker.insert(
            "MOD".to_string(),
            InsiderActivity {
                transactions: vec![],
                transaction_count: 1,
                cluster_alert: false,
            },
        );

        let flags = scan(
            &[DataSourceResult::ok(SourceId::Insider, Payload::Insider(by_ticker))],
            7.0,
        );

        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].category, RedFlagCategory::InsiderClusterSelling);
        assert_eq!(flags[0].ticker, "OKLO");
    }

    #[test]
    fn test_flags_sort_by_priority_then_ticker() {
        let mut news = BTreeMap::new();
        news.insert(
            "ZZZ".to_string(),
            vec![Headline {
                title: "ZZZ cuts guidance for the full year".to_string(),
                source: None,
                published: None,
                url: None,
            }],
        );

        let results = vec![
            quote_result("AAA", 12.0),
            DataSourceResult::ok(SourceId::News, Payload::News(news)),
        ];

        let flags = scan(&results, 7.0);
        // GuidanceCut outranks LargePriceMove despite arriving later
        assert_eq!(flags[0].category, RedFlagCategory::GuidanceCut);
        assert_eq!(flags[1].category, RedFlagCategory::LargePriceMove);
    }

    #[test]
    fn test_duplicate_category_per_ticker_collapses() {
        let mut by_ticker = BTreeMap::new();
        by_ticker.insert(
            "NVDA".to_string(),
            vec![
                Headline {
                    title: "NVIDIA cuts outlook".to_string(),
                    source: None,
                    published: None,
                    url: None,
                },
                Headline {
                    title: "NVIDIA lowers guidance again".to_string(),
                    source: None,
                    published: None,
                    url: None,
                },
            ],
        );

        let flags = scan(
            &[DataSourceResult::ok(SourceId::News, Payload::News(by_ticker))],
            7.0,
        );
        assert_eq!(flags.len(), 1);
    }
}
