//! Pure reputation scoring engine (§4.2). No I/O, no randomness — every
//! branch is a deterministic function of the analytics bundle passed in.
//! Coefficient-of-variation and median are hand-rolled rather than pulled from
//! a stats crate, mirroring how this codebase's own `VaRCalculator`/
//! `CVaRCalculator` (risk.rs) compute their statistics by hand.

use std::collections::HashSet;

use crate::analytics::{AnalyticsBundle, TokenBalance, TopicMessage, Transfer, TransferDirection};
use crate::models::{now_ms, AccountId, RiskFlag, RiskSeverity, ScoreComponents, TrustScore};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const MONTH_MS: i64 = 30 * DAY_MS;
const HOUR_MS: i64 = 60 * 60 * 1000;

/// Topic trust/suspicious sets and the malicious-counterparty set are external
/// configuration (§9 open question c); this crate treats them as plain data.
#[derive(Debug, Clone, Default)]
pub struct ScoringConfig {
    pub trusted_topics: HashSet<String>,
    pub suspicious_topics: HashSet<String>,
    pub malicious_counterparties: HashSet<String>,
}

/// Computes a bounded [`TrustScore`] from an analytics bundle. `now` is the
/// wall-clock reference used for `ageMonths`/the 30-day volatility window —
/// per §4.2 it is "max timestamp seen, or wall clock" when not supplied.
pub fn compute(account: AccountId, bundle: &AnalyticsBundle, config: &ScoringConfig, now: Option<i64>) -> TrustScore {
    let now = now.unwrap_or_else(|| {
        bundle
            .transfers
            .as_ref()
            .and_then(|t| t.iter().map(|tr| tr.timestamp).max())
            .unwrap_or_else(now_ms)
    });

    let account_age = bundle
        .account_info
        .as_ref()
        .map(|info| account_age_component(info.created_at, now))
        .unwrap_or(0);

    let diversity = bundle
        .transfers
        .as_ref()
        .map(|t| diversity_component(t))
        .unwrap_or(0);

    let volatility = bundle
        .transfers
        .as_ref()
        .map(|t| volatility_component(t, now))
        .unwrap_or(0);

    let token_health = bundle
        .balances
        .as_ref()
        .map(|b| token_health_component(b))
        .unwrap_or(0);

    let hcs_quality = bundle
        .topics
        .as_ref()
        .map(|t| hcs_quality_component(t, config))
        .unwrap_or(0);

    let mut risk_flags = Vec::new();
    if let (Some(info), Some(transfers)) = (bundle.account_info.as_ref(), bundle.transfers.as_ref()) {
        detect_rapid_outflow(transfers, &mut risk_flags);
        detect_new_account_large_transfer(info.created_at, transfers, now, &mut risk_flags);
        detect_malicious_interaction(transfers, config, &mut risk_flags);
    }
    let risk_penalty = risk_penalty_component(&risk_flags);

    let raw = account_age + diversity + volatility + token_health + hcs_quality + risk_penalty;
    let score = raw.clamp(0, 100);

    TrustScore {
        account,
        score,
        components: ScoreComponents {
            account_age,
            diversity,
            volatility,
            token_health,
            hcs_quality,
            risk_penalty,
        },
        risk_flags,
        timestamp: now_ms(),
        stale: bundle.stale,
        partial: bundle.failed.iter().map(|s| s.to_string()).collect(),
    }
}

fn account_age_component(created_at: i64, now: i64) -> i64 {
    let age_months = (now - created_at) as f64 / MONTH_MS as f64;
    if age_months >= 6.0 {
        20
    } else if (1.0..6.0).contains(&age_months) {
        10
    } else {
        3
    }
}

fn diversity_component(transfers: &[Transfer]) -> i64 {
    let unique: HashSet<&str> = transfers.iter().map(|t| t.counterparty.as_str()).collect();
    let u = unique.len();
    if u >= 25 {
        20
    } else if (10..25).contains(&u) {
        10
    } else {
        5
    }
}

fn volatility_component(transfers: &[Transfer], now: i64) -> i64 {
    let window_start = now - MONTH_MS;
    let amounts: Vec<f64> = transfers
        .iter()
        .filter(|t| t.timestamp >= window_start && t.timestamp <= now)
        .map(|t| t.amount.abs())
        .collect();

    if amounts.is_empty() {
        return 3;
    }

    let cv = coefficient_of_variation(&amounts);
    if cv < 0.5 {
        20
    } else if cv < 1.5 {
        10
    } else {
        3
    }
}

fn coefficient_of_variation(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return f64::INFINITY;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean
}

fn token_health_component(balances: &[TokenBalance]) -> i64 {
    if balances.is_empty() {
        return 0;
    }
    let total: f64 = balances.iter().map(|b| b.balance).sum();
    if total <= 0.0 {
        return 0;
    }
    let dominant_share = balances.iter().map(|b| b.balance).fold(0.0, f64::max) / total;
    if dominant_share <= 0.5 {
        10
    } else {
        0
    }
}

fn hcs_quality_component(topics: &[TopicMessage], config: &ScoringConfig) -> i64 {
    let trusted = topics.iter().any(|m| config.trusted_topics.contains(&m.topic_id));
    let suspicious = topics.iter().any(|m| config.suspicious_topics.contains(&m.topic_id));
    match (trusted, suspicious) {
        (true, true) => 0,
        (true, false) => 10,
        (false, true) => -10,
        (false, false) => 0,
    }
}

fn detect_rapid_outflow(transfers: &[Transfer], flags: &mut Vec<RiskFlag>) {
    let mut sorted: Vec<&Transfer> = transfers.iter().collect();
    sorted.sort_by_key(|t| t.timestamp);

    // Reconstruct a relative running balance so "maximum observed balance in
    // the window" doesn't require an external balance-history input.
    let mut running = 0.0f64;
    let mut balances = Vec::with_capacity(sorted.len());
    for t in &sorted {
        running += match t.direction {
            TransferDirection::In => t.amount,
            TransferDirection::Out => -t.amount,
        };
        balances.push(running);
    }

    let mut left = 0;
    for right in 0..sorted.len() {
        while sorted[right].timestamp - sorted[left].timestamp > HOUR_MS {
            left += 1;
        }
        let balance_before = if left == 0 { 0.0 } else { balances[left - 1] };
        let window_max = balances[left..=right].iter().cloned().fold(balance_before, f64::max);
        let outflow_sum: f64 = sorted[left..=right]
            .iter()
            .filter(|t| t.direction == TransferDirection::Out)
            .map(|t| t.amount)
            .sum();

        if window_max > 0.0 && outflow_sum > 0.5 * window_max {
            flags.push(RiskFlag {
                kind: "rapid_outflow".to_string(),
                severity: RiskSeverity::High,
                description: format!(
                    "outflows of {outflow_sum:.2} exceeded 50% of the observed balance ({window_max:.2}) within a 1-hour window"
                ),
                detected_at: now_ms(),
            });
            return;
        }
    }
}

fn detect_new_account_large_transfer(created_at: i64, transfers: &[Transfer], now: i64, flags: &mut Vec<RiskFlag>) {
    let age_months = (now - created_at) as f64 / MONTH_MS as f64;
    if age_months >= 1.0 || transfers.is_empty() {
        return;
    }

    let mut magnitudes: Vec<f64> = transfers.iter().map(|t| t.amount.abs()).collect();
    let median = median_of(&mut magnitudes);
    if median <= 0.0 {
        return;
    }

    if let Some(max) = transfers.iter().map(|t| t.amount.abs()).fold(None, |acc: Option<f64>, v| {
        Some(acc.map_or(v, |a| a.max(v)))
    }) {
        if max > 10.0 * median {
            flags.push(RiskFlag {
                kind: "new_account_large_transfer".to_string(),
                severity: RiskSeverity::Medium,
                description: format!(
                    "a transfer of {max:.2} is more than 10x the account's median transfer ({median:.2}) within its first month"
                ),
                detected_at: now_ms(),
            });
        }
    }
}

fn detect_malicious_interaction(transfers: &[Transfer], config: &ScoringConfig, flags: &mut Vec<RiskFlag>) {
    if let Some(t) = transfers.iter().find(|t| config.malicious_counterparties.contains(&t.counterparty)) {
        flags.push(RiskFlag {
            kind: "malicious_interaction".to_string(),
            severity: RiskSeverity::High,
            description: format!("transacted with known-malicious counterparty {}", t.counterparty),
            detected_at: now_ms(),
        });
    }
}

fn risk_penalty_component(flags: &[RiskFlag]) -> i64 {
    let raw: i64 = flags
        .iter()
        .map(|f| match f.kind.as_str() {
            "rapid_outflow" => -10,
            "new_account_large_transfer" => -5,
            "malicious_interaction" => -10,
            _ => 0,
        })
        .sum();
    raw.clamp(-20, 0)
}

fn median_of(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
