//! Money extraction shared by the purchase and subscription detectors.
//!
//! Context-anchored patterns (`total: $X`, `amount charged: $X`, …) are
//! tried first; when none hit, a fallback scan captures up to five
//! currency-tagged amounts and keeps the largest plausible one.

use regex::Regex;

/// Upper bound for amounts accepted by the fallback scan.
const MAX_PLAUSIBLE_AMOUNT: f64 = 500_000.0;

/// How many fallback candidates are considered per message.
const MAX_FALLBACK_CANDIDATES: usize = 5;

/// An extracted amount with its ISO 4217 currency.
#[derive(Debug, Clone, PartialEq)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

/// Pre-compiled extraction patterns.
pub struct AmountExtractor {
    anchored_symbol: Regex,
    anchored_code: Regex,
    fallback_symbol: Regex,
    fallback_code: Regex,
}

impl Default for AmountExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl AmountExtractor {
    pub fn new() -> Self {
        let anchors = r"(?:grand total|order total|total amount|amount charged|amount due|amount paid|payment of|you paid|you were charged|charged|billed|total|amount|price)";
        Self {
            anchored_symbol: Regex::new(&format!(
                r"(?i){anchors}\s*:?\s*([$€£¥])\s*([0-9][0-9.,']*)"
            ))
            .expect("valid anchored symbol pattern"),
            anchored_code: Regex::new(&format!(
                r"(?i){anchors}\s*:?\s*(usd|eur|gbp|jpy)\s*([0-9][0-9.,']*)"
            ))
            .expect("valid anchored code pattern"),
            fallback_symbol: Regex::new(r"([$€£¥])\s*([0-9][0-9.,']*)")
                .expect("valid fallback symbol pattern"),
            fallback_code: Regex::new(r"(?i)\b([0-9][0-9.,']*)\s*(usd|eur|gbp|jpy)\b")
                .expect("valid fallback code pattern"),
        }
    }

    /// Extract the best amount from a message's text.
    pub fn extract(&self, text: &str) -> Option<Money> {
        if let Some(caps) = self.anchored_symbol.captures(text) {
            let currency = currency_for_symbol(&caps[1]);
            if let Some(amount) = parse_amount(&caps[2], currency) {
                return Some(Money {
                    amount,
                    currency: currency.to_string(),
                });
            }
        }

        if let Some(caps) = self.anchored_code.captures(text) {
            let currency = caps[1].to_uppercase();
            if let Some(amount) = parse_amount(&caps[2], &currency) {
                return Some(Money { amount, currency });
            }
        }

        self.fallback_scan(text)
    }

    /// Scan for currency-tagged amounts, keeping the maximum in
    /// `(0, MAX_PLAUSIBLE_AMOUNT]`.
    fn fallback_scan(&self, text: &str) -> Option<Money> {
        let mut best: Option<Money> = None;
        let mut seen = 0usize;

        let symbol_candidates = self
            .fallback_symbol
            .captures_iter(text)
            .filter_map(|caps| {
                let currency = currency_for_symbol(caps.get(1)?.as_str());
                let amount = parse_amount(caps.get(2)?.as_str(), currency)?;
                Some(Money {
                    amount,
                    currency: currency.to_string(),
                })
            });
        let code_candidates = self.fallback_code.captures_iter(text).filter_map(|caps| {
            let currency = caps.get(2)?.as_str().to_uppercase();
            let amount = parse_amount(caps.get(1)?.as_str(), &currency)?;
            Some(Money { amount, currency })
        });

        for candidate in symbol_candidates.chain(code_candidates) {
            if seen >= MAX_FALLBACK_CANDIDATES {
                break;
            }
            seen += 1;
            if candidate.amount <= 0.0 || candidate.amount > MAX_PLAUSIBLE_AMOUNT {
                continue;
            }
            match &best {
                Some(current) if current.amount >= candidate.amount => {}
                _ => best = Some(candidate),
            }
        }

        best
    }
}

/// Map a currency symbol to its ISO 4217 code.
fn currency_for_symbol(symbol: &str) -> &'static str {
    match symbol {
        "$" => "USD",
        "€" => "EUR",
        "£" => "GBP",
        "¥" => "JPY",
        _ => "USD",
    }
}

/// Parse a raw numeric token into a non-negative amount.
///
/// Apostrophe and comma thousand separators are stripped. EUR amounts with a
/// `,dd` tail use European notation: dots are thousand separators and the
/// comma is the decimal mark (`1.234,56` → `1234.56`).
pub fn parse_amount(raw: &str, currency: &str) -> Option<f64> {
    let mut cleaned: String = raw
        .trim()
        .trim_end_matches(['.', ','])
        .chars()
        .filter(|c| *c != '\'')
        .collect();

    let european = currency.eq_ignore_ascii_case("eur")
        && cleaned
            .rsplit_once(',')
            .is_some_and(|(_, tail)| tail.len() == 2 && tail.chars().all(|c| c.is_ascii_digit()));

    if european {
        cleaned = cleaned.replace('.', "").replace(',', ".");
    } else {
        cleaned = cleaned.replace(',', "");
    }

    let amount: f64 = cleaned.parse().ok()?;
    (amount >= 0.0 && amount.is_finite()).then_some(amount)
}
