//! Option/quote selection policy
//!
//! Deterministic, single-path selection: at most one option and one quote
//! per pipeline run. Deposit prefers the option whose first input token is
//! the configured reference asset, withdraw prefers the same over wanted
//! outputs; both fall back to the first option in the supplied order.
//! Quotes are taken first-in-order - the aggregator pre-orders them.

use crate::aggregator::{Quote, VaultOption};
use crate::error::{Error, Result};

pub fn select_deposit_option<'a>(
    options: &'a [VaultOption],
    preferred_token: &str,
) -> Result<&'a VaultOption> {
    if options.is_empty() {
        return Err(Error::NoOptionsAvailable(
            "no deposit options returned".to_string(),
        ));
    }

    Ok(options
        .iter()
        .find(|option| first_symbol_matches(&option.input_tokens, preferred_token))
        .unwrap_or(&options[0]))
}

pub fn select_withdraw_option<'a>(
    options: &'a [VaultOption],
    preferred_token: &str,
) -> Result<&'a VaultOption> {
    if options.is_empty() {
        return Err(Error::NoOptionsAvailable(
            "no withdraw options returned".to_string(),
        ));
    }

    Ok(options
        .iter()
        .find(|option| first_symbol_matches(&option.wanted_tokens, preferred_token))
        .unwrap_or(&options[0]))
}

/// First in supplied order; no scoring happens here
pub fn select_quote(quotes: &[Quote]) -> Result<&Quote> {
    quotes
        .first()
        .ok_or_else(|| Error::NoQuotesAvailable("no quotes returned".to_string()))
}

fn first_symbol_matches(tokens: &[crate::aggregator::TokenRef], preferred: &str) -> bool {
    tokens
        .first()
        .map(|token| token.symbol.eq_ignore_ascii_case(preferred))
        .unwrap_or(false)
}
