use crate::market_data::types::{Instrument, Snapshot};

/// Case-insensitive substring match on display name or symbol.
/// An empty term matches everything.
pub fn matches(instrument: &Instrument, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    let needle = term.to_lowercase();
    matches_lowered(instrument, &needle)
}

fn matches_lowered(instrument: &Instrument, needle: &str) -> bool {
    instrument.display_name.to_lowercase().contains(needle)
        || instrument.symbol.to_lowercase().contains(needle)
}

/// Subset of `snapshot` matching `term`, in the original order.
pub fn filter(snapshot: &Snapshot, term: &str) -> Snapshot {
    let needle = term.to_lowercase();
    Snapshot {
        fetched_at: snapshot.fetched_at,
        instruments: snapshot
            .instruments
            .iter()
            .filter(|i| needle.is_empty() || matches_lowered(i, &needle))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::types::fixtures::{instrument, raw};
    use chrono::Utc;
    use quickcheck_macros::quickcheck;

    fn snapshot() -> Snapshot {
        Snapshot::from_raw(raw(
            Utc::now(),
            vec![
                instrument("bitcoin", "btc", "Bitcoin", 50_000),
                instrument("ethereum", "eth", "Ethereum", 3_000),
                instrument("tether", "usdt", "Tether", 1),
                instrument("bitcoin-cash", "bch", "Bitcoin Cash", 400),
            ],
        ))
        .0
    }

    fn ids(s: &Snapshot) -> Vec<&str> {
        s.ids().collect()
    }

    #[test]
    fn empty_term_keeps_everything() {
        let s = snapshot();
        assert_eq!(filter(&s, ""), s);
    }

    #[test]
    fn matches_name_or_symbol_case_insensitively() {
        let s = snapshot();
        assert_eq!(ids(&filter(&s, "BT")), vec!["bitcoin"]);
        assert_eq!(ids(&filter(&s, "bitcoin")), vec!["bitcoin", "bitcoin-cash"]);
        assert_eq!(ids(&filter(&s, "USDT")), vec!["tether"]);
        assert_eq!(ids(&filter(&s, "ther")), vec!["ethereum", "tether"]);
    }

    #[test]
    fn no_match_yields_empty_snapshot_with_same_timestamp() {
        let s = snapshot();
        let out = filter(&s, "dogecoin");
        assert!(out.is_empty());
        assert_eq!(out.fetched_at, s.fetched_at);
    }

    #[test]
    fn single_instrument_predicate_agrees_with_filter() {
        let s = snapshot();
        let eth = s.get("ethereum").unwrap();
        assert!(matches(eth, "ETH"));
        assert!(matches(eth, ""));
        assert!(!matches(eth, "btc"));
    }

    #[quickcheck]
    fn filtering_is_idempotent(term: String) -> bool {
        let s = snapshot();
        let once = filter(&s, &term);
        filter(&once, &term) == once
    }

    #[quickcheck]
    fn filtering_preserves_relative_order(term: String) -> bool {
        let s = snapshot();
        let all = ids(&s);
        let kept = filter(&s, &term);
        let positions: Vec<usize> = kept
            .ids()
            .filter_map(|id| all.iter().position(|x| *x == id))
            .collect();
        positions.windows(2).all(|w| w[0] < w[1])
    }
}
