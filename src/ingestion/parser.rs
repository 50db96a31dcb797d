use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::models::{Mode, Side, SignalDraft, Zone};

// Message dialect, one signal per post:
//
//   BTC/USDT Long          -> MARKET LONG (activate immediately)
//   BTC/USDT Short         -> MARKET SHORT
//   BTC/USDT Short on      -> WAIT SHORT (activate on entry touch)
//   BTC/USDT Buy           -> WAIT LONG
//   BTC/USDT Sell          -> WAIT SHORT
//   1. Entry price: a - b  (required; single number allowed)
//   2. Entry price: a - b  (optional secondary entry)
//   Targets: x, y, z       (required; "Resistance levels:" also accepted)
//
// Trailing words after the header verb ("on spot", "on futures", ...) are
// tolerated.

static PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*([A-Z0-9]+)\s*/\s*(USDT)\s*(LONG|SHORT|BUY|SELL)\b(?:\s+(ON)\b)?")
        .unwrap()
});

static ENTRY1_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)1\.\s*Entry price:\s*([0-9.]+)\s*(?:-\s*([0-9.]+))?").unwrap()
});

static ENTRY2_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)2\.\s*Entry price:\s*([0-9.]+)\s*(?:-\s*([0-9.]+))?").unwrap()
});

static TARGETS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)(?:Targets|Resistance levels):\s*(.+?)(?:\n\n|\nStop\s*Loss:|\z)").unwrap()
});

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]*\.[0-9]+|[0-9]+(?:\.[0-9]+)?)").unwrap());

/// Parse one channel post into a signal draft. Returns `None` for anything
/// that is not a well-formed signal — the channel also carries chatter,
/// recaps and images, none of which should reach the store.
pub fn parse_signal(message_id: i64, text: &str) -> Option<SignalDraft> {
    let header = PAIR_RE.captures(text)?;

    let base = header.get(1)?.as_str().to_uppercase();
    let quote = header.get(2)?.as_str().to_uppercase();
    let verb = header.get(3)?.as_str().to_lowercase();
    let has_on = header.get(4).is_some();
    let symbol = format!("{base}{quote}");

    // "Long"/"Short" trade at market; the waiting forms are "Short on",
    // "Buy" and "Sell". A bare "Long on" stays MARKET (the channel never
    // used it as a waiting form).
    let (side, mode) = match verb.as_str() {
        "long" => (Side::Long, Mode::Market),
        "short" if has_on => (Side::Short, Mode::Wait),
        "short" => (Side::Short, Mode::Market),
        "buy" => (Side::Long, Mode::Wait),
        "sell" => (Side::Short, Mode::Wait),
        _ => return None,
    };

    // Entry1 is required even for MARKET signals: without it there is no
    // zone to report against, so the message is ignored as malformed.
    let entry1 = parse_zone(&ENTRY1_RE.captures(text)?)?;
    let entry2 = ENTRY2_RE.captures(text).and_then(|c| parse_zone(&c));

    let block = TARGETS_RE.captures(text)?;
    let mut targets = parse_levels(block.get(1)?.as_str());
    if targets.is_empty() {
        return None;
    }

    // Consumption order is fixed here, once: ascending for LONG, descending
    // for SHORT. The engine walks the list in order and never re-sorts.
    targets.sort();
    if side == Side::Short {
        targets.reverse();
    }

    Some(SignalDraft {
        source_message_id: message_id,
        symbol,
        side,
        mode,
        entry1,
        entry2,
        targets,
    })
}

fn parse_zone(caps: &regex::Captures<'_>) -> Option<Zone> {
    let low = Decimal::from_str(caps.get(1)?.as_str()).ok()?;
    match caps.get(2) {
        Some(high) => {
            let high = Decimal::from_str(high.as_str()).ok()?;
            Some(Zone::new(low, high))
        }
        None => Some(Zone::point(low)),
    }
}

fn parse_levels(raw: &str) -> Vec<Decimal> {
    let cleaned = raw.replace(',', " ");
    NUMBER_RE
        .find_iter(&cleaned)
        .filter_map(|m| Decimal::from_str(m.as_str()).ok())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_market_long() {
        let text = "BTC/USDT Long\n1. Entry price: 64000 - 64500\nTargets: 65000, 66000, 67000";
        let draft = parse_signal(1, text).expect("should parse");

        assert_eq!(draft.symbol, "BTCUSDT");
        assert_eq!(draft.side, Side::Long);
        assert_eq!(draft.mode, Mode::Market);
        assert_eq!(draft.entry1, Zone::new(dec!(64000), dec!(64500)));
        assert!(draft.entry2.is_none());
        assert_eq!(draft.targets, vec![dec!(65000), dec!(66000), dec!(67000)]);
    }

    #[test]
    fn test_short_on_is_wait() {
        let text = "ETH/USDT Short on\n1. Entry price: 3500\nTargets: 3400, 3300";
        let draft = parse_signal(2, text).expect("should parse");

        assert_eq!(draft.side, Side::Short);
        assert_eq!(draft.mode, Mode::Wait);
        assert_eq!(draft.entry1, Zone::point(dec!(3500)));
    }

    #[test]
    fn test_bare_short_is_market() {
        let text = "SOL/USDT Short\n1. Entry price: 150 - 152\nTargets: 148, 145";
        let draft = parse_signal(3, text).expect("should parse");

        assert_eq!(draft.mode, Mode::Market);
        assert_eq!(draft.side, Side::Short);
    }

    #[test]
    fn test_buy_and_sell_are_wait() {
        let buy = "DOGE/USDT Buy\n1. Entry price: 0.12 - 0.13\nTargets: 0.14";
        let sell = "XRP/USDT Sell\n1. Entry price: 0.5\nTargets: 0.45";

        let buy = parse_signal(4, buy).expect("should parse");
        assert_eq!((buy.side, buy.mode), (Side::Long, Mode::Wait));

        let sell = parse_signal(5, sell).expect("should parse");
        assert_eq!((sell.side, sell.mode), (Side::Short, Mode::Wait));
    }

    #[test]
    fn test_header_tolerates_trailing_words_and_case() {
        let text = "btc/usdt short ON futures\n1. Entry price: 60000\nTargets: 59000";
        let draft = parse_signal(6, text).expect("should parse");

        assert_eq!(draft.symbol, "BTCUSDT");
        assert_eq!(draft.mode, Mode::Wait);
    }

    #[test]
    fn test_targets_sorted_per_side() {
        let long = "BTC/USDT Long\n1. Entry price: 100\nTargets: 110, 105, 120";
        let short = "BTC/USDT Short\n1. Entry price: 100\nTargets: 90, 95, 80";

        let long = parse_signal(7, long).expect("should parse");
        assert_eq!(long.targets, vec![dec!(105), dec!(110), dec!(120)]);

        let short = parse_signal(8, short).expect("should parse");
        assert_eq!(short.targets, vec![dec!(95), dec!(90), dec!(80)]);
    }

    #[test]
    fn test_entry_range_normalized() {
        let text = "BTC/USDT Buy\n1. Entry price: 64500 - 64000\nTargets: 65000";
        let draft = parse_signal(9, text).expect("should parse");

        assert_eq!(draft.entry1, Zone::new(dec!(64000), dec!(64500)));
    }

    #[test]
    fn test_entry2_parsed() {
        let text = "BTC/USDT Buy\n1. Entry price: 100 - 101\n2. Entry price: 95 - 97\nTargets: 105";
        let draft = parse_signal(10, text).expect("should parse");

        assert_eq!(draft.entry2, Some(Zone::new(dec!(95), dec!(97))));
    }

    #[test]
    fn test_targets_block_stops_at_stop_loss() {
        let text = "BTC/USDT Long\n1. Entry price: 100\nTargets: 105, 110\nStop Loss: 90";
        let draft = parse_signal(11, text).expect("should parse");

        assert_eq!(draft.targets, vec![dec!(105), dec!(110)]);
    }

    #[test]
    fn test_rejects_non_signals() {
        assert!(parse_signal(12, "gm everyone, big week ahead").is_none());
        assert!(parse_signal(13, "BTC/USDT Long\nTargets: 105").is_none()); // no entry
        assert!(parse_signal(14, "BTC/USDT Long\n1. Entry price: 100").is_none()); // no targets
        assert!(parse_signal(15, "").is_none());
    }
}
