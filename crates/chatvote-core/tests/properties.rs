//! Property tests for the duration codec and the vote pipeline.

#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

use chatvote_core::aggregate::Aggregator;
use chatvote_core::duration;
use chatvote_core::resolver::VoteResolver;
use chatvote_core::store::EventStore;
use chatvote_types::{
    ActorId, BinnedSeries, Category, CategoryTotal, RawChatEvent, VoteChange, VoteDirection,
};
use chrono::{DateTime, Utc};
use proptest::prelude::*;

const BODIES: [&str; 6] = ["buy", "SELL now", "hold on", "buy and sell", "hello", "buy buy"];

fn categories() -> Vec<Category> {
    vec![
        Category::new("buy", "Buy", "#00ff00", ["buy"]),
        Category::new("sell", "Sell", "#ff0000", ["sell"]),
        Category::new("hold", "Hold", "#0000ff", ["hold"]),
    ]
}

fn at(secs: u32) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000 + i64::from(secs), 0).unwrap()
}

/// `(second, actor, body index)` triples.
fn arb_events() -> impl Strategy<Value = Vec<(u32, u8, usize)>> {
    prop::collection::vec((0_u32..600, 0_u8..5, 0..BODIES.len()), 1..80)
}

fn raw(events: &[(u32, u8, usize)]) -> Vec<RawChatEvent> {
    events
        .iter()
        .map(|(secs, actor, body)| {
            RawChatEvent::new(at(*secs), format!("u{actor}"), *BODIES.get(*body).unwrap())
        })
        .collect()
}

type Folded = (Vec<VoteChange>, Vec<CategoryTotal>, BinnedSeries);

/// Run a whole event list through store, resolver and aggregator at once.
fn fold(events: Vec<RawChatEvent>, bin_width: u64) -> Folded {
    let cats = categories();
    let mut store = EventStore::new();
    store.load(events).unwrap();
    let mut resolver = VoteResolver::new();
    let mut aggregator = Aggregator::new(&cats, bin_width, 3, store.first_timestamp());

    let changes = resolver
        .resolve(store.advance_to(DateTime::<Utc>::MAX_UTC), &cats)
        .unwrap();
    for change in &changes {
        aggregator.apply(change).unwrap();
    }
    assert!(resolver.ledger().verify_balances().is_balanced());
    (changes, aggregator.totals(), aggregator.series())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn duration_round_trips_within_a_tenth(seconds in 0.0_f64..400_000.0, fields in 1_usize..=4) {
        let text = duration::format(seconds, fields);
        let back = duration::parse(&text).unwrap();
        prop_assert!((back - seconds).abs() <= 0.05 + 1e-6, "{seconds} -> {text} -> {back}");
        prop_assert!(duration::field_count(&text) >= fields);
    }

    // The first three bodies each name exactly one category.
    #[test]
    fn repeated_votes_count_once(repeats in 1_usize..50, body in 0_usize..3) {
        let events: Vec<(u32, u8, usize)> = (0..repeats)
            .map(|i| (u32::try_from(i).unwrap(), 0, body))
            .collect();
        let (changes, totals, _) = fold(raw(&events), 30);
        prop_assert_eq!(changes.len(), 1);
        prop_assert_eq!(totals.iter().map(|t| t.total).sum::<i64>(), 1);
    }

    #[test]
    fn every_actor_nets_zero_or_one(events in arb_events()) {
        let (changes, totals, _) = fold(raw(&events), 30);

        let mut net: std::collections::BTreeMap<ActorId, i64> = std::collections::BTreeMap::new();
        for change in &changes {
            let entry = net.entry(change.actor_id.clone()).or_insert(0);
            *entry += change.direction.delta();
            prop_assert!((0..=1).contains(entry));
        }
        // Every withdrawal is immediately followed by the same event's addition.
        for (i, change) in changes.iter().enumerate() {
            if change.direction == VoteDirection::Withdraw {
                let next = changes.get(i + 1).unwrap();
                prop_assert_eq!(next.direction, VoteDirection::Add);
                prop_assert_eq!(next.seq, change.seq);
                prop_assert_ne!(&next.category, &change.category);
            }
        }
        let sum: i64 = totals.iter().map(|t| t.total).sum();
        prop_assert_eq!(sum, net.values().sum::<i64>());
    }

    #[test]
    fn bins_never_go_negative(events in arb_events(), bin_width in 1_u64..120) {
        let (_, totals, series) = fold(raw(&events), bin_width);
        prop_assert!(totals.iter().all(|t| t.total >= 0));
        for dataset in &series.datasets {
            prop_assert!(dataset.points.iter().all(|p| p.value >= 0));
        }
    }

    #[test]
    fn ambiguous_events_change_nothing(
        events in arb_events(),
        pick in any::<prop::sample::Index>(),
        actor in 0_u8..5,
    ) {
        let base = raw(&events);
        // Reuse an existing timestamp so the origin and span stay put.
        let (secs, _, _) = *pick.get(&events);
        let mut with_ambiguous = base.clone();
        with_ambiguous.insert(
            pick.index(with_ambiguous.len() + 1),
            RawChatEvent::new(at(secs), format!("u{actor}"), "hold or sell"),
        );

        let (_, totals_a, series_a) = fold(base, 30);
        let (_, totals_b, series_b) = fold(with_ambiguous, 30);
        prop_assert_eq!(totals_a, totals_b);
        prop_assert_eq!(series_a, series_b);
    }

    #[test]
    fn folding_is_deterministic(events in arb_events()) {
        let first = fold(raw(&events), 10);
        let second = fold(raw(&events), 10);
        prop_assert_eq!(first, second);
    }
}
