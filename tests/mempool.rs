use {super::*, pretty_assertions::assert_eq};

#[test]
fn vanished_transactions_are_dropped_silently() {
  let harness = harness();

  harness
    .chain
    .push_block(vec![mockchain::coinbase(0, 0, 50_000, script(0))]);
  assert!(harness.index.try_resync().unwrap());

  let pending = harness
    .chain
    .add_mempool_tx(mockchain::coinbase(5, 5, 1_000, script(9)));
  harness.chain.evict_body(pending);

  harness.index.see(pending).unwrap();

  assert!(!harness.index.seen_script_id(script_id(9)).unwrap());
  assert_eq!(harness.index.txo_by_txo(pending, 0).unwrap(), None);
}

#[test]
fn resync_rebuilds_the_shadow_from_the_source() {
  let harness = harness();

  harness
    .chain
    .push_block(vec![mockchain::coinbase(0, 0, 50_000, script(0))]);

  // Staged before the engine ever saw an announcement; only the
  // wholesale reset after resync can pick it up.
  harness
    .chain
    .add_mempool_tx(mockchain::coinbase(6, 6, 2_000, script(11)));

  assert!(harness.index.try_resync().unwrap());

  assert!(harness.index.seen_script_id(script_id(11)).unwrap());
}

#[test]
fn unconfirmed_activity_emits_events() {
  let harness = harness();

  harness
    .chain
    .push_block(vec![mockchain::coinbase(0, 0, 50_000, script(0))]);
  assert!(harness.index.try_resync().unwrap());
  connected_blocks(&harness.events);

  let pending = harness
    .chain
    .add_mempool_tx(mockchain::coinbase(7, 7, 3_000, script(12)));
  harness.index.see(pending).unwrap();

  let events = harness.events.try_iter().collect::<Vec<Event>>();

  assert!(events.iter().any(|event| matches!(
    event,
    Event::ScriptTouched {
      txid,
      height: None,
      ..
    } if *txid == pending
  )));

  assert!(events.iter().any(|event| matches!(
    event,
    Event::TransactionSeen {
      txid,
      confirming: None,
      ..
    } if *txid == pending
  )));
}
