use {super::*, pretty_assertions::assert_eq};

/// A chain where script 10 receives one coinbase output at height 100 which
/// is spent at height 105.
fn receive_then_spend() -> (Harness, Txid, Txid) {
  let harness = harness();

  for height in 0..100 {
    harness
      .chain
      .push_block(vec![mockchain::coinbase(height, 0, 50_000, script(0))]);
  }

  let receive = mockchain::coinbase(100, 0, 50_000, script(10));
  let receive_txid = receive.compute_txid();
  harness.chain.push_block(vec![receive]);

  for height in 101..105 {
    harness
      .chain
      .push_block(vec![mockchain::coinbase(height, 0, 50_000, script(0))]);
  }

  let spender = mockchain::spend(&[(receive_txid, 0)], &[(49_000, script(0))]);
  let spender_txid = spender.compute_txid();
  harness.chain.push_block(vec![
    mockchain::coinbase(105, 0, 50_000, script(0)),
    spender,
  ]);

  assert!(harness.index.try_resync().unwrap());

  (harness, receive_txid, spender_txid)
}

#[test]
fn utxo_queries_bound_spends_by_the_range_upper_bound() {
  let (harness, receive_txid, _spender_txid) = receive_then_spend();

  let unspent = |upper| {
    harness
      .index
      .utxos_by_script_range(&range(10, 0..upper), 100)
      .unwrap()
  };

  // The spend confirmed at 105: a range that cannot see it leaves the
  // output unspent.
  assert_eq!(
    unspent(101),
    vec![Txo {
      txid: receive_txid,
      vout: 0,
      height: Some(100),
      value: 50_000,
    }],
  );
  assert_eq!(unspent(104).len(), 1);
  assert_eq!(unspent(105).len(), 1);

  // A range extending past the spend sees the output consumed.
  assert_eq!(unspent(106), Vec::new());
  assert_eq!(unspent(200), Vec::new());
}

#[test]
fn confirmed_spends_shadow_unconfirmed_conflicts() {
  let (harness, receive_txid, spender_txid) = receive_then_spend();

  // A conflicting unconfirmed double spend of the same output.
  let conflict = harness
    .chain
    .add_mempool_tx(mockchain::spend(&[(receive_txid, 0)], &[(48_000, script(0))]));
  harness.index.see(conflict).unwrap();

  assert_eq!(
    harness.index.spents_from_txo(receive_txid, 0).unwrap(),
    vec![Spend {
      txid: spender_txid,
      vin: 0,
    }],
  );
}

#[test]
fn conflicting_unconfirmed_spends_are_all_reported() {
  let harness = harness();

  let receive = mockchain::coinbase(0, 0, 50_000, script(10));
  let receive_txid = receive.compute_txid();
  harness.chain.push_block(vec![receive]);

  assert!(harness.index.try_resync().unwrap());

  let first = harness
    .chain
    .add_mempool_tx(mockchain::spend(&[(receive_txid, 0)], &[(49_000, script(1))]));
  let second = harness
    .chain
    .add_mempool_tx(mockchain::spend(&[(receive_txid, 0)], &[(48_000, script(2))]));

  harness.index.see(first).unwrap();
  harness.index.see(second).unwrap();

  assert_eq!(
    harness.index.spents_from_txo(receive_txid, 0).unwrap(),
    vec![
      Spend {
        txid: first,
        vin: 0,
      },
      Spend {
        txid: second,
        vin: 0,
      },
    ],
  );
}

#[test]
fn seen_script_survives_confirmation() {
  let harness = harness();

  harness
    .chain
    .push_block(vec![mockchain::coinbase(0, 0, 50_000, script(0))]);
  assert!(harness.index.try_resync().unwrap());

  assert!(!harness.index.seen_script_id(script_id(42)).unwrap());

  let pending = harness
    .chain
    .add_mempool_tx(mockchain::coinbase(99, 9, 1_000, script(42)));
  harness.index.see(pending).unwrap();

  assert!(harness.index.seen_script_id(script_id(42)).unwrap());
  assert_eq!(
    harness.index.txos_by_script_range(&range(42, 0..10), 100).unwrap(),
    vec![Txo {
      txid: pending,
      vout: 0,
      height: None,
      value: 1_000,
    }],
  );

  // Confirm it; the resync empties the shadow and the answer must not
  // change, except that the output now carries its height.
  harness
    .chain
    .push_block(vec![mockchain::coinbase(99, 9, 1_000, script(42))]);
  assert!(harness.index.try_resync().unwrap());

  assert!(harness.index.seen_script_id(script_id(42)).unwrap());
  assert_eq!(
    harness.index.txos_by_script_range(&range(42, 0..10), 100).unwrap(),
    vec![Txo {
      txid: pending,
      vout: 0,
      height: Some(1),
      value: 1_000,
    }],
  );
}

#[test]
fn row_limits_error_rather_than_truncate() {
  let harness = harness();

  // Three outputs to one script spread over two blocks.
  let funding = mockchain::coinbase(0, 0, 1_000, script(7));
  let funding_txid = funding.compute_txid();
  harness.chain.push_block(vec![funding]);
  harness.chain.push_block(vec![
    mockchain::coinbase(1, 0, 1_000, script(7)),
    mockchain::spend(&[(funding_txid, 0)], &[(1, script(7))]),
  ]);

  assert!(harness.index.try_resync().unwrap());

  assert!(matches!(
    harness.index.txos_by_script_range(&range(7, 0..10), 2),
    Err(Error::ExceededLimit { limit: 2 }),
  ));

  assert_eq!(
    harness
      .index
      .txos_by_script_range(&range(7, 0..10), 3)
      .unwrap()
      .len(),
    3,
  );

  // A single-block range cannot be paged further, so its limit is ignored.
  assert_eq!(
    harness
      .index
      .txos_by_script_range(&range(7, 1..2), 1)
      .unwrap()
      .len(),
    2,
  );
}

#[test]
fn fee_snapshots_report_quartiles_and_windows() {
  let harness = harness();

  // Block 0 funds, block 1 fans out fee-free, block 2 carries five spends
  // with exact integral fee rates.
  let seed = mockchain::coinbase(0, 0, 5_000_000, script(0));
  let seed_txid = seed.compute_txid();
  harness.chain.push_block(vec![seed]);

  let funding = mockchain::spend(
    &[(seed_txid, 0)],
    &(0..5)
      .map(|_| (1_000_000, script(1)))
      .collect::<Vec<(u64, ScriptBuf)>>(),
  );
  let funding_txid = funding.compute_txid();
  harness
    .chain
    .push_block(vec![mockchain::coinbase(1, 0, 5_000_000, script(0)), funding]);

  let spends = (0..5)
    .map(|vout| {
      // Fix the fee rate by sizing the output value after measuring the
      // spend; the value field is fixed-width, so resizing it is safe.
      let rate = u64::from(vout + 1) * 10;
      let draft = mockchain::spend(&[(funding_txid, vout)], &[(0, script(2))]);
      let vsize = u64::try_from(draft.vsize()).unwrap();
      mockchain::spend(
        &[(funding_txid, vout)],
        &[(1_000_000 - rate * vsize, script(2))],
      )
    })
    .collect::<Vec<bitcoin::Transaction>>();

  let mut txdata = vec![mockchain::coinbase(2, 0, 5_000_000, script(0))];
  txdata.extend(spends);
  harness.chain.push_block(txdata);

  assert!(harness.index.try_resync().unwrap());

  let snapshots = harness.index.latest_fees_for_n_blocks(2).unwrap();
  assert_eq!(snapshots.len(), 2);

  // Height 1: the coinbase and the fee-free fan-out both rate 0.
  assert_eq!(snapshots[0].height, 1);
  assert_eq!(snapshots[0].fees, FeeBox::default());

  // Height 2: rates [0, 10, 20, 30, 40, 50] including the coinbase.
  assert_eq!(snapshots[1].height, 2);
  assert_eq!(
    snapshots[1].fees,
    FeeBox {
      q1: 10,
      median: 30,
      q3: 40,
    },
  );

  assert_eq!(
    harness.index.latest_fees_for_n_blocks(1).unwrap(),
    vec![snapshots[1]],
  );

  assert_eq!(harness.index.latest_fees_for_n_blocks(0).unwrap(), Vec::new());
}

#[test]
fn txo_lookups_fall_back_to_the_mempool() {
  let harness = harness();

  harness
    .chain
    .push_block(vec![mockchain::coinbase(0, 0, 50_000, script(0))]);
  assert!(harness.index.try_resync().unwrap());

  let pending = harness
    .chain
    .add_mempool_tx(mockchain::coinbase(77, 7, 1_234, script(3)));
  harness.index.see(pending).unwrap();

  let txo = harness.index.txo_by_txo(pending, 0).unwrap().unwrap();
  assert_eq!(txo.value, 1_234);
  assert_eq!(txo.script, script(3));

  assert_eq!(harness.index.txo_by_txo(pending, 1).unwrap(), None);
}

#[test]
fn block_id_by_transaction_id_resolves_through_the_active_chain() {
  let harness = harness();

  let coinbase = mockchain::coinbase(0, 0, 50_000, script(0));
  let confirmed = coinbase.compute_txid();
  let genesis = harness.chain.push_block(vec![coinbase]);

  assert!(harness.index.try_resync().unwrap());

  assert_eq!(
    harness.index.block_id_by_transaction_id(confirmed).unwrap(),
    Some(genesis),
  );

  let pending = harness
    .chain
    .add_mempool_tx(mockchain::coinbase(8, 8, 1, script(4)));
  harness.index.see(pending).unwrap();

  assert_eq!(harness.index.block_id_by_transaction_id(pending).unwrap(), None);
}

#[test]
fn transaction_ids_by_script_range_union_confirmed_and_unconfirmed_spenders() {
  let (harness, receive_txid, spender_txid) = receive_then_spend();

  let mut expected = vec![receive_txid, spender_txid];
  expected.sort();

  assert_eq!(
    harness
      .index
      .transaction_ids_by_script_range(&range(10, 0..200), 100)
      .unwrap(),
    expected,
  );
}
