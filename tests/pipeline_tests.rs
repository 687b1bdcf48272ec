#[cfg(test)]
mod pipeline_tests {
    use std::fs;
    use std::path::Path;

    use chrono::DateTime;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    use txflow::analysis::pipeline::analyze_records;
    use txflow::analysis::{
        aggregate, analyze_address, analyze_batch, build_timeline, cluster, load_document, normalize_all, rank,
        replay_timeline, write_document, AnalysisError, AnalysisSettings, CanonicalTransaction, FixedClock,
        JsonDirSource, Likelihood, TxInput, TxOutput,
    };

    const TARGET: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";
    const PEER_B: &str = "3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy";
    const PEER_C: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";

    fn clock() -> FixedClock {
        FixedClock(DateTime::from_timestamp(1_750_000_000, 0).unwrap())
    }

    fn raw(txid: &str, time: Option<i64>, ins: &[(&str, u64)], outs: &[(&str, u64)]) -> Value {
        let status = match time {
            Some(t) => json!({ "confirmed": true, "block_time": t }),
            None => json!({ "confirmed": false }),
        };
        json!({
            "txid": txid,
            "status": status,
            "fee": 250,
            "vin": ins.iter().map(|(a, v)| json!({ "prevout": { "scriptpubkey_address": a, "value": v } })).collect::<Vec<_>>(),
            "vout": outs.iter().map(|(a, v)| json!({ "scriptpubkey_address": a, "value": v })).collect::<Vec<_>>(),
        })
    }

    fn history() -> Vec<Value> {
        vec![
            raw("t1", Some(1_704_067_200), &[(PEER_B, 900_000)], &[(TARGET, 500_000), (PEER_B, 399_750)]),
            raw("t2", Some(1_706_745_600), &[(TARGET, 500_000)], &[(PEER_C, 200_000), (TARGET, 299_750)]),
            raw("t3", Some(1_709_251_200), &[(PEER_C, 100_250)], &[(TARGET, 100_000)]),
            raw("t4", None, &[(TARGET, 50_000)], &[(PEER_B, 49_750)]),
        ]
    }

    fn write_fixture(dir: &Path, rel: &str, value: &Value) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    }

    fn canonical(txid: &str, time: i64, ins: &[&str], outs: &[&str]) -> CanonicalTransaction {
        CanonicalTransaction {
            id: txid.to_string(),
            confirmed: true,
            block_time: Some(time),
            fee: 0,
            inputs: ins
                .iter()
                .map(|a| TxInput { source_address: Some(a.to_string()), value: 1 })
                .collect(),
            outputs: outs
                .iter()
                .map(|a| TxOutput { destination_address: Some(a.to_string()), value: 1 })
                .collect(),
        }
    }

    /// Target net from the aggregator matches the timeline's summed net
    #[test]
    fn test_aggregator_and_timeline_agree() {
        let confirmed: Vec<Value> = history().into_iter().take(3).collect();
        let txs = normalize_all(&confirmed).transactions;

        let flows = aggregate(TARGET, &txs, &clock());
        let timeline = build_timeline(TARGET, &txs);

        let target = flows.target_flow();
        let aggregated_net = target.total_received_sat as i64 - target.total_sent_sat as i64;
        let timeline_net: i64 = timeline.transactions.iter().map(|p| p.net_amount_satoshis).sum();

        assert_eq!(aggregated_net, timeline_net);
        assert_eq!(
            timeline.transactions.last().unwrap().running_balance_satoshis,
            aggregated_net
        );
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let txs = normalize_all(&history()).transactions;
        let first = aggregate(TARGET, &txs, &clock());
        let second = aggregate(TARGET, &txs, &clock());
        assert_eq!(first.flows, second.flows);
    }

    #[test]
    fn test_appending_never_decreases_counts() {
        let txs = normalize_all(&history()).transactions;
        for n in 1..txs.len() {
            let before = aggregate(TARGET, &txs[..n], &clock());
            let after = aggregate(TARGET, &txs[..=n], &clock());
            for (address, flow) in &before.flows {
                assert!(after.flows[address].transaction_count >= flow.transaction_count);
            }
        }
    }

    #[test]
    fn test_clustering_links_only_to_target() {
        let graph = cluster("A", &[canonical("t", 0, &["A", "B"], &["C"])]);

        assert_eq!(graph.edge("B").unwrap().connection_count, 1);
        assert_eq!(graph.edge("C").unwrap().connection_count, 1);
        assert!(graph.edges.iter().all(|e| e.address != "A" && e.connection_count >= 1));
        // Only target-rooted edges exist, so no B–C edge can appear
        assert_eq!(graph.edges.len(), 2);
    }

    #[test]
    fn test_likelihood_boundaries_through_cluster() {
        let mut txs = Vec::new();
        for i in 0..6 {
            txs.push(canonical(&format!("h{}", i), i, &["A"], &["H"]));
        }
        for i in 0..5 {
            txs.push(canonical(&format!("m{}", i), i, &["A"], &["M"]));
        }
        for i in 0..2 {
            txs.push(canonical(&format!("l{}", i), i, &["A"], &["L"]));
        }
        let graph = cluster("A", &txs);
        assert_eq!(graph.edge("H").unwrap().likelihood, Likelihood::High);
        assert_eq!(graph.edge("M").unwrap().likelihood, Likelihood::Medium);
        assert_eq!(graph.edge("L").unwrap().likelihood, Likelihood::Low);
    }

    #[test]
    fn test_ranking_properties() {
        let txs = normalize_all(&history()).transactions;
        let ranking = rank(&aggregate(TARGET, &txs, &clock()).flows);
        for list in [&ranking.top_senders, &ranking.top_receivers] {
            assert!(list.len() <= 10);
            assert!(list.iter().all(|e| e.amount_satoshis > 0));
            assert!(list.windows(2).all(|w| w[0].amount_satoshis > w[1].amount_satoshis));
        }
    }

    #[test]
    fn test_analyze_address_from_mirror() {
        let dir = TempDir::new().unwrap();
        write_fixture(
            dir.path(),
            &format!("address/{}/txs.json", TARGET),
            &Value::Array(history()),
        );

        let source = JsonDirSource::new(dir.path());
        let doc = analyze_address(TARGET, &source, &AnalysisSettings::default(), &clock()).unwrap();

        assert_eq!(doc.all_transactions.len(), 4);
        assert_eq!(doc.transaction_timeline.transactions.len(), 3);
        assert_eq!(doc.fallbacks.timestamp_fallback.applied, 1);
        assert_eq!(doc.clustering_analysis.related_addresses.len(), 2);
        assert_eq!(doc.metadata.address, TARGET);
        assert_eq!(doc.metadata.api_source, "https://blockstream.info/api");

        let months = &doc.transaction_timeline.summary_stats.monthly_activity;
        assert_eq!(months.keys().collect::<Vec<_>>(), vec!["2024-01", "2024-02", "2024-03"]);
    }

    #[test]
    fn test_shallow_records_use_detail() {
        let dir = TempDir::new().unwrap();
        let s1 = "5".repeat(64);
        let shallow = json!({
            "txid": s1,
            "status": { "confirmed": true, "block_time": 1_704_067_200 },
            "vin": [{ "txid": "prev", "vout": 0 }],
            "vout": [{ "scriptpubkey_address": TARGET, "value": 1_000 }]
        });
        write_fixture(dir.path(), &format!("address/{}/txs.json", TARGET), &json!([shallow]));
        write_fixture(
            dir.path(),
            &format!("tx/{}.json", s1),
            &raw(&s1, Some(1_704_067_200), &[(PEER_B, 1_250)], &[(TARGET, 1_000)]),
        );

        let source = JsonDirSource::new(dir.path());
        let doc = analyze_address(TARGET, &source, &AnalysisSettings::default(), &clock()).unwrap();
        assert_eq!(doc.clustering_analysis.related_addresses, vec![PEER_B.to_string()]);
        assert_eq!(doc.top_counterparties.top_senders[0].address, PEER_B);
    }

    #[test]
    fn test_oversized_amounts_are_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let mut records = history();
        records.push(raw("huge", Some(1_704_067_300), &[(PEER_B, 1)], &[(TARGET, u64::MAX), (TARGET, 1)]));
        records.push(raw("over", Some(1_704_067_400), &[(PEER_B, 1)], &[(TARGET, 9_300_000_000_000_000_000)]));
        write_fixture(dir.path(), &format!("address/{}/txs.json", TARGET), &Value::Array(records));

        let addresses = vec![TARGET.to_string(), PEER_C.to_string()];
        let source = JsonDirSource::new(dir.path());
        let results = analyze_batch(&addresses, &source, &AnalysisSettings::default(), &clock());

        let doc = results[0].1.as_ref().unwrap();
        assert_eq!(doc.all_transactions.len(), 4);
        assert_eq!(doc.fallbacks.skipped_records, 2);
        assert!(doc.transaction_timeline.transactions.iter().all(|p| p.txid != "over"));
        let target = &doc.address_flows[TARGET];
        assert_eq!(target.total_received_sat, 500_000 + 299_750 + 100_000);
        assert!(matches!(&results[1].1, Err(e) if e.is_empty_result()));
    }

    #[test]
    fn test_confirmed_record_with_unparseable_time_stays_untimed() {
        let mut records = history();
        records.truncate(3);
        let mut garbled = raw("t5", None, &[(PEER_C, 10_250)], &[(TARGET, 10_000)]);
        garbled["status"] = json!({ "confirmed": true });
        garbled["date"] = json!("garbage");
        records.push(garbled);

        let doc = analyze_records(TARGET, &records, None, &AnalysisSettings::default(), &clock()).unwrap();

        let kept = doc.all_transactions.iter().find(|tx| tx.id == "t5").unwrap();
        assert!(kept.confirmed);
        assert_eq!(kept.block_time, None);
        assert_eq!(doc.volume_totals.transaction_count, 4);
        assert_eq!(doc.transaction_timeline.transactions.len(), 3);
        assert!(doc.transaction_timeline.transactions.iter().all(|p| p.txid != "t5"));
        assert_eq!(doc.fallbacks.timestamp_fallback.applied, 1);
        assert_eq!(doc.address_flows[TARGET].last_seen, Some(clock().0));
    }

    #[test]
    fn test_batch_failures_are_isolated() {
        let dir = TempDir::new().unwrap();
        write_fixture(dir.path(), &format!("address/{}/txs.json", TARGET), &Value::Array(history()));
        // Corrupt history for one address, nothing at all for another
        fs::create_dir_all(dir.path().join(format!("address/{}", PEER_B))).unwrap();
        fs::write(dir.path().join(format!("address/{}/txs.json", PEER_B)), "[{ broken").unwrap();

        let addresses = vec![PEER_B.to_string(), TARGET.to_string(), PEER_C.to_string()];
        let source = JsonDirSource::new(dir.path());
        let results = analyze_batch(&addresses, &source, &AnalysisSettings::default(), &clock());

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, PEER_B);
        assert!(matches!(results[0].1, Err(AnalysisError::Source { .. })));
        assert!(results[1].1.is_ok());
        assert!(matches!(&results[2].1, Err(e) if e.is_empty_result()));
    }

    #[test]
    fn test_document_persists_historical_field_names() {
        let dir = TempDir::new().unwrap();
        write_fixture(dir.path(), &format!("address/{}/txs.json", TARGET), &Value::Array(history()));
        let source = JsonDirSource::new(dir.path());
        let doc = analyze_address(TARGET, &source, &AnalysisSettings::default(), &clock()).unwrap();

        let out = dir.path().join("reports");
        let path = write_document(&doc, &out).unwrap();
        assert_eq!(path.file_name().unwrap(), "bitcoin_analysis_1A1zP1eP.json");

        let value: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        for field in [
            "address_stats",
            "recent_transactions",
            "all_transactions",
            "clustering_analysis",
            "network_graph",
            "transaction_timeline",
        ] {
            assert!(value.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(value["metadata"]["address"], TARGET);
        assert!(value["transaction_timeline"]["summary_stats"]["date_range"]["earliest"].is_string());
        assert_eq!(value["network_graph"]["nodes"][0]["type"], "main");

        assert_eq!(load_document(&path).unwrap(), doc);

        // The persisted timeline replays to the same final balance
        let replayed = replay_timeline(&value["transaction_timeline"]).unwrap();
        let last = doc.transaction_timeline.transactions.last().unwrap();
        assert!((replayed.points.last().unwrap().balance_btc - last.running_balance_btc).abs() < 1e-9);
        assert_eq!(replayed.dropped_entries, 0);
    }
}
