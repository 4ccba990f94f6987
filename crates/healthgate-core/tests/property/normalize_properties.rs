use std::sync::Arc;
use std::time::Duration;

use healthgate_core::config::{NormalizerConfig, RetrievalConfig};
use healthgate_core::rag::{RetrievalCache, RetrievalEngine};
use healthgate_core::record::imputation::gcs_bands;
use healthgate_core::record::pipeline::validate_and_impute;
use healthgate_core::record::RecordNormalizer;
use healthgate_core::services::mock::{MockGenerationService, StaticSearch, TableScorer};
use healthgate_core::services::{CallPolicy, RetryPolicy};
use healthgate_core::triage::ConsensusResolver;
use healthgate_core::{Decision, DecisionCandidate};
use proptest::prelude::*;
use proptest::sample::select;
use serde_json::{json, Value};

fn arb_time() -> impl Strategy<Value = Option<String>> {
    prop::option::of((0u32..24, 0u32..60).prop_map(|(h, m)| format!("{:02}:{:02}", h, m)))
}

fn arb_reading() -> impl Strategy<Value = Value> {
    (
        arb_time(),
        select(vec!["A", "vigile", "risponde al dolore", "boh", ""]),
        select(vec!["normale", "pallida", "grigiastra", ""]),
        prop::option::of(70u32..100),
        prop::option::of(40u32..160),
        prop::option::of(0u8..20),
    )
        .prop_map(|(ora, coscienza, cute, spo2, fc, totale)| {
            json!({
                "ora": ora,
                "coscienza": coscienza,
                "cute": cute,
                "spo2_percent": spo2,
                "fc_bpm": fc,
                "gcs": {"totale": totale}
            })
        })
}

fn arb_injury() -> impl Strategy<Value = Value> {
    (
        select(vec!["Testa", "braccio sinistro", "caviglia destra", "gomito", ""]),
        select(vec!["B", "frattura", "ustione", "graffio", ""]),
    )
        .prop_map(|(parte, tipo)| json!({"parte": parte, "tipo": tipo}))
}

fn arb_document() -> impl Strategy<Value = Value> {
    (
        arb_time(),
        select(vec![
            "paziente trasportato in PS",
            "rifiuta il trasporto",
            "trattato sul posto",
            "",
        ]),
        select(vec!["R", "giallo", "codice verde", "arancione", ""]),
        select(vec!["M", "donna", "maschio", "?", ""]),
        prop::collection::vec(arb_reading(), 0..4),
        prop::collection::vec(arb_injury(), 0..3),
    )
        .prop_map(|(arrival, notes, exit, sex, readings, injuries)| {
            json!({
                "chiamata": {
                    "orari": {"h_arrivo_sul_posto": arrival},
                    "codice_uscita": exit
                },
                "dati_paziente": {"sesso": sex},
                "rilevazioni": readings,
                "lesioni": injuries,
                "annotazioni": notes
            })
        })
}

fn arb_decision() -> impl Strategy<Value = Decision> {
    prop_oneof![
        Just(Decision::CareRequired),
        Just(Decision::CareNotRequired),
        Just(Decision::ConsultClinician),
    ]
}

fn offline_normalizer() -> RecordNormalizer {
    RecordNormalizer::new(
        Arc::new(MockGenerationService::failing()),
        &NormalizerConfig::default(),
        CallPolicy {
            timeout: Duration::from_secs(1),
            retry: RetryPolicy::none(),
        },
    )
}

// ── Deterministic record stages ────────────────────────────────────────────

proptest! {
    #[test]
    fn validation_and_imputation_are_idempotent(document in arb_document()) {
        let first = validate_and_impute(&document);
        let second = validate_and_impute(&first.record.to_value());
        prop_assert_eq!(&first.record, &second.record);
    }

    #[test]
    fn normalized_records_hold_only_canonical_codes(document in arb_document()) {
        let result = validate_and_impute(&document);
        let record = result.record;

        prop_assert!(matches!(record.chiamata.codice_uscita.as_str(), "" | "B" | "V" | "G" | "R"));
        prop_assert!(matches!(record.dati_paziente.sesso.as_str(), "" | "M" | "F"));
        for reading in &record.rilevazioni {
            prop_assert!(reading.populated_fields() + usize::from(reading.gcs.totale.is_some()) >= 2);
            prop_assert!(matches!(reading.coscienza.as_str(), "" | "A" | "V" | "P" | "U"));
        }
        for injury in &record.lesioni {
            prop_assert!(!(injury.parte.is_empty() && injury.tipo.is_empty()));
        }
        prop_assert_eq!(record.episodio_numero, Some(1));
    }

    #[test]
    fn gcs_bands_follow_the_banding_table(total in 3u8..=15) {
        let (eyes, verbal, motor) = gcs_bands(total).unwrap();
        let expected = match total {
            15 | 14 => (4, 5, 6),
            13 => (4, 4, 5),
            9..=12 => (3, 3, total - 6),
            7 | 8 => (2, 2, total - 4),
            5 | 6 => (1, 2, total - 4),
            _ => (1, 1, 1),
        };
        prop_assert_eq!((eyes, verbal, motor), expected);
        prop_assert!((1..=4).contains(&eyes));
        prop_assert!((1..=5).contains(&verbal));
        prop_assert!((1..=6).contains(&motor));
    }

    #[test]
    fn imputed_gcs_survives_a_second_pass_without_warnings(total in 3u8..=15) {
        let document = json!({"rilevazioni": [{"ora": "10:00", "gcs": {"totale": total}}]});
        let first = validate_and_impute(&document);
        let second = validate_and_impute(&first.record.to_value());
        prop_assert!(first.warnings.is_empty(), "{:?}", first.warnings);
        prop_assert!(second.warnings.is_empty(), "{:?}", second.warnings);
        prop_assert_eq!(&first.record, &second.record);
    }

    #[test]
    fn gcs_bands_reject_out_of_range(total in prop_oneof![0u8..3, 16u8..=255]) {
        prop_assert!(gcs_bands(total).is_none());
    }
}

// ── Offline normalizer equals the deterministic stages ────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn offline_normalize_matches_deterministic_stages(document in arb_document()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let normalized = runtime.block_on(offline_normalizer().normalize(&document));
        let expected = validate_and_impute(&document);
        prop_assert_eq!(normalized, expected);
    }
}

// ── Consensus ──────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn consensus_confidence_is_one_of_the_fixed_levels(
        decisions in prop::collection::vec(arb_decision(), 0..6)
    ) {
        let candidates: Vec<DecisionCandidate> = decisions
            .iter()
            .map(|d| DecisionCandidate::new(*d, "motivazione"))
            .collect();
        let decision = ConsensusResolver::default().resolve(&candidates);

        prop_assert!([0.0f32, 0.5, 0.6, 0.9].contains(&decision.confidence));
        if candidates.is_empty() {
            prop_assert_eq!(decision.decision, Decision::ConsultClinician);
        } else {
            prop_assert!(decisions.contains(&decision.decision));
        }

        let care_votes = decisions.iter().filter(|d| **d == Decision::CareRequired).count();
        if care_votes >= 2 {
            prop_assert_eq!(decision.decision, Decision::CareRequired);
        }
    }
}

// ── Retrieval threshold ────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn retrieval_keeps_only_scores_above_threshold(
        scores in prop::collection::vec(0.0f32..1.0, 1..10),
        threshold in 0.0f32..1.0,
        k in 1usize..8,
    ) {
        let contents: Vec<String> = (0..scores.len()).map(|i| format!("linea guida {}", i)).collect();
        let pairs: Vec<(&str, &str)> = contents.iter().map(|c| (c.as_str(), "protocollo.pdf")).collect();
        let scorer = contents
            .iter()
            .zip(&scores)
            .fold(TableScorer::new(0.0), |scorer, (content, score)| scorer.with_score(content.clone(), *score));

        let engine = RetrievalEngine::new(
            Arc::new(StaticSearch::from_pairs(&pairs)),
            Arc::new(scorer),
            Arc::new(RetrievalCache::new()),
            &RetrievalConfig::default(),
        );

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let excerpts = runtime.block_on(engine.retrieve("dolore toracico", k, threshold));

        let above = scores.iter().filter(|s| **s > threshold).count();
        prop_assert_eq!(excerpts.len(), above.min(k));
        prop_assert!(excerpts.iter().all(|e| e.relevance_score > threshold));
        prop_assert!(excerpts.windows(2).all(|w| w[0].relevance_score >= w[1].relevance_score));
    }
}
