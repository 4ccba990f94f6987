//! Deterministic derived-field imputation.
//!
//! Runs after vocabulary validation. Every rule only fills what is missing,
//! so applying the stage twice gives the same record.

use chrono::{Duration, NaiveTime};
use regex::Regex;
use std::sync::LazyLock;

use super::{ClinicalRecord, Gcs, ValidationWarning};

/// Scene departure assumed after arrival on scene when transport happened.
const SCENE_MINUTES: i64 = 30;
/// Drive from the scene to the emergency department.
const TRANSFER_MINUTES: i64 = 15;

static TRANSPORT_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)trasport").expect("transport regex is valid"));

static NOT_TRANSPORTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bnon\s+(?:\S+\s+){0,2}trasportat").expect("negated transport regex is valid")
});

static HOSPITAL_ARRIVAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:ps|pronto\s+soccorso|ospedale|trasportat[oa])\b")
        .expect("hospital arrival regex is valid")
});

pub fn impute(record: &mut ClinicalRecord, warnings: &mut Vec<ValidationWarning>) {
    drop_sparse_readings(record, warnings);
    impute_timeline(record);
    impute_monitoring(record);
    impute_gcs(record, warnings);
    fill_defaults(record);
}

/// Keep observations with at least two populated fields; a GCS total counts as one.
fn drop_sparse_readings(record: &mut ClinicalRecord, warnings: &mut Vec<ValidationWarning>) {
    let before = record.rilevazioni.len();
    let mut index = 0;
    record.rilevazioni.retain(|reading| {
        let populated = reading.populated_fields() + usize::from(reading.gcs.totale.is_some());
        let keep = populated >= 2;
        if !keep {
            warnings.push(ValidationWarning::new(
                format!("rilevazioni[{}]", index),
                "observation with fewer than two values dropped",
            ));
        }
        index += 1;
        keep
    });

    if record.rilevazioni.len() != before {
        tracing::debug!(
            dropped = before - record.rilevazioni.len(),
            kept = record.rilevazioni.len(),
            "Sparse vital-sign observations dropped"
        );
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn parse_time(value: &Option<String>) -> Option<NaiveTime> {
    let raw = value.as_deref()?.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H.%M"))
        .ok()
}

/// `time` plus `minutes`, wrapping past midnight.
fn shifted(time: NaiveTime, minutes: i64) -> String {
    (time + Duration::minutes(minutes)).format("%H:%M").to_string()
}

fn impute_timeline(record: &mut ClinicalRecord) {
    let narrative = record.narrative();

    let refused_or_deceased = record.trasporto_non_effettuato.rifiuto.selezionato == Some(true)
        || record.trasporto_non_effettuato.decesso.selezionato == Some(true);
    let transported = TRANSPORT_MENTION.is_match(&narrative)
        && !NOT_TRANSPORTED.is_match(&narrative)
        && !refused_or_deceased;

    let orari = &mut record.chiamata.orari;

    if is_blank(&orari.h_partenza) && !is_blank(&orari.h_arrivo_sul_posto) {
        orari.h_partenza = orari.h_arrivo_sul_posto.clone();
    }

    if transported && is_blank(&orari.h_partenza_dal_posto) {
        if let Some(arrival) = parse_time(&orari.h_arrivo_sul_posto) {
            orari.h_partenza_dal_posto = Some(shifted(arrival, SCENE_MINUTES));
        }
    }

    let reached_hospital = HOSPITAL_ARRIVAL.is_match(&narrative) && !refused_or_deceased;
    if reached_hospital && is_blank(&orari.h_arrivo_ps) {
        if let Some(departure) = parse_time(&orari.h_partenza_dal_posto) {
            orari.h_arrivo_ps = Some(shifted(departure, TRANSFER_MINUTES));
        }
    }
}

/// Recorded vitals imply the monitor that measured them.
fn impute_monitoring(record: &mut ClinicalRecord) {
    let readings = &record.rilevazioni;
    if readings.iter().any(|r| r.spo2_percent.is_some()) {
        record.provvedimenti.respiro.monitor_spo2 = Some(true);
    }
    if readings.iter().any(|r| r.fc_bpm.is_some()) {
        record.provvedimenti.circolo.monitor_ecg = Some(true);
    }
    if readings.iter().any(|r| !is_blank(&r.pa_mmhg)) {
        record.provvedimenti.circolo.monitor_nibp = Some(true);
    }
}

/// Eye/verbal/motor sub-scores for a total, following the field banding table.
pub fn gcs_bands(total: u8) -> Option<(u8, u8, u8)> {
    match total {
        15 => Some((4, 5, 6)),
        13 | 14 => Some((4, if total == 13 { 4 } else { 5 }, if total == 13 { 5 } else { 6 })),
        9..=12 => Some((3, 3, total - 6)),
        3..=8 => Some((
            if total > 6 { 2 } else { 1 },
            if total > 4 { 2 } else { 1 },
            total.saturating_sub(4).max(1),
        )),
        _ => None,
    }
}

fn impute_gcs(record: &mut ClinicalRecord, warnings: &mut Vec<ValidationWarning>) {
    for (i, reading) in record.rilevazioni.iter_mut().enumerate() {
        let gcs: &mut Gcs = &mut reading.gcs;
        let Some(total) = gcs.totale else {
            continue;
        };
        let subs = [gcs.apertura_occhi, gcs.risposta_verbale, gcs.risposta_motoria];

        if subs.iter().all(Option::is_none) {
            match gcs_bands(total) {
                Some((eyes, verbal, motor)) => {
                    gcs.apertura_occhi = Some(eyes);
                    gcs.risposta_verbale = Some(verbal);
                    gcs.risposta_motoria = Some(motor);
                }
                None => warnings.push(ValidationWarning::new(
                    format!("rilevazioni[{}].gcs.totale", i),
                    format!("GCS total {} outside 3-15, sub-scores not imputed", total),
                )),
            }
        } else if let [Some(eyes), Some(verbal), Some(motor)] = subs {
            // The banding table does not always add up; its own output is consistent.
            if gcs_bands(total) == Some((eyes, verbal, motor)) {
                continue;
            }
            let sum = u16::from(eyes) + u16::from(verbal) + u16::from(motor);
            if sum != u16::from(total) {
                warnings.push(ValidationWarning::new(
                    format!("rilevazioni[{}].gcs", i),
                    format!("GCS sub-scores add up to {} but total is {}", sum, total),
                ));
            }
        }
    }
}

fn fill_defaults(record: &mut ClinicalRecord) {
    fn empty_if_missing(value: &mut Option<String>) {
        if value.is_none() {
            *value = Some(String::new());
        }
    }

    let crew = &mut record.ambulanza.equipaggio;
    for field in [
        &mut crew.infermiere,
        &mut crew.soccorritore_1,
        &mut crew.soccorritore_2,
        &mut crew.soccorritore_3,
    ] {
        empty_if_missing(field);
    }

    let sigla = &mut record.ambulanza.sigla;
    empty_if_missing(&mut sigla.cri);
    empty_if_missing(&mut sigla.sel);

    empty_if_missing(&mut record.chiamata.recapito_telefonico);
    let orari = &mut record.chiamata.orari;
    empty_if_missing(&mut orari.h_libero_operativo);
    empty_if_missing(&mut orari.data_arrivo_ps);
    empty_if_missing(&mut orari.h_partenza_dal_posto);

    let patient = &mut record.dati_paziente;
    empty_if_missing(&mut patient.telefono);
    empty_if_missing(&mut patient.fonte_dati);
    empty_if_missing(&mut patient.provincia_nascita);
    empty_if_missing(&mut patient.residenza.provincia);

    empty_if_missing(&mut record.autorita_presenti.altro_descrizione);

    let not_transported = &mut record.trasporto_non_effettuato;
    empty_if_missing(&mut not_transported.causa);
    empty_if_missing(&mut not_transported.decesso.ora_decesso);
    empty_if_missing(&mut not_transported.decesso.firma_medico);
    empty_if_missing(&mut not_transported.rifiuto.firma_interessato);

    record.episodio_numero.get_or_insert(1);
    record.pupille.reagenti.get_or_insert(false);
}
