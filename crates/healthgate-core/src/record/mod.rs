//! Canonical emergency-intervention record and the normalizer that produces it.
//!
//! Field names follow the fixed Italian schema used by the dispatch forms, so
//! a serialized [`ClinicalRecord`] can be handed to downstream tools as is.
//! Every enumerable field is a [`Coded`] value: after vocabulary validation it
//! holds either a canonical code or the empty marker `""`.

pub mod extraction;
pub mod imputation;
pub mod lenient;
pub mod pipeline;
pub mod schema;
pub mod transcription;
pub mod vocab_validation;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::vocabulary::{
    BodyPart, Breathing, Consciousness, ExitCode, InjuryType, PupilSize, ReturnCode, Sex, Skin,
    Vocabulary,
};

pub use pipeline::RecordNormalizer;

// ============================================================================
// Coded values
// ============================================================================

/// An enumerable field: empty, a canonical member, or a raw value awaiting validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Coded<T> {
    Empty,
    Known(T),
    Unmatched(String),
}

impl<T> Default for Coded<T> {
    fn default() -> Self {
        Coded::Empty
    }
}

impl<T: Vocabulary> Coded<T> {
    /// Exact canonical codes only; synonyms are resolved by vocabulary validation.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Coded::Empty;
        }
        match T::from_code(trimmed) {
            Some(member) => Coded::Known(member),
            None => Coded::Unmatched(trimmed.to_string()),
        }
    }

    pub fn known(&self) -> Option<T> {
        match self {
            Coded::Known(member) => Some(*member),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Coded::Empty)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Coded::Empty => "",
            Coded::Known(member) => member.code(),
            Coded::Unmatched(raw) => raw,
        }
    }
}

impl<T: Vocabulary> fmt::Display for Coded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<T: Vocabulary> Serialize for Coded<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de, T: Vocabulary> Deserialize<'de> for Coded<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => Coded::Empty,
            Value::String(s) => Coded::from_raw(&s),
            Value::Number(n) => Coded::from_raw(&n.to_string()),
            other => Coded::Unmatched(other.to_string()),
        })
    }
}

// ============================================================================
// Warnings
// ============================================================================

/// Non-fatal observation about one field of a normalized record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    /// Dotted path, e.g. `rilevazioni[0].coscienza`
    pub field: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub record: ClinicalRecord,
    pub warnings: Vec<ValidationWarning>,
}

// ============================================================================
// Record
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalRecord {
    #[serde(deserialize_with = "lenient::text")]
    pub codice_fiscale: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::integer")]
    pub episodio_numero: Option<u32>,
    #[serde(deserialize_with = "lenient::flag")]
    pub is_ricorrente: Option<bool>,
    #[serde(deserialize_with = "lenient::text_list")]
    pub condizioni_croniche: Vec<String>,
    #[serde(deserialize_with = "lenient::nested")]
    pub chiamata: Chiamata,
    #[serde(deserialize_with = "lenient::nested")]
    pub ambulanza: Ambulanza,
    #[serde(deserialize_with = "lenient::nested")]
    pub autorita_presenti: AutoritaPresenti,
    #[serde(deserialize_with = "lenient::nested")]
    pub dati_paziente: DatiPaziente,
    #[serde(deserialize_with = "lenient::list")]
    pub rilevazioni: Vec<Rilevazione>,
    #[serde(deserialize_with = "lenient::nested")]
    pub pupille: Pupille,
    #[serde(deserialize_with = "lenient::list")]
    pub lesioni: Vec<Lesione>,
    #[serde(deserialize_with = "lenient::nested")]
    pub trasporto_non_effettuato: TrasportoNonEffettuato,
    #[serde(deserialize_with = "lenient::nested")]
    pub provvedimenti: Provvedimenti,
    #[serde(deserialize_with = "lenient::text")]
    pub annotazioni: Option<String>,
}

impl ClinicalRecord {
    /// Top-level keys of the canonical schema.
    pub const FIELDS: &'static [&'static str] = &[
        "codice_fiscale",
        "id",
        "episodio_numero",
        "is_ricorrente",
        "condizioni_croniche",
        "chiamata",
        "ambulanza",
        "autorita_presenti",
        "dati_paziente",
        "rilevazioni",
        "pupille",
        "lesioni",
        "trasporto_non_effettuato",
        "provvedimenti",
        "annotazioni",
    ];

    /// Read any JSON value; non-objects yield an empty record.
    pub fn from_value(value: &Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Free text describing the intervention, used by keyword-driven imputation.
    pub fn narrative(&self) -> String {
        [
            self.annotazioni.as_deref(),
            self.chiamata.condizione_riferita.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chiamata {
    #[serde(deserialize_with = "lenient::text")]
    pub data: Option<String>,
    #[serde(deserialize_with = "lenient::nested")]
    pub orari: Orari,
    #[serde(deserialize_with = "lenient::text")]
    pub luogo_intervento: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub condizione_riferita: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub recapito_telefonico: Option<String>,
    pub codice_uscita: Coded<ExitCode>,
    pub codice_rientro: Coded<ReturnCode>,
}

/// Intervention timeline, `HH:MM`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Orari {
    #[serde(deserialize_with = "lenient::text")]
    pub h_chiamata: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub h_partenza: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub h_arrivo_sul_posto: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub h_partenza_dal_posto: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub h_arrivo_ps: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub h_libero_operativo: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub data_arrivo_ps: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ambulanza {
    #[serde(deserialize_with = "lenient::nested")]
    pub sigla: Sigla,
    #[serde(deserialize_with = "lenient::nested")]
    pub equipaggio: Equipaggio,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sigla {
    #[serde(rename = "CRI", deserialize_with = "lenient::text")]
    pub cri: Option<String>,
    #[serde(rename = "Sel", deserialize_with = "lenient::text")]
    pub sel: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Equipaggio {
    #[serde(deserialize_with = "lenient::text")]
    pub autista: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub soccorritore_1: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub soccorritore_2: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub soccorritore_3: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub infermiere: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub medico: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoritaPresenti {
    #[serde(deserialize_with = "lenient::flag")]
    pub carabinieri: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub polizia_stradale: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub polizia_municipale: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub vigili_del_fuoco: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub guardia_medica: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub altra_ambulanza: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub automedica: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub elisoccorso: Option<bool>,
    #[serde(deserialize_with = "lenient::text")]
    pub altro_descrizione: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatiPaziente {
    #[serde(deserialize_with = "lenient::text")]
    pub cognome_nome: Option<String>,
    pub sesso: Coded<Sex>,
    #[serde(deserialize_with = "lenient::text")]
    pub data_nascita: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub luogo_nascita: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub provincia_nascita: Option<String>,
    #[serde(deserialize_with = "lenient::nested")]
    pub residenza: Residenza,
    #[serde(deserialize_with = "lenient::text")]
    pub telefono: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub fonte_dati: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub fonte_dati_altro: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Residenza {
    #[serde(deserialize_with = "lenient::text")]
    pub citta: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub provincia: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub via: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub numero_civico: Option<String>,
}

/// One vital-sign observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rilevazione {
    #[serde(deserialize_with = "lenient::text")]
    pub tempo: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub ora: Option<String>,
    pub coscienza: Coded<Consciousness>,
    pub cute: Coded<Skin>,
    pub respiro: Coded<Breathing>,
    #[serde(deserialize_with = "lenient::integer")]
    pub spo2_percent: Option<u32>,
    #[serde(deserialize_with = "lenient::integer")]
    pub fc_bpm: Option<u32>,
    #[serde(deserialize_with = "lenient::text")]
    pub pa_mmhg: Option<String>,
    #[serde(deserialize_with = "lenient::integer")]
    pub glicemia_mg_dl: Option<u32>,
    #[serde(deserialize_with = "lenient::decimal")]
    pub temperatura_c: Option<f64>,
    #[serde(deserialize_with = "lenient::nested")]
    pub gcs: Gcs,
}

impl Rilevazione {
    /// Populated fields, not counting the GCS group.
    pub fn populated_fields(&self) -> usize {
        let text = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        [
            text(&self.tempo),
            text(&self.ora),
            !self.coscienza.is_empty(),
            !self.cute.is_empty(),
            !self.respiro.is_empty(),
            self.spo2_percent.is_some(),
            self.fc_bpm.is_some(),
            text(&self.pa_mmhg),
            self.glicemia_mg_dl.is_some(),
            self.temperatura_c.is_some(),
        ]
        .into_iter()
        .filter(|populated| *populated)
        .count()
    }
}

/// Glasgow Coma Scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gcs {
    #[serde(deserialize_with = "lenient::integer")]
    pub apertura_occhi: Option<u8>,
    #[serde(deserialize_with = "lenient::integer")]
    pub risposta_verbale: Option<u8>,
    #[serde(deserialize_with = "lenient::integer")]
    pub risposta_motoria: Option<u8>,
    #[serde(deserialize_with = "lenient::integer")]
    pub totale: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pupille {
    #[serde(deserialize_with = "lenient::flag")]
    pub reagenti: Option<bool>,
    pub dx: Coded<PupilSize>,
    pub sx: Coded<PupilSize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lesione {
    pub parte: Coded<BodyPart>,
    pub tipo: Coded<InjuryType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrasportoNonEffettuato {
    #[serde(deserialize_with = "lenient::text")]
    pub causa: Option<String>,
    #[serde(deserialize_with = "lenient::nested")]
    pub decesso: Decesso,
    #[serde(deserialize_with = "lenient::nested")]
    pub rifiuto: Rifiuto,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Decesso {
    #[serde(deserialize_with = "lenient::flag")]
    pub selezionato: Option<bool>,
    #[serde(deserialize_with = "lenient::text")]
    pub ora_decesso: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub firma_medico: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rifiuto {
    #[serde(deserialize_with = "lenient::flag")]
    pub selezionato: Option<bool>,
    #[serde(deserialize_with = "lenient::text")]
    pub firma_interessato: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Provvedimenti {
    #[serde(deserialize_with = "lenient::nested")]
    pub respiro: ProvvedimentiRespiro,
    #[serde(deserialize_with = "lenient::nested")]
    pub circolo: ProvvedimentiCircolo,
    #[serde(deserialize_with = "lenient::nested")]
    pub immobilizzazione: Immobilizzazione,
    #[serde(deserialize_with = "lenient::nested")]
    pub altro: ProvvedimentiAltro,
    #[serde(deserialize_with = "lenient::text")]
    pub infusioni_farmaci: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvvedimentiRespiro {
    #[serde(deserialize_with = "lenient::flag")]
    pub aspirazione: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub cannula_orofaringea: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub monitor_spo2: Option<bool>,
    #[serde(deserialize_with = "lenient::decimal")]
    pub ossigeno_l_min: Option<f64>,
    #[serde(deserialize_with = "lenient::flag")]
    pub ventilazione: Option<bool>,
    #[serde(deserialize_with = "lenient::integer")]
    pub intubazione_num: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvvedimentiCircolo {
    #[serde(deserialize_with = "lenient::flag")]
    pub emostasi: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub accesso_venoso: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub monitor_ecg: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub monitor_nibp: Option<bool>,
    #[serde(deserialize_with = "lenient::integer")]
    pub mce_min: Option<u32>,
    #[serde(deserialize_with = "lenient::integer")]
    pub dae_num_shock: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Immobilizzazione {
    #[serde(deserialize_with = "lenient::flag")]
    pub collare_cervicale: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub ked: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub barella_cucchiaio: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub tavola_spinale: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub steccobenda: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub materassino_depressione: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvvedimentiAltro {
    #[serde(deserialize_with = "lenient::flag")]
    pub coperta_isotermica: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub medicazione: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub ghiaccio: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub osservazione: Option<bool>,
    #[serde(deserialize_with = "lenient::text")]
    pub custom_1: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub custom_2: Option<String>,
}
