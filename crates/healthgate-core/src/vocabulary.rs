//! Controlled vocabulary for the enumerable fields of an emergency record.
//!
//! Every enumeration exposes its canonical codes through [`Vocabulary`], and
//! knows how to map the free-form phrasing produced by speech transcription or
//! by a language model ("paziente vigile", "codice rosso", "avambraccio
//! sinistro") onto exactly one canonical code.

use serde::{Deserialize, Serialize};

/// A closed set of canonical codes for one record field.
pub trait Vocabulary: Sized + Copy + PartialEq + std::fmt::Debug + 'static {
    /// Every member, in declaration order.
    const ALL: &'static [Self];

    /// Canonical code as it appears in a normalized record.
    fn code(&self) -> &'static str;

    /// Map a non-canonical phrasing onto a member.
    fn synonym_match(raw: &str) -> Option<Self>;

    /// Exact canonical code match, ignoring case and surrounding whitespace.
    fn from_code(raw: &str) -> Option<Self> {
        let needle = raw.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        Self::ALL
            .iter()
            .copied()
            .find(|member| member.code().to_lowercase() == needle)
    }

    /// Canonical code first, then synonyms.
    fn parse(raw: &str) -> Option<Self> {
        Self::from_code(raw).or_else(|| Self::synonym_match(raw))
    }
}

/// First group whose keywords appear anywhere in `haystack`.
fn first_containing<T: Copy>(haystack: &str, table: &[(T, &[&str])]) -> Option<T> {
    table
        .iter()
        .find(|(_, words)| words.iter().any(|w| haystack.contains(w)))
        .map(|(member, _)| *member)
}

// ============================================================================
// Patient sex
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M", alias = "m")]
    Male,
    #[serde(rename = "F", alias = "f")]
    Female,
}

impl Vocabulary for Sex {
    const ALL: &'static [Self] = &[Sex::Male, Sex::Female];

    fn code(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
        }
    }

    fn synonym_match(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "maschio" | "uomo" | "m" | "male" | "maschile" => Some(Sex::Male),
            "femmina" | "donna" | "f" | "female" | "femminile" => Some(Sex::Female),
            _ => None,
        }
    }
}

// ============================================================================
// Vital-sign observations
// ============================================================================

/// AVPU consciousness scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Consciousness {
    Alert,
    Voice,
    Pain,
    Unresponsive,
}

impl Vocabulary for Consciousness {
    const ALL: &'static [Self] = &[
        Consciousness::Alert,
        Consciousness::Voice,
        Consciousness::Pain,
        Consciousness::Unresponsive,
    ];

    fn code(&self) -> &'static str {
        match self {
            Consciousness::Alert => "A",
            Consciousness::Voice => "V",
            Consciousness::Pain => "P",
            Consciousness::Unresponsive => "U",
        }
    }

    fn synonym_match(raw: &str) -> Option<Self> {
        // "incosciente" and "non vigile" contain alert words: unresponsive must be checked first.
        const TABLE: &[(Consciousness, &[&str])] = &[
            (
                Consciousness::Unresponsive,
                &[
                    "incosciente",
                    "non cosciente",
                    "non vigile",
                    "non sveglio",
                    "non sveglia",
                    "unresponsive",
                    "non responsivo",
                    "non risponde",
                ],
            ),
            (
                Consciousness::Alert,
                &["sveglio", "sveglia", "alert", "cosciente", "vigile"],
            ),
            (Consciousness::Voice, &["voce", "voice", "verbale"]),
            (Consciousness::Pain, &["dolore", "pain", "doloros"]),
        ];
        first_containing(&raw.to_lowercase(), TABLE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Skin {
    Normal,
    Pale,
    Cyanotic,
    Sweaty,
}

impl Vocabulary for Skin {
    const ALL: &'static [Self] = &[Skin::Normal, Skin::Pale, Skin::Cyanotic, Skin::Sweaty];

    fn code(&self) -> &'static str {
        match self {
            Skin::Normal => "normale",
            Skin::Pale => "pallida",
            Skin::Cyanotic => "cianotica",
            Skin::Sweaty => "sudata",
        }
    }

    fn synonym_match(raw: &str) -> Option<Self> {
        const TABLE: &[(Skin, &[&str])] = &[
            (Skin::Pale, &["pallid", "pale"]),
            (Skin::Cyanotic, &["cianotic", "cyanotic", "blu"]),
            (Skin::Sweaty, &["sudat", "sudorazione", "umida", "sweat"]),
            (Skin::Normal, &["normale", "rosea", "normal"]),
        ];
        first_containing(&raw.to_lowercase(), TABLE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Breathing {
    Normal,
    Tachypneic,
    Bradypneic,
    Absent,
}

impl Vocabulary for Breathing {
    const ALL: &'static [Self] = &[
        Breathing::Normal,
        Breathing::Tachypneic,
        Breathing::Bradypneic,
        Breathing::Absent,
    ];

    fn code(&self) -> &'static str {
        match self {
            Breathing::Normal => "normale",
            Breathing::Tachypneic => "tachipnoico",
            Breathing::Bradypneic => "bradipnoico",
            Breathing::Absent => "assente",
        }
    }

    fn synonym_match(raw: &str) -> Option<Self> {
        const TABLE: &[(Breathing, &[&str])] = &[
            (Breathing::Absent, &["assente", "apnea", "absent"]),
            (Breathing::Tachypneic, &["tachipnoic", "tachipnea", "rapido", "veloce"]),
            (Breathing::Bradypneic, &["bradipnoic", "bradipnea", "lento"]),
            (Breathing::Normal, &["normale", "regolare", "regular", "eupnoic"]),
        ];
        first_containing(&raw.to_lowercase(), TABLE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PupilSize {
    Small,
    Medium,
    Large,
}

impl Vocabulary for PupilSize {
    const ALL: &'static [Self] = &[PupilSize::Small, PupilSize::Medium, PupilSize::Large];

    fn code(&self) -> &'static str {
        match self {
            PupilSize::Small => "piccola",
            PupilSize::Medium => "media",
            PupilSize::Large => "grande",
        }
    }

    fn synonym_match(raw: &str) -> Option<Self> {
        const TABLE: &[(PupilSize, &[&str])] = &[
            (PupilSize::Small, &["piccol", "small", "miotic", "miosi"]),
            (PupilSize::Large, &["grand", "large", "midriatic", "midriasi", "dilatat"]),
            (PupilSize::Medium, &["medi", "medium", "normal"]),
        ];
        first_containing(&raw.to_lowercase(), TABLE)
    }
}

// ============================================================================
// Dispatch codes
// ============================================================================

/// Colour code assigned when the crew leaves for the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitCode {
    White,
    Green,
    Yellow,
    Red,
}

impl Vocabulary for ExitCode {
    const ALL: &'static [Self] = &[ExitCode::White, ExitCode::Green, ExitCode::Yellow, ExitCode::Red];

    fn code(&self) -> &'static str {
        match self {
            ExitCode::White => "B",
            ExitCode::Green => "V",
            ExitCode::Yellow => "G",
            ExitCode::Red => "R",
        }
    }

    fn synonym_match(raw: &str) -> Option<Self> {
        let upper = raw.to_uppercase();
        upper
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .find_map(|word| match word {
                "B" | "BIANCO" | "WHITE" => Some(ExitCode::White),
                "V" | "VERDE" | "GREEN" => Some(ExitCode::Green),
                "G" | "GIALLO" | "YELLOW" => Some(ExitCode::Yellow),
                "R" | "ROSSO" | "RED" => Some(ExitCode::Red),
                _ => None,
            })
    }
}

/// Code assigned on the way back, from "no transport needed" to "critical".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    NotNeeded,
    NotTransported,
    NonUrgent,
    Urgent,
    Critical,
}

impl Vocabulary for ReturnCode {
    const ALL: &'static [Self] = &[
        ReturnCode::NotNeeded,
        ReturnCode::NotTransported,
        ReturnCode::NonUrgent,
        ReturnCode::Urgent,
        ReturnCode::Critical,
    ];

    fn code(&self) -> &'static str {
        match self {
            ReturnCode::NotNeeded => "0",
            ReturnCode::NotTransported => "1",
            ReturnCode::NonUrgent => "2",
            ReturnCode::Urgent => "3",
            ReturnCode::Critical => "4",
        }
    }

    fn synonym_match(raw: &str) -> Option<Self> {
        // Negated phrases first, "non urgente" also contains "urgente".
        const TABLE: &[(ReturnCode, &[&str])] = &[
            (ReturnCode::NotNeeded, &["non necessario"]),
            (ReturnCode::NotTransported, &["non trasportato"]),
            (ReturnCode::NonUrgent, &["non urgente"]),
            (ReturnCode::Urgent, &["urgente"]),
        ];
        let phrase = raw.to_lowercase();
        first_containing(&phrase, TABLE).or_else(|| {
            ["critico", "critica"]
                .iter()
                .any(|word| mentions_unnegated(&phrase, word))
                .then_some(ReturnCode::Critical)
        })
    }
}

/// `word` appears as a whole word not directly preceded by "non".
fn mentions_unnegated(phrase: &str, word: &str) -> bool {
    let words: Vec<&str> = phrase
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    words
        .iter()
        .enumerate()
        .any(|(i, w)| *w == word && (i == 0 || words[i - 1] != "non"))
}

// ============================================================================
// Injuries
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyPart {
    Head,
    Neck,
    LeftArm,
    RightArm,
    LeftForearm,
    RightForearm,
    LeftHand,
    RightHand,
    Chest,
    Abdomen,
    Back,
    Pelvis,
    LeftThigh,
    RightThigh,
    LeftLeg,
    RightLeg,
    LeftFoot,
    RightFoot,
    LeftAnkle,
    RightAnkle,
}

impl Vocabulary for BodyPart {
    const ALL: &'static [Self] = &[
        BodyPart::Head,
        BodyPart::Neck,
        BodyPart::LeftArm,
        BodyPart::RightArm,
        BodyPart::LeftForearm,
        BodyPart::RightForearm,
        BodyPart::LeftHand,
        BodyPart::RightHand,
        BodyPart::Chest,
        BodyPart::Abdomen,
        BodyPart::Back,
        BodyPart::Pelvis,
        BodyPart::LeftThigh,
        BodyPart::RightThigh,
        BodyPart::LeftLeg,
        BodyPart::RightLeg,
        BodyPart::LeftFoot,
        BodyPart::RightFoot,
        BodyPart::LeftAnkle,
        BodyPart::RightAnkle,
    ];

    fn code(&self) -> &'static str {
        match self {
            BodyPart::Head => "Testa",
            BodyPart::Neck => "Collo",
            BodyPart::LeftArm => "Braccio Sx",
            BodyPart::RightArm => "Braccio Dx",
            BodyPart::LeftForearm => "Avambraccio Sx",
            BodyPart::RightForearm => "Avambraccio Dx",
            BodyPart::LeftHand => "Mano Sx",
            BodyPart::RightHand => "Mano Dx",
            BodyPart::Chest => "Torace",
            BodyPart::Abdomen => "Addome",
            BodyPart::Back => "Schiena",
            BodyPart::Pelvis => "Pelvi",
            BodyPart::LeftThigh => "Coscia Sx",
            BodyPart::RightThigh => "Coscia Dx",
            BodyPart::LeftLeg => "Gamba Sx",
            BodyPart::RightLeg => "Gamba Dx",
            BodyPart::LeftFoot => "Piede Sx",
            BodyPart::RightFoot => "Piede Dx",
            BodyPart::LeftAnkle => "Caviglia Sx",
            BodyPart::RightAnkle => "Caviglia Dx",
        }
    }

    /// Partial matching in both directions.
    ///
    /// When a canonical name appears inside the raw phrase the longest one
    /// wins, so "avambraccio sx" never collapses into "Braccio Sx". When the
    /// raw phrase is a fragment of canonical names it must identify exactly
    /// one of them, otherwise laterality would be guessed.
    fn synonym_match(raw: &str) -> Option<Self> {
        let phrase = normalize_laterality(raw);
        if phrase.is_empty() {
            return None;
        }

        let contained = Self::ALL
            .iter()
            .copied()
            .filter(|part| phrase.contains(&part.code().to_lowercase()))
            .max_by_key(|part| part.code().len());
        if contained.is_some() {
            return contained;
        }

        let mut fragments = Self::ALL
            .iter()
            .copied()
            .filter(|part| part.code().to_lowercase().contains(&phrase));
        match (fragments.next(), fragments.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }
}

/// Lower-case, collapse whitespace and spell laterality the way canonical
/// names do ("gamba destra" becomes "gamba dx").
fn normalize_laterality(raw: &str) -> String {
    raw.to_lowercase()
        .split_whitespace()
        .map(|word| match word {
            "sinistro" | "sinistra" | "sin" | "sn" | "left" => "sx",
            "destro" | "destra" | "des" | "right" => "dx",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InjuryType {
    Amputation,
    Deformity,
    Pain,
    Haemorrhage,
    DeepWound,
    SuperficialWound,
    BluntTrauma,
    Burn,
    MotorDeficit,
    AbsentSensation,
    SuspectedFracture,
    SuspectedDislocation,
}

impl InjuryType {
    /// Upper-case descriptions accepted for each code, accents folded.
    const DESCRIPTIONS: &'static [(InjuryType, &'static str)] = &[
        (InjuryType::Amputation, "AMPUTAZIONE"),
        (InjuryType::Deformity, "DEFORMITA"),
        (InjuryType::Pain, "DOLORE"),
        (InjuryType::Haemorrhage, "EMORRAGIA"),
        (InjuryType::DeepWound, "FERITA PROFONDA"),
        (InjuryType::SuperficialWound, "FERITA SUPERFICIALE"),
        (InjuryType::BluntTrauma, "TRAUMA CHIUSO"),
        (InjuryType::Burn, "USTIONE"),
        (InjuryType::MotorDeficit, "DEFICIT MOTORIO"),
        (InjuryType::AbsentSensation, "SENSIBILITA ASSENTE"),
        (InjuryType::SuspectedFracture, "FRATTURA SOSPETTA"),
        (InjuryType::SuspectedFracture, "FRATTURA"),
        (InjuryType::SuspectedDislocation, "LUSSAZIONE SOSPETTA"),
        (InjuryType::SuspectedDislocation, "LUSSAZIONE"),
    ];
}

impl Vocabulary for InjuryType {
    const ALL: &'static [Self] = &[
        InjuryType::Amputation,
        InjuryType::Deformity,
        InjuryType::Pain,
        InjuryType::Haemorrhage,
        InjuryType::DeepWound,
        InjuryType::SuperficialWound,
        InjuryType::BluntTrauma,
        InjuryType::Burn,
        InjuryType::MotorDeficit,
        InjuryType::AbsentSensation,
        InjuryType::SuspectedFracture,
        InjuryType::SuspectedDislocation,
    ];

    fn code(&self) -> &'static str {
        match self {
            InjuryType::Amputation => "1",
            InjuryType::Deformity => "2",
            InjuryType::Pain => "3",
            InjuryType::Haemorrhage => "4",
            InjuryType::DeepWound => "5",
            InjuryType::SuperficialWound => "6",
            InjuryType::BluntTrauma => "7",
            InjuryType::Burn => "8",
            InjuryType::MotorDeficit => "9",
            InjuryType::AbsentSensation => "A",
            InjuryType::SuspectedFracture => "B",
            InjuryType::SuspectedDislocation => "C",
        }
    }

    fn synonym_match(raw: &str) -> Option<Self> {
        let phrase = fold_accents(&raw.trim().to_uppercase());
        if phrase.is_empty() {
            return None;
        }

        if let Some((member, _)) = Self::DESCRIPTIONS.iter().find(|(_, d)| *d == phrase) {
            return Some(*member);
        }

        // Longest description contained in the phrase, so "ferita profonda
        // alla coscia" picks the deep wound rather than anything shorter.
        let mut by_length: Vec<_> = Self::DESCRIPTIONS.iter().collect();
        by_length.sort_by_key(|(_, d)| std::cmp::Reverse(d.len()));
        if let Some((member, _)) = by_length.iter().find(|(_, d)| phrase.contains(*d)) {
            return Some(*member);
        }

        // Truncated descriptions ("emorrag") need enough letters to be unambiguous.
        if phrase.chars().count() >= 4 {
            return Self::DESCRIPTIONS
                .iter()
                .find(|(_, d)| d.contains(&phrase))
                .map(|(member, _)| *member);
        }
        None
    }
}

fn fold_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'À' | 'Á' => 'A',
            'È' | 'É' => 'E',
            'Ì' | 'Í' => 'I',
            'Ò' | 'Ó' => 'O',
            'Ù' | 'Ú' => 'U',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_codes_parse_case_insensitively() {
        assert_eq!(Sex::parse("m"), Some(Sex::Male));
        assert_eq!(Consciousness::parse(" a "), Some(Consciousness::Alert));
        assert_eq!(Skin::parse("PALLIDA"), Some(Skin::Pale));
        assert_eq!(BodyPart::parse("braccio sx"), Some(BodyPart::LeftArm));
        assert_eq!(InjuryType::parse("b"), Some(InjuryType::SuspectedFracture));
        assert_eq!(ReturnCode::parse("3"), Some(ReturnCode::Urgent));
    }

    #[test]
    fn test_sex_synonyms() {
        assert_eq!(Sex::parse("Maschio"), Some(Sex::Male));
        assert_eq!(Sex::parse("donna"), Some(Sex::Female));
        assert_eq!(Sex::parse("sconosciuto"), None);
    }

    #[test]
    fn test_consciousness_prefers_unresponsive_over_conscious() {
        assert_eq!(Consciousness::parse("paziente incosciente"), Some(Consciousness::Unresponsive));
        assert_eq!(Consciousness::parse("vigile e orientato"), Some(Consciousness::Alert));
        assert_eq!(Consciousness::parse("risponde alla voce"), Some(Consciousness::Voice));
        assert_eq!(Consciousness::parse("reagisce solo al dolore"), Some(Consciousness::Pain));
    }

    #[test]
    fn test_negated_alertness_is_unresponsive() {
        assert_eq!(Consciousness::parse("non cosciente"), Some(Consciousness::Unresponsive));
        assert_eq!(Consciousness::parse("paziente non vigile"), Some(Consciousness::Unresponsive));
        assert_eq!(Consciousness::parse("non sveglio"), Some(Consciousness::Unresponsive));
        assert_eq!(Consciousness::parse("Non sveglia"), Some(Consciousness::Unresponsive));
        assert_eq!(Consciousness::parse("cosciente"), Some(Consciousness::Alert));
    }

    #[test]
    fn test_skin_breathing_pupils() {
        assert_eq!(Skin::parse("cute sudata e fredda"), Some(Skin::Sweaty));
        assert_eq!(Skin::parse("labbra blu"), Some(Skin::Cyanotic));
        assert_eq!(Breathing::parse("respiro rapido"), Some(Breathing::Tachypneic));
        assert_eq!(Breathing::parse("apnea"), Some(Breathing::Absent));
        assert_eq!(PupilSize::parse("miotica"), Some(PupilSize::Small));
        assert_eq!(PupilSize::parse("midriatica"), Some(PupilSize::Large));
        assert_eq!(PupilSize::parse("nella norma"), None);
    }

    #[test]
    fn test_exit_code_words() {
        assert_eq!(ExitCode::parse("rosso"), Some(ExitCode::Red));
        assert_eq!(ExitCode::parse("codice giallo"), Some(ExitCode::Yellow));
        assert_eq!(ExitCode::parse("Green"), Some(ExitCode::Green));
        assert_eq!(ExitCode::parse("arancione"), None);
    }

    #[test]
    fn test_return_code_negations_win() {
        assert_eq!(ReturnCode::parse("non urgente"), Some(ReturnCode::NonUrgent));
        assert_eq!(ReturnCode::parse("rientro urgente"), Some(ReturnCode::Urgent));
        assert_eq!(ReturnCode::parse("Non trasportato"), Some(ReturnCode::NotTransported));
        assert_eq!(ReturnCode::parse("paziente critico"), Some(ReturnCode::Critical));
        assert_eq!(ReturnCode::parse("condizioni critiche"), None);
        assert_eq!(ReturnCode::parse("Critica"), Some(ReturnCode::Critical));
    }

    #[test]
    fn test_negated_critical_is_unmatched() {
        assert_eq!(ReturnCode::parse("non critico"), None);
        assert_eq!(ReturnCode::parse("paziente non critica"), None);
        assert_eq!(ReturnCode::parse("non critico, rientro urgente"), Some(ReturnCode::Urgent));
    }

    #[test]
    fn test_body_part_longest_match() {
        assert_eq!(BodyPart::parse("Avambraccio sinistro"), Some(BodyPart::LeftForearm));
        assert_eq!(BodyPart::parse("gamba destra"), Some(BodyPart::RightLeg));
        assert_eq!(BodyPart::parse("torace"), Some(BodyPart::Chest));
        assert_eq!(BodyPart::parse("torac"), Some(BodyPart::Chest));
    }

    #[test]
    fn test_body_part_ambiguous_laterality_is_unmatched() {
        assert_eq!(BodyPart::parse("braccio"), None);
        assert_eq!(BodyPart::parse("ginocchio"), None);
    }

    #[test]
    fn test_injury_type_descriptions() {
        assert_eq!(InjuryType::parse("Deformità"), Some(InjuryType::Deformity));
        assert_eq!(InjuryType::parse("frattura"), Some(InjuryType::SuspectedFracture));
        assert_eq!(InjuryType::parse("sospetta lussazione"), Some(InjuryType::SuspectedDislocation));
        assert_eq!(InjuryType::parse("ferita profonda al braccio"), Some(InjuryType::DeepWound));
        assert_eq!(InjuryType::parse("sensibilità assente"), Some(InjuryType::AbsentSensation));
        assert_eq!(InjuryType::parse("graffio"), None);
    }

    #[test]
    fn test_every_code_round_trips() {
        fn check<V: Vocabulary>() {
            for member in V::ALL {
                assert_eq!(V::parse(member.code()), Some(*member));
            }
        }
        check::<Sex>();
        check::<Consciousness>();
        check::<Skin>();
        check::<Breathing>();
        check::<PupilSize>();
        check::<ExitCode>();
        check::<ReturnCode>();
        check::<BodyPart>();
        check::<InjuryType>();
    }
}
