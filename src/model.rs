use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::text::{normalize_for_fuzzy, normalize_key};

/// Placeholder school name for students without an allocation.
pub const UNALLOCATED_SCHOOL: &str = "Não alocada";
/// Name given to school records that arrive without one.
pub const IMPORTED_SCHOOL_NAME: &str = "Escola Importada";
pub const DEFAULT_SCHOOL_IMAGE: &str =
    "https://images.unsplash.com/photo-1523050854058-8df90110c9f1?auto=format&fit=crop&q=80";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EnrollmentStatus {
    #[default]
    Enrolled,
    Pending,
    UnderReview,
}

impl EnrollmentStatus {
    pub const ALL: [EnrollmentStatus; 3] = [
        EnrollmentStatus::Enrolled,
        EnrollmentStatus::Pending,
        EnrollmentStatus::UnderReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Enrolled => "Matriculado",
            EnrollmentStatus::Pending => "Pendente",
            EnrollmentStatus::UnderReview => "Em Análise",
        }
    }

    /// Exact label match, ignoring case and surrounding blanks.
    pub fn from_label(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        EnrollmentStatus::ALL
            .into_iter()
            .find(|s| s.as_str().to_lowercase() == raw.to_lowercase())
    }

    /// Keyword classification used by imports: anything that is neither
    /// pending nor under review counts as enrolled.
    pub fn parse_lenient(raw: &str) -> Self {
        let n = normalize_for_fuzzy(raw);
        if n.contains("pendente") || n.contains("pending") {
            EnrollmentStatus::Pending
        } else if n.contains("analise") || n.contains("review") {
            EnrollmentStatus::UnderReview
        } else {
            EnrollmentStatus::Enrolled
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for EnrollmentStatus {
    fn from(s: String) -> Self {
        EnrollmentStatus::parse_lenient(&s)
    }
}

impl From<EnrollmentStatus> for String {
    fn from(s: EnrollmentStatus) -> Self {
        s.as_str().to_string()
    }
}

impl Serialize for EnrollmentStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EnrollmentStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(EnrollmentStatus::from(s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Shift {
    #[default]
    Unset,
    Morning,
    Afternoon,
    Evening,
    FullDay,
    /// Waiting for the education office to decide.
    Pending,
}

impl Shift {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shift::Unset => "",
            Shift::Morning => "Matutino",
            Shift::Afternoon => "Vespertino",
            Shift::Evening => "Noturno",
            Shift::FullDay => "Integral",
            Shift::Pending => "Definição Pendente",
        }
    }

    pub fn parse_lenient(raw: &str) -> Self {
        let n = normalize_key(raw);
        if n.is_empty() {
            Shift::Unset
        } else if n.contains("matutino") || n.contains("manha") || n.contains("morning") {
            Shift::Morning
        } else if n.contains("vespertino") || n.contains("tarde") || n.contains("afternoon") {
            Shift::Afternoon
        } else if n.contains("noturno") || n.contains("noite") || n.contains("evening") {
            Shift::Evening
        } else if n.contains("integral") || n.contains("fullday") {
            Shift::FullDay
        } else {
            Shift::Pending
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Shift {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Shift {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Shift::parse_lenient(&s))
    }
}

/// Pedagogical stage offered by a school.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchoolStage {
    EarlyChildhood,
    Elementary1,
    Elementary2,
    Secondary,
    AdultEducation,
}

impl SchoolStage {
    pub const ALL: [SchoolStage; 5] = [
        SchoolStage::EarlyChildhood,
        SchoolStage::Elementary1,
        SchoolStage::Elementary2,
        SchoolStage::Secondary,
        SchoolStage::AdultEducation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchoolStage::EarlyChildhood => "Educação Infantil",
            SchoolStage::Elementary1 => "Fundamental I",
            SchoolStage::Elementary2 => "Fundamental II",
            SchoolStage::Secondary => "Ensino Médio",
            SchoolStage::AdultEducation => "EJA",
        }
    }

    /// Scans free text (a type or modality column) for stage keywords.
    /// Several stages may apply; the result is never empty.
    pub fn classify(raw: &str) -> Vec<SchoolStage> {
        let text = normalize_for_fuzzy(raw);
        let words: Vec<&str> = text.split(' ').filter(|w| !w.is_empty()).collect();
        let has_word = |w: &str| words.iter().any(|x| *x == w);

        let mut out = Vec::new();
        if text.contains("infantil")
            || text.contains("creche")
            || words.iter().any(|w| w.starts_with("pre"))
        {
            out.push(SchoolStage::EarlyChildhood);
        }
        if text.contains("fundamental") {
            let initial = has_word("1") || has_word("i") || text.contains("inicia");
            let final_years = has_word("2") || has_word("ii") || text.contains("fina");
            if initial || !final_years {
                out.push(SchoolStage::Elementary1);
            }
            if final_years {
                out.push(SchoolStage::Elementary2);
            }
        }
        if text.contains("medio") {
            out.push(SchoolStage::Secondary);
        }
        if has_word("eja") {
            out.push(SchoolStage::AdultEducation);
        }
        if out.is_empty() {
            out.push(SchoolStage::EarlyChildhood);
        }
        out
    }
}

impl fmt::Display for SchoolStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SchoolStage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SchoolStage {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let exact = SchoolStage::ALL.into_iter().find(|st| st.as_str() == s);
        Ok(exact.unwrap_or_else(|| SchoolStage::classify(&s)[0]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: String,
    pub action: String,
    pub user: String,
}

impl HistoryEntry {
    pub fn now(action: impl Into<String>, user: impl Into<String>) -> Self {
        HistoryEntry {
            date: chrono::Local::now().format("%d/%m/%Y %H:%M").to_string(),
            action: action.into(),
            user: user.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Student {
    pub id: String,
    pub enrollment_id: String,
    pub name: String,
    pub birth_date: String,
    pub cpf: String,
    pub status: EnrollmentStatus,
    pub school: String,
    pub class_name: String,
    pub class_id: String,
    pub grade: String,
    pub shift: Shift,
    pub transport_request: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_type: Option<String>,
    pub special_needs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEntry>,
}

impl Student {
    pub fn is_unallocated(&self) -> bool {
        self.school.trim().is_empty() || self.school == UNALLOCATED_SCHOOL
    }

    pub fn cpf_digits(&self) -> String {
        crate::text::digits_only(&self.cpf)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub inep: String,
    #[serde(default, alias = "nome")]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub types: Vec<SchoolStage>,
    #[serde(default = "default_school_image")]
    pub image: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub available_slots: i64,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lng: f64,
}

fn default_school_image() -> String {
    DEFAULT_SCHOOL_IMAGE.to_string()
}

impl School {
    /// Restores the non-empty `id`, `name` and `types` invariants after
    /// deserialization.
    pub fn normalized(mut self) -> Self {
        if self.id.trim().is_empty() {
            self.id = format!("school_{}", Uuid::new_v4().simple());
        }
        if self.name.trim().is_empty() {
            self.name = IMPORTED_SCHOOL_NAME.to_string();
        }
        if self.types.is_empty() {
            self.types.push(SchoolStage::EarlyChildhood);
        }
        self.types.dedup();
        self
    }
}

/// Students reference their school by name; every comparison goes through
/// this function so renames and casing differences behave the same way.
pub fn same_school(a: &str, b: &str) -> bool {
    let a = school_key(a);
    !a.is_empty() && a == school_key(b)
}

/// Grouping key agreeing with [`same_school`].
pub fn school_key(name: &str) -> String {
    name.trim().to_uppercase()
}
