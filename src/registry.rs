//! The student and school registry. Owns both collections plus the
//! last-backup timestamp and mirrors them to a [`SnapshotStore`].
//!
//! Every mutation builds the new collection, writes it to the store and only
//! then replaces the in-memory copy, so a failed write leaves the registry
//! exactly as it was.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{info, warn};

use crate::backup::RegistryDocument;
use crate::config::{MunicipalitySetup, SETUP_KEY};
use crate::demo::{demo_schools, demo_students};
use crate::import::ImportPreview;
use crate::model::{same_school, EnrollmentStatus, HistoryEntry, School, Shift, Student};
use crate::persist::{
    SnapshotStore, KEY_LAST_BACKUP, KEY_SCHOOLS, KEY_STUDENTS, REGISTRY_KEYS,
};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("id already in use: {0}")]
    DuplicateId(String),
    #[error("{0}")]
    Invalid(String),
    #[error("failed to persist registry: {0:#}")]
    Persist(anyhow::Error),
}

impl RegistryError {
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::NotFound { .. } => "not_found",
            RegistryError::DuplicateId(_) => "duplicate_id",
            RegistryError::Invalid(_) => "bad_params",
            RegistryError::Persist(_) => "persist_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSummary {
    pub schools_added: usize,
    pub schools_skipped: usize,
    pub students_added: usize,
    pub students_replaced: usize,
}

/// Fields written by a bulk class assignment. Empty values leave the
/// student's current value alone.
#[derive(Debug, Clone, Default)]
pub struct ClassAssignment {
    pub class_name: String,
    pub grade: String,
    pub shift: String,
}

pub struct Registry {
    schools: Vec<School>,
    students: Vec<Student>,
    last_backup: Option<String>,
    setup: MunicipalitySetup,
    store: Box<dyn SnapshotStore>,
}

fn load_json<T: serde::de::DeserializeOwned>(
    store: &dyn SnapshotStore,
    key: &str,
) -> Result<Option<T>, RegistryError> {
    let Some(raw) = store.load(key).map_err(RegistryError::Persist)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            warn!(key, error = %e, "snapshot unreadable; using defaults");
            Ok(None)
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, RegistryError> {
    serde_json::to_string(value).map_err(|e| RegistryError::Persist(e.into()))
}

/// Merges two histories: everything in `kept` stays, entries of `incoming`
/// not already present are appended.
fn merged_history(kept: &[HistoryEntry], incoming: &[HistoryEntry]) -> Vec<HistoryEntry> {
    let mut out = kept.to_vec();
    for h in incoming {
        if !out.contains(h) {
            out.push(h.clone());
        }
    }
    out
}

impl Registry {
    /// Loads the registry from `store`. Missing or unreadable snapshots fall
    /// back to the demonstration dataset; nothing is written.
    pub fn open(store: Box<dyn SnapshotStore>) -> Result<Self, RegistryError> {
        let schools: Vec<School> = match load_json(store.as_ref(), KEY_SCHOOLS)? {
            Some(v) => v,
            None => demo_schools(),
        };
        let students: Vec<Student> = match load_json(store.as_ref(), KEY_STUDENTS)? {
            Some(v) => v,
            None => demo_students(),
        };
        let last_backup = store
            .load(KEY_LAST_BACKUP)
            .map_err(RegistryError::Persist)?
            .filter(|s| !s.trim().is_empty());
        let setup = load_json(store.as_ref(), SETUP_KEY)?.unwrap_or_default();

        info!(
            schools = schools.len(),
            students = students.len(),
            "registry loaded"
        );
        Ok(Registry {
            schools: schools.into_iter().map(School::normalized).collect(),
            students,
            last_backup,
            setup,
            store,
        })
    }

    pub fn schools(&self) -> &[School] {
        &self.schools
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn last_backup(&self) -> Option<&str> {
        self.last_backup.as_deref()
    }

    pub fn setup(&self) -> &MunicipalitySetup {
        &self.setup
    }

    pub fn school(&self, id: &str) -> Option<&School> {
        self.schools.iter().find(|s| s.id == id)
    }

    pub fn student(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    fn commit(
        &mut self,
        schools: Option<Vec<School>>,
        students: Option<Vec<Student>>,
    ) -> Result<(), RegistryError> {
        let mut entries: Vec<(&str, String)> = Vec::new();
        if let Some(s) = &schools {
            entries.push((KEY_SCHOOLS, to_json(s)?));
        }
        if let Some(s) = &students {
            entries.push((KEY_STUDENTS, to_json(s)?));
        }
        self.store.save(&entries).map_err(RegistryError::Persist)?;
        if let Some(s) = schools {
            self.schools = s;
        }
        if let Some(s) = students {
            self.students = s;
        }
        Ok(())
    }

    pub fn update_setup(&mut self, setup: MunicipalitySetup) -> Result<(), RegistryError> {
        self.store
            .save(&[(SETUP_KEY, to_json(&setup)?)])
            .map_err(RegistryError::Persist)?;
        self.setup = setup;
        Ok(())
    }

    pub fn add_school(&mut self, school: School) -> Result<(), RegistryError> {
        if school.name.trim().is_empty() {
            return Err(RegistryError::Invalid("school name is required".into()));
        }
        if self.school(&school.id).is_some() {
            return Err(RegistryError::DuplicateId(school.id));
        }
        let mut schools = self.schools.clone();
        schools.push(school.normalized());
        self.commit(Some(schools), None)
    }

    /// Replaces the school with the same id. A rename re-links every student
    /// that pointed at the old name; returns how many were re-linked.
    pub fn update_school(&mut self, school: School) -> Result<usize, RegistryError> {
        if school.name.trim().is_empty() {
            return Err(RegistryError::Invalid("school name is required".into()));
        }
        let Some(idx) = self.schools.iter().position(|s| s.id == school.id) else {
            return Err(RegistryError::NotFound {
                kind: "school",
                id: school.id,
            });
        };
        let old_name = self.schools[idx].name.clone();
        let new_name = school.name.clone();

        let mut schools = self.schools.clone();
        schools[idx] = school.normalized();

        let mut relinked = 0usize;
        let students = if old_name.trim() != new_name.trim() {
            let mut students = self.students.clone();
            for s in students.iter_mut().filter(|s| same_school(&s.school, &old_name)) {
                s.school = new_name.clone();
                relinked += 1;
            }
            (relinked > 0).then_some(students)
        } else {
            None
        };

        self.commit(Some(schools), students)?;
        Ok(relinked)
    }

    pub fn remove_school(&mut self, id: &str) -> Result<School, RegistryError> {
        let Some(idx) = self.schools.iter().position(|s| s.id == id) else {
            return Err(RegistryError::NotFound {
                kind: "school",
                id: id.to_string(),
            });
        };
        let mut schools = self.schools.clone();
        let removed = schools.remove(idx);
        self.commit(Some(schools), None)?;
        Ok(removed)
    }

    /// A record arriving without history gets a creation entry.
    pub fn add_student(&mut self, mut student: Student, user: &str) -> Result<(), RegistryError> {
        if student.id.trim().is_empty() {
            return Err(RegistryError::Invalid("student id is required".into()));
        }
        if self.student(&student.id).is_some() {
            return Err(RegistryError::DuplicateId(student.id));
        }
        if student.history.is_empty() {
            student.history.push(HistoryEntry::now("Cadastro realizado", user));
        }
        let mut students = self.students.clone();
        students.push(student);
        self.commit(None, Some(students))
    }

    /// Replaces the stored record, keeping its history and appending an
    /// edit entry.
    pub fn update_student(&mut self, student: Student, user: &str) -> Result<(), RegistryError> {
        let Some(idx) = self.students.iter().position(|s| s.id == student.id) else {
            return Err(RegistryError::NotFound {
                kind: "student",
                id: student.id,
            });
        };
        let mut students = self.students.clone();
        let mut history = merged_history(&students[idx].history, &student.history);
        history.push(HistoryEntry::now("Dados atualizados", user));
        students[idx] = Student { history, ..student };
        self.commit(None, Some(students))
    }

    pub fn remove_students(&mut self, ids: &[String]) -> Result<usize, RegistryError> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let students: Vec<Student> = self
            .students
            .iter()
            .filter(|s| !wanted.contains(s.id.as_str()))
            .cloned()
            .collect();
        let removed = self.students.len() - students.len();
        if removed > 0 {
            self.commit(None, Some(students))?;
        }
        Ok(removed)
    }

    fn update_selected(
        &mut self,
        ids: &[String],
        mut f: impl FnMut(&mut Student) -> bool,
    ) -> Result<usize, RegistryError> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut students = self.students.clone();
        let mut touched = 0usize;
        for s in students.iter_mut().filter(|s| wanted.contains(s.id.as_str())) {
            if f(s) {
                touched += 1;
            }
        }
        if touched > 0 {
            self.commit(None, Some(students))?;
        }
        Ok(touched)
    }

    pub fn bulk_set_status(
        &mut self,
        ids: &[String],
        status: EnrollmentStatus,
        user: &str,
    ) -> Result<usize, RegistryError> {
        self.update_selected(ids, |s| {
            s.status = status;
            s.history
                .push(HistoryEntry::now(format!("Status alterado para {status}"), user));
            true
        })
    }

    pub fn bulk_assign_class(
        &mut self,
        ids: &[String],
        assignment: &ClassAssignment,
        user: &str,
    ) -> Result<usize, RegistryError> {
        let class_name = assignment.class_name.trim();
        let grade = assignment.grade.trim();
        let shift = assignment.shift.trim();
        if class_name.is_empty() && grade.is_empty() && shift.is_empty() {
            return Err(RegistryError::Invalid(
                "class assignment needs a class, grade or shift".into(),
            ));
        }
        self.update_selected(ids, |s| {
            if !class_name.is_empty() {
                s.class_name = class_name.to_string();
            }
            if !grade.is_empty() {
                s.grade = grade.to_string();
            }
            if !shift.is_empty() {
                s.shift = Shift::parse_lenient(shift);
            }
            s.history.push(HistoryEntry::now(
                format!("Turma atribuída: {}", s.class_name),
                user,
            ));
            true
        })
    }

    /// Moves every unallocated student into `school_id` as Enrolled.
    pub fn allocate_unallocated(&mut self, school_id: &str, user: &str) -> Result<usize, RegistryError> {
        let Some(school) = self.school(school_id) else {
            return Err(RegistryError::NotFound {
                kind: "school",
                id: school_id.to_string(),
            });
        };
        let name = school.name.clone();
        let ids: Vec<String> = self
            .students
            .iter()
            .filter(|s| s.is_unallocated())
            .map(|s| s.id.clone())
            .collect();
        let n = self.update_selected(&ids, |s| {
            s.school = name.clone();
            s.status = EnrollmentStatus::Enrolled;
            s.history
                .push(HistoryEntry::now(format!("Alocado em {name}"), user));
            true
        })?;
        info!(school = %name, students = n, "unallocated students allocated");
        Ok(n)
    }

    fn merged_schools(&self, incoming: Vec<School>, summary: &mut MergeSummary) -> Vec<School> {
        let mut schools = self.schools.clone();
        let mut ids: HashSet<String> = schools.iter().map(|s| s.id.clone()).collect();
        for s in incoming {
            if ids.insert(s.id.clone()) {
                schools.push(s.normalized());
                summary.schools_added += 1;
            } else {
                summary.schools_skipped += 1;
            }
        }
        schools
    }

    fn merged_students(&self, incoming: Vec<Student>, summary: &mut MergeSummary) -> Vec<Student> {
        let mut students = self.students.clone();
        let mut index: HashMap<String, usize> = students
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
        for s in incoming {
            match index.get(&s.id) {
                Some(&i) => {
                    let history = merged_history(&students[i].history, &s.history);
                    students[i] = Student { history, ..s };
                    summary.students_replaced += 1;
                }
                None => {
                    index.insert(s.id.clone(), students.len());
                    students.push(s);
                    summary.students_added += 1;
                }
            }
        }
        students
    }

    /// Appends schools whose id is new; existing schools are never touched.
    pub fn merge_schools(&mut self, incoming: Vec<School>) -> Result<MergeSummary, RegistryError> {
        let mut summary = MergeSummary::default();
        let schools = self.merged_schools(incoming, &mut summary);
        self.commit(Some(schools), None)?;
        Ok(summary)
    }

    /// Same-id records are replaced in place, new ids appended in order.
    pub fn merge_students(&mut self, incoming: Vec<Student>) -> Result<MergeSummary, RegistryError> {
        let mut summary = MergeSummary::default();
        let students = self.merged_students(incoming, &mut summary);
        self.commit(None, Some(students))?;
        Ok(summary)
    }

    /// Merges a confirmed import preview in one write.
    pub fn apply_import(&mut self, preview: ImportPreview) -> Result<MergeSummary, RegistryError> {
        let mut summary = MergeSummary::default();
        let schools = (!preview.schools.is_empty())
            .then(|| self.merged_schools(preview.schools, &mut summary));
        let students = (!preview.students.is_empty())
            .then(|| self.merged_students(preview.students, &mut summary));
        self.commit(schools, students)?;
        info!(
            file = %preview.file_name,
            schools_added = summary.schools_added,
            students_added = summary.students_added,
            students_replaced = summary.students_replaced,
            "import applied"
        );
        Ok(summary)
    }

    /// Back to the demonstration dataset; the backup timestamp is cleared.
    pub fn reset(&mut self) -> Result<(), RegistryError> {
        self.store
            .remove(&REGISTRY_KEYS)
            .map_err(RegistryError::Persist)?;
        self.schools = demo_schools();
        self.students = demo_students();
        self.last_backup = None;
        warn!("registry reset to demonstration data");
        Ok(())
    }

    pub fn register_backup(&mut self) -> Result<String, RegistryError> {
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        self.store
            .save(&[(KEY_LAST_BACKUP, now.clone())])
            .map_err(RegistryError::Persist)?;
        self.last_backup = Some(now.clone());
        Ok(now)
    }

    pub fn backup_document(&self) -> RegistryDocument {
        RegistryDocument {
            students: Some(self.students.clone()),
            schools: Some(self.schools.clone()),
        }
    }
}
