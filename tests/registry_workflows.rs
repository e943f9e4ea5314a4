use educad::db::SqliteSnapshotStore;
use educad::export::students_csv;
use educad::import::{run_import, ImportContext, ImportKind, ImportStage};
use educad::persist::{MemorySnapshotStore, SnapshotStore, KEY_STUDENTS};
use educad::registry::Registry;
use std::path::PathBuf;

fn temp_workspace(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()))
}

#[test]
fn read_only_store_keeps_state_on_failed_mutation() {
    let mut reg = Registry::open(Box::new(MemorySnapshotStore::read_only())).expect("open");
    let before = reg.students().len();
    let err = reg
        .remove_students(&["1001".to_string()])
        .expect_err("persist fails");
    assert_eq!(err.code(), "persist_failed");
    assert_eq!(reg.students().len(), before);
    assert!(reg.student("1001").is_some());
}

#[test]
fn corrupt_snapshot_falls_back_to_demo_data() {
    let ws = temp_workspace("educad-corrupt");
    {
        let mut store = SqliteSnapshotStore::open(&ws).expect("open");
        store
            .save(&[(KEY_STUDENTS, "[{not json".to_string())])
            .expect("save");
    }
    let reg = Registry::open(Box::new(SqliteSnapshotStore::open(&ws).expect("reopen")))
        .expect("registry");
    assert_eq!(reg.students().len(), 10);
    assert_eq!(reg.schools().len(), 2);
    let _ = std::fs::remove_dir_all(&ws);
}

#[test]
fn exported_students_import_back_through_the_pipeline() {
    let mut reg = Registry::open(Box::new(MemorySnapshotStore::new())).expect("open");
    let csv = students_csv(reg.students());

    let mut stages = Vec::new();
    let preview = {
        let ctx = ImportContext {
            existing_schools: reg.schools(),
            setup: reg.setup(),
        };
        run_import(csv.as_bytes(), "alunos_export.csv", &ctx, &mut |s: &ImportStage| {
            stages.push(s.clone())
        })
        .expect("import")
    };
    assert_eq!(preview.kind, ImportKind::Students);
    assert_eq!(preview.students.len(), 10);
    assert!(matches!(stages.last(), Some(ImportStage::Ready { records: 10 })));

    let summary = reg.apply_import(preview).expect("apply");
    assert_eq!(summary.students_added, 0);
    assert_eq!(summary.students_replaced, 10);
    let joao = reg.student("1001").expect("1001");
    assert_eq!(joao.school, "CRECHE PARAISO DA CRIANCA");
    assert_eq!(joao.birth_date, "03/01/2022");
}
