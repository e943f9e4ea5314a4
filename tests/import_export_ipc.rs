mod test_support;

use serde_json::json;
use test_support::{census_row, spawn_sidecar, temp_dir};

const STUDENTS_CSV: &str = "\
ID;Nome;CPF;Data de Nascimento;Status;Escola;Turma;Turno
2001;carla menezes;123.456.789-09;2021-05-04;Pendente;CRECHE PARAISO DA CRIANCA;GRUPO 3 C;Integral
2002;davi nunes;;2020-11-30;Matriculado;ESCOLA MUNICIPAL FUTURO DO SABER;1º ANO A;Matutino
";

#[test]
fn csv_preview_apply_then_export_reimports_as_replacements() {
    let workspace = temp_dir("educad-import-export");
    let mut sidecar = spawn_sidecar();
    sidecar.request_ok(
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let preview = sidecar.request_ok(
        "import.preview",
        json!({ "fileName": "alunos.csv", "content": STUDENTS_CSV }),
    );
    assert_eq!(preview["preview"]["kind"], "students");
    assert_eq!(preview["preview"]["students"].as_array().map(Vec::len), Some(2));
    assert_eq!(preview["preview"]["students"][0]["name"], "CARLA MENEZES");
    assert_eq!(preview["preview"]["students"][0]["birthDate"], "04/05/2021");
    let stages: Vec<&str> = preview["stages"]
        .as_array()
        .expect("stages")
        .iter()
        .filter_map(|s| s["stage"].as_str())
        .collect();
    assert_eq!(stages, vec!["decoding", "parsing", "mapping", "ready"]);

    // Nothing is merged until the preview is applied.
    let before = sidecar.request_ok("students.search", json!({ "query": "carla" }));
    assert_eq!(before["total"], 0);

    let applied = sidecar.request_ok("import.apply", json!({}));
    assert_eq!(applied["summary"]["studentsAdded"], 2);
    assert_eq!(applied["summary"]["studentsReplaced"], 0);

    let found = sidecar.request_ok("students.search", json!({ "query": "carla" }));
    assert_eq!(found["total"], 1);
    assert_eq!(found["students"][0]["status"], "Pendente");

    let exported = sidecar.request_ok("export.studentsCsv", json!({}));
    let content = exported["content"].as_str().expect("csv content");
    assert!(content.starts_with('\u{feff}'));
    assert!(content.contains("\"CARLA MENEZES\""));

    let again = sidecar.request_ok(
        "import.preview",
        json!({ "fileName": "alunos_export.csv", "content": content }),
    );
    assert_eq!(again["preview"]["kind"], "students");
    let applied = sidecar.request_ok("import.apply", json!({}));
    assert_eq!(applied["summary"]["studentsAdded"], 0);
    assert_eq!(applied["summary"]["studentsReplaced"], 12);

    let all = sidecar.request_ok("students.list", json!({}));
    assert_eq!(all["students"].as_array().map(Vec::len), Some(12));

    sidecar.close();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn census_import_proposes_unknown_school_once() {
    let mut sidecar = spawn_sidecar();
    let text = format!(
        "Ministério da Educação\nEducacenso 2024\nNome da escola:;;CRECHE SOL NASCENTE;\nCódigo da escola:;29000001\n{}\n{}\n{}\n",
        census_row(&[(2, "Identificação única"), (4, "Nome")]),
        census_row(&[
            (2, "555"),
            (4, "Rita Alves"),
            (7, "01/02/2021"),
            (28, "GRUPO 4 A"),
            (34, "07:30 - 11:30")
        ]),
        census_row(&[(2, "556"), (4, "Tomas Reis"), (22, "Sim")]),
    );

    let preview = sidecar.request_ok(
        "import.preview",
        json!({ "fileName": "relacao_alunos.txt", "content": text }),
    );
    assert_eq!(preview["preview"]["kind"], "census");
    assert_eq!(preview["preview"]["schools"][0]["name"], "CRECHE SOL NASCENTE");
    let applied = sidecar.request_ok("import.apply", json!({}));
    assert_eq!(applied["summary"]["schoolsAdded"], 1);
    assert_eq!(applied["summary"]["studentsAdded"], 2);

    let detail = sidecar.request_ok("schools.detail", json!({ "schoolId": "29000001" }));
    assert_eq!(detail["students"].as_array().map(Vec::len), Some(2));

    // Second pass: the school is known now, only students are replaced.
    let preview = sidecar.request_ok(
        "import.preview",
        json!({ "fileName": "relacao_alunos.txt", "content": text }),
    );
    assert_eq!(preview["preview"]["schools"].as_array().map(Vec::len), Some(0));
    let applied = sidecar.request_ok("import.apply", json!({}));
    assert_eq!(applied["summary"]["schoolsAdded"], 0);
    assert_eq!(applied["summary"]["studentsReplaced"], 2);

    sidecar.close();
}

#[test]
fn unparseable_input_leaves_registry_untouched() {
    let mut sidecar = spawn_sidecar();
    let code = sidecar.request_err(
        "import.preview",
        json!({ "fileName": "dados.json", "content": "{ broken" }),
    );
    assert_eq!(code, "unparseable_input");
    let code = sidecar.request_err(
        "import.preview",
        json!({ "fileName": "planilha.xlsx", "content": "abc" }),
    );
    assert_eq!(code, "unparseable_input");
    assert_eq!(sidecar.request_err("import.apply", json!({})), "no_pending_import");

    let all = sidecar.request_ok("students.list", json!({}));
    assert_eq!(all["students"].as_array().map(Vec::len), Some(10));
    sidecar.close();
}

#[test]
fn bundle_export_then_import_restores_records() {
    let workspace = temp_dir("educad-bundle-src");
    let mut sidecar = spawn_sidecar();
    sidecar.request_ok(
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    sidecar.request_ok(
        "students.create",
        json!({ "student": { "id": "b-1", "name": "BUNDLE ALUNO" } }),
    );

    let exported = sidecar.request_ok("backup.exportBundle", json!({}));
    let path = exported["path"].as_str().expect("bundle path").to_string();
    assert!(path.contains("backups"));
    assert_eq!(exported["bundleFormat"], "educa-registry-v1");

    let stats = sidecar.request_ok("dashboard.stats", json!({}));
    assert_eq!(stats["stats"]["backupNeeded"], false);

    sidecar.request_ok("registry.reset", json!({}));
    let preview = sidecar.request_ok("import.preview", json!({ "path": path }));
    assert_eq!(preview["preview"]["kind"], "backup");
    let applied = sidecar.request_ok("import.apply", json!({}));
    assert_eq!(applied["summary"]["studentsAdded"], 1);

    let found = sidecar.request_ok("students.search", json!({ "query": "bundle" }));
    assert_eq!(found["total"], 1);

    sidecar.close();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn bundle_export_without_workspace_needs_a_path() {
    let mut sidecar = spawn_sidecar();
    assert_eq!(
        sidecar.request_err("backup.exportBundle", json!({})),
        "no_workspace"
    );
    sidecar.close();
}
