mod test_support;

use serde_json::json;
use test_support::{spawn_sidecar, spawn_sidecar_in, temp_dir};

#[test]
fn workspace_state_survives_restart() {
    let workspace = temp_dir("educad-restart");

    let mut first = spawn_sidecar();
    first.request_ok(
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    first.request_ok(
        "setup.update",
        json!({ "patch": { "name": "Iaçu", "centerLat": -12.767, "centerLng": -40.212 } }),
    );
    first.request_ok(
        "students.create",
        json!({ "student": { "id": "r-1", "name": "PERSISTIDO", "cpf": "529.982.247-25" } }),
    );
    first.request_ok(
        "schools.update",
        json!({ "school": {
            "id": "29383935",
            "name": "CRECHE PARAISO",
            "types": ["Educação Infantil"],
            "availableSlots": 150
        } }),
    );
    first.close();

    let mut second = spawn_sidecar_in(&workspace);
    let health = second.request_ok("health", json!({}));
    assert_eq!(health["workspacePath"], json!(workspace.to_string_lossy()));
    assert_eq!(health["students"], 11);

    let setup = second.request_ok("setup.get", json!({}));
    assert_eq!(setup["municipality"]["name"], "Iaçu");
    assert_eq!(setup["municipality"]["stateCode"], "BA");

    let found = second.request_ok("students.search", json!({ "query": "52998224725" }));
    assert_eq!(found["total"], 1);
    assert_eq!(found["students"][0]["id"], "r-1");

    // The rename followed the linked students.
    let detail = second.request_ok("schools.detail", json!({ "schoolId": "29383935" }));
    assert_eq!(detail["school"]["name"], "CRECHE PARAISO");
    assert_eq!(detail["totalStudents"], 8);

    second.request_ok("registry.reset", json!({}));
    let health = second.request_ok("health", json!({}));
    assert_eq!(health["students"], 10);
    second.close();

    let mut third = spawn_sidecar_in(&workspace);
    let health = third.request_ok("health", json!({}));
    assert_eq!(health["students"], 10);
    let stats = third.request_ok("dashboard.stats", json!({}));
    assert_eq!(stats["stats"]["backupNeeded"], true);
    third.close();

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn mutation_errors_use_stable_codes() {
    let mut sidecar = spawn_sidecar();
    assert_eq!(
        sidecar.request_err(
            "students.create",
            json!({ "student": { "id": "1001", "name": "DUPLICADO" } })
        ),
        "duplicate_id"
    );
    assert_eq!(
        sidecar.request_err(
            "students.update",
            json!({ "student": { "id": "nao-existe", "name": "X" } })
        ),
        "not_found"
    );
    assert_eq!(
        sidecar.request_err("students.bulkStatus", json!({ "studentIds": ["1001"], "status": "Ativo" })),
        "bad_params"
    );
    assert_eq!(
        sidecar.request_err("students.bulkAssignClass", json!({ "studentIds": ["1001"] })),
        "bad_params"
    );
    assert_eq!(
        sidecar.request_err("schools.delete", json!({ "schoolId": "missing" })),
        "not_found"
    );
    assert_eq!(
        sidecar.request_err("setup.update", json!({ "patch": { "cidade": "X" } })),
        "bad_params"
    );
    sidecar.close();
}

#[test]
fn search_filters_sort_and_paginate() {
    let mut sidecar = spawn_sidecar();

    let page = sidecar.request_ok(
        "students.search",
        json!({ "school": "CRECHE PARAISO DA CRIANCA", "sortBy": "name", "pageSize": 3, "page": 2 }),
    );
    assert_eq!(page["total"], 8);
    assert_eq!(page["pageCount"], 3);
    assert_eq!(page["students"].as_array().map(Vec::len), Some(3));
    assert_eq!(page["students"][0]["name"], "JOÃO SILVA SANTOS");

    let pending = sidecar.request_ok(
        "students.search",
        json!({ "status": "Pendente", "school": "Todas" }),
    );
    assert_eq!(pending["total"], 2);

    let lower_school = sidecar.request_ok(
        "students.search",
        json!({ "school": "creche paraiso da crianca " }),
    );
    assert_eq!(lower_school["total"], 8);
    assert_eq!(
        sidecar.request_err("students.search", json!({ "status": "Cancelado" })),
        "bad_params"
    );
    assert_eq!(
        sidecar.request_err("classes.groups", json!({ "status": "Ativo" })),
        "bad_params"
    );
    assert_eq!(
        sidecar.request_err(
            "schools.detail",
            json!({ "schoolId": "29383935", "status": "Cancelado" })
        ),
        "bad_params"
    );

    // One substitution away from MARIA.
    let fuzzy = sidecar.request_ok("students.search", json!({ "query": "marja" }));
    assert_eq!(fuzzy["students"][0]["id"], "1002");

    let groups = sidecar.request_ok("classes.groups", json!({}));
    let classes = groups["classes"].as_array().expect("classes");
    assert_eq!(classes[0]["school"], "CRECHE PARAISO DA CRIANCA");
    assert_eq!(classes.last().map(|c| c["school"].clone()), Some(json!("Não alocada")));

    let allocated = sidecar.request_ok("students.allocate", json!({ "schoolId": "29383936" }));
    assert_eq!(allocated["allocated"], 1);
    let stats = sidecar.request_ok("dashboard.stats", json!({}));
    assert_eq!(stats["stats"]["unallocated"], 0);
    sidecar.close();
}
