mod test_support;

use serde_json::json;
use test_support::{
    error_code, exported_cell, request, request_ok, roster_document, spawn_sidecar, temp_dir,
};

#[test]
fn identifier_mark_preview_then_apply_writes_only_approved_rows() {
    let dir = temp_dir("markgridd-mark-roundtrip");
    let saved = dir.join("marked.json");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workbook.open",
        json!({ "document": roster_document() }),
    );
    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "preview.create",
        json!({
            "columnKey": "unknown::W1",
            "task": "identifier-mark",
            "text": "555555\n666666\n777777\n999999"
        }),
    );
    let batch_id = preview["batchId"].as_str().expect("batchId").to_string();
    let rows = preview["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0]["matchStatus"], json!("matched"));
    assert_eq!(rows[0]["sheet"], json!("Sheet1"));
    assert_eq!(rows[0]["targetCell"], json!("C2"));
    assert_eq!(rows[0]["oldValue"], json!(""));
    assert_eq!(rows[1]["oldValue"], json!("x"));
    assert_eq!(rows[2]["matchStatus"], json!("ambiguous"));
    assert_eq!(rows[2]["targetCell"], json!("C4"));
    assert_eq!(rows[3]["matchStatus"], json!("notFound"));
    assert_eq!(preview["summary"]["total"], json!(4));
    assert_eq!(preview["columnMap"].as_array().map(|m| m.len()), Some(2));

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "preview.update",
        json!({ "batchId": batch_id, "seq": 2, "action": "discard" }),
    );
    assert_eq!(updated["row"]["discarded"], json!(true));
    assert_eq!(updated["summary"]["discarded"], json!(1));

    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "preview.apply",
        json!({ "batchId": batch_id, "highlightColor": "#ffcc00" }),
    );
    assert_eq!(applied["written"], json!(2));
    assert_eq!(applied["skippedDiscarded"], json!(1));
    assert_eq!(applied["skippedNotFound"], json!(1));
    assert_eq!(applied["highlight"], json!("FFCC00"));
    assert!(applied["appliedAt"].as_str().is_some());
    assert_eq!(applied["failures"], json!([]));

    let export = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "workbook.export",
        json!({ "sheet": "Sheet1" }),
    );
    let sheet = &export["sheet"];
    assert_eq!(exported_cell(sheet, 2, 3).as_f64(), Some(1.0));
    assert_eq!(exported_cell(sheet, 3, 3), json!("x"));
    assert_eq!(exported_cell(sheet, 4, 3).as_f64(), Some(1.0));
    assert!(exported_cell(sheet, 5, 3).is_null());
    let fills = sheet["fills"].as_array().expect("fills");
    assert!(fills
        .iter()
        .any(|f| f["row"] == json!(2) && f["col"] == json!(3) && f["color"] == json!("FFCC00")));

    // The applied batch is consumed.
    let again = request(
        &mut stdin,
        &mut reader,
        "6",
        "preview.apply",
        json!({ "batchId": batch_id }),
    );
    assert_eq!(error_code(&again), "not_found");

    // A fresh preview reads back what was written.
    let rerun = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "preview.create",
        json!({ "columnKey": "unknown::W1", "task": "attendance", "text": "555555" }),
    );
    assert_eq!(rerun["rows"][0]["oldValue"].as_f64(), Some(1.0));
    assert_eq!(rerun["rows"][0]["matchStatus"], json!("matched"));

    request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "workbook.save",
        json!({ "outPath": saved.to_string_lossy() }),
    );
    let before = request_ok(&mut stdin, &mut reader, "8b", "workbook.sheets", json!({}));
    let reopened_meta = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "workbook.open",
        json!({ "path": saved.to_string_lossy() }),
    );
    assert!(
        reopened_meta["revision"].as_u64() > before["revision"].as_u64(),
        "revision must keep increasing across reloads"
    );
    let reopened = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "workbook.export",
        json!({ "sheet": "Sheet1" }),
    );
    assert_eq!(exported_cell(&reopened["sheet"], 2, 3).as_f64(), Some(1.0));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn grade_preview_supports_edits_and_manual_fixes() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workbook.open",
        json!({ "document": roster_document() }),
    );
    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "preview.create",
        json!({
            "columnKey": "unknown::W1",
            "task": "grade-write",
            "text": "555555,A+\nSection 2\n888888, B\n666666,C"
        }),
    );
    let batch_id = preview["batchId"].as_str().expect("batchId").to_string();
    let rows = preview["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["newValue"], json!("A+"));
    assert_eq!(rows[0]["section"], json!(null));
    assert_eq!(rows[1]["sheet"], json!("Sheet2"));
    assert_eq!(rows[1]["newValue"], json!("B"));
    assert_eq!(rows[1]["section"], json!(1));

    let graded = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "preview.update",
        json!({ "batchId": batch_id, "seq": 3, "action": "setGrade", "value": 95 }),
    );
    assert_eq!(graded["row"]["newValue"], json!("95"));

    let fixed = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "preview.update",
        json!({ "batchId": batch_id, "seq": 1, "action": "manualFix", "sheet": "Sheet2", "row": 3 }),
    );
    assert_eq!(fixed["row"]["matchStatus"], json!("manuallyFixed"));
    assert_eq!(fixed["row"]["sheet"], json!("Sheet2"));
    assert_eq!(fixed["row"]["targetCell"], json!("C3"));
    assert_eq!(fixed["row"]["resolvedName"], json!("Ann Lee (other)"));
    assert_eq!(fixed["summary"]["manuallyFixed"], json!(1));

    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "preview.apply",
        json!({ "batchId": batch_id }),
    );
    assert_eq!(applied["written"], json!(3));
    assert_eq!(applied["highlight"], json!(null));

    let export = request_ok(&mut stdin, &mut reader, "6", "workbook.export", json!({}));
    let sheets = export["document"]["sheets"].as_array().expect("sheets");
    assert_eq!(exported_cell(&sheets[1], 3, 3), json!("A+"));
    assert_eq!(exported_cell(&sheets[1], 2, 3), json!("B"));
    assert_eq!(exported_cell(&sheets[0], 3, 3), json!("95"));
    assert!(exported_cell(&sheets[0], 2, 3).is_null());

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn applying_one_preview_makes_older_previews_stale() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workbook.open",
        json!({ "document": roster_document() }),
    );
    let params = json!({ "columnKey": "unknown::W1", "task": "mark", "text": "888888" });
    let first = request_ok(&mut stdin, &mut reader, "2", "preview.create", params.clone());
    let second = request_ok(&mut stdin, &mut reader, "3", "preview.create", params);
    assert_ne!(first["batchId"], second["batchId"]);

    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "preview.apply",
        json!({ "batchId": first["batchId"] }),
    );
    let stale = request(
        &mut stdin,
        &mut reader,
        "5",
        "preview.apply",
        json!({ "batchId": second["batchId"] }),
    );
    assert_eq!(error_code(&stale), "stale_preview");
    assert!(stale["error"]["details"]["previewRevision"].is_u64());

    // Stale batches stay around until cancelled.
    request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "preview.cancel",
        json!({ "batchId": second["batchId"] }),
    );
    let health = request_ok(&mut stdin, &mut reader, "7", "health", json!({}));
    assert_eq!(health["pendingPreviews"], json!(0));

    drop(stdin);
    let _ = child.wait();
}
