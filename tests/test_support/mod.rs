#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_markgridd");
    let mut child = Command::new(exe)
        .env_remove("MARKGRIDD_CONFIG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn markgridd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

pub fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

/// Two roster sheets sharing a "W1" column; 777777 appears twice on Sheet1.
pub fn roster_document() -> serde_json::Value {
    json!({
        "sheets": [
            {
                "name": "Sheet1",
                "rows": [
                    ["ID", "Name", "W1"],
                    [555555, "Ann Lee", null],
                    [666666, "Bo Chan", "x"],
                    [777777, "Cy Diaz", null],
                    [777777, "Cy Diaz (dup)", null]
                ]
            },
            {
                "name": "Sheet2",
                "rows": [
                    ["ID", "Name", "W1"],
                    [888888, "Di Park", null],
                    [555555, "Ann Lee (other)", null]
                ]
            }
        ]
    })
}

/// Cell value from an exported sheet, 1-based.
pub fn exported_cell(sheet: &serde_json::Value, row: usize, col: usize) -> serde_json::Value {
    sheet
        .get("rows")
        .and_then(|r| r.get(row - 1))
        .and_then(|r| r.get(col - 1))
        .cloned()
        .unwrap_or(serde_json::Value::Null)
}
