//! Drives the `kube-mcp` binary over its stdin/stdout.

#![cfg(unix)]

use std::io::{BufRead, BufReader, Write};
use std::os::unix::fs::PermissionsExt;
use std::process::{Command, Stdio};

use serde_json::{Value, json};

#[test]
fn handshake_list_and_call_over_stdio() {
    let dir = tempfile::tempdir().unwrap();
    let kubectl = dir.path().join("kubectl");
    std::fs::write(&kubectl, "#!/bin/sh\necho '{\"items\":[1,2]}'\n").unwrap();
    std::fs::set_permissions(&kubectl, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_kube-mcp"))
        .arg("--kubectl")
        .arg(&kubectl)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let mut stdin = child.stdin.take().unwrap();
    let requests = [
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"protocolVersion": "2024-11-05"}}),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {
            "name": "run_kubectl_command",
            "arguments": {"command": "kubectl get pods -o json"}
        }}),
    ];
    for request in &requests {
        writeln!(stdin, "{request}").unwrap();
    }
    // Closing stdin ends the serve loop.
    drop(stdin);

    let stdout = BufReader::new(child.stdout.take().unwrap());
    let responses: Vec<Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(&l.unwrap()).unwrap())
        .collect();
    let status = child.wait().unwrap();

    assert!(status.success());
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], "kubernetes-cli-server");
    assert_eq!(responses[1]["result"]["tools"].as_array().unwrap().len(), 2);

    let call = &responses[2]["result"];
    assert_eq!(call["isError"], false);
    let payload: Value = serde_json::from_str(call["result"].as_str().unwrap()).unwrap();
    assert_eq!(payload["output_format"], "json");
    assert_eq!(payload["parsed_output"], json!({"items": [1, 2]}));
}
