use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::tempdir;

fn cmdq(db: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cmdq").unwrap();
    cmd.env_remove("CMDQ_DEBUG_LOG")
        .env_remove("CMDQ_CONFIG")
        .arg("--db")
        .arg(db);
    cmd
}

fn parse_json_output(output: &[u8]) -> Value {
    serde_json::from_str(&String::from_utf8_lossy(output)).expect("Failed to parse JSON output")
}

fn run_json(db: &Path, args: &[&str]) -> Value {
    let output = cmdq(db)
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json = parse_json_output(&output);
    assert!(json["success"].as_bool().unwrap());
    json
}

fn run_error(db: &Path, args: &[&str]) -> Value {
    let output = cmdq(db)
        .args(args)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let json = parse_json_output(&output);
    assert!(!json["success"].as_bool().unwrap());
    json
}

mod command_tests {
    use super::*;

    #[test]
    fn test_command_list_empty_before_sync() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("cmdq.db");

        let json = run_json(&db, &["command", "list"]);
        assert_eq!(json["data"]["count"], 0);
    }

    #[test]
    fn test_command_sync_registers_builtins() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("cmdq.db");

        let json = run_json(&db, &["command", "sync"]);
        assert_eq!(json["data"]["count"], 3);

        let json = run_json(&db, &["command", "list"]);
        let paths: Vec<&str> = json["data"]["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["path"].as_str().unwrap())
            .collect();
        assert!(paths.contains(&"system echo"));
        assert!(paths.contains(&"system sleep"));
        assert!(paths.contains(&"system fail"));
    }
}

mod queue_tests {
    use super::*;

    #[test]
    fn test_enqueue_and_process() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("cmdq.db");

        let json = run_json(&db, &["enqueue", "system echo --text=hello"]);
        assert_eq!(json["data"]["state"], "Pending");
        assert_eq!(json["data"]["path"], "system echo");
        assert_eq!(json["data"]["args"], "--text=hello");
        let id = json["data"]["id"].as_i64().unwrap().to_string();

        let json = run_json(&db, &["queue", "process"]);
        assert_eq!(json["data"]["processed"], 1);

        let json = run_json(&db, &["queue", "get", "--id", &id]);
        assert_eq!(json["data"]["state"], "Completed");
        assert_eq!(json["data"]["output"], "hello");
        assert_eq!(json["data"]["attempts"], 1);
    }

    #[test]
    fn test_failed_command_can_be_retried() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("cmdq.db");

        let json = run_json(&db, &["enqueue", "system fail --message=boom"]);
        let id = json["data"]["id"].as_i64().unwrap().to_string();
        run_json(&db, &["queue", "process"]);

        let json = run_json(&db, &["queue", "list", "--state", "failed"]);
        assert_eq!(json["data"]["count"], 1);
        assert!(json["data"]["items"][0]["error"]
            .as_str()
            .unwrap()
            .contains("boom"));

        let json = run_json(&db, &["queue", "retry", "--id", &id]);
        assert_eq!(json["data"]["state"], "Pending");
        assert!(json["data"]["error"].is_null());
    }

    #[test]
    fn test_unknown_path_fails_when_processed() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("cmdq.db");

        let json = run_json(&db, &["enqueue", "orden pagar --orderId=5"]);
        assert!(json["data"]["registered_command_id"].is_null());
        let id = json["data"]["id"].as_i64().unwrap().to_string();

        run_json(&db, &["queue", "process"]);
        let json = run_json(&db, &["queue", "get", "--id", &id]);
        assert_eq!(json["data"]["state"], "Failed");
    }

    #[test]
    fn test_retry_of_pending_command_is_an_error() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("cmdq.db");

        let json = run_json(&db, &["enqueue", "system echo"]);
        let id = json["data"]["id"].as_i64().unwrap().to_string();

        run_error(&db, &["queue", "retry", "--id", &id]);
    }

    #[test]
    fn test_enqueue_rejects_bad_syntax() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("cmdq.db");

        let json = run_error(&db, &["enqueue", "system echo --text=a stray"]);
        assert!(json["error"].as_str().unwrap().contains("stray"));
    }

    #[test]
    fn test_queue_get_missing() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("cmdq.db");

        cmdq(&db)
            .args(["queue", "get", "--id", "99"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not found"));
    }
}

mod handler_tests {
    use super::*;

    fn setup_handler(db: &Path) {
        run_json(db, &["command", "sync"]);
        run_json(
            db,
            &[
                "event-type",
                "register",
                "--code",
                "pedido_creado",
                "--name",
                "Order created",
            ],
        );
        run_json(
            db,
            &[
                "handler",
                "register",
                "--code",
                "notify",
                "--path",
                "system echo",
            ],
        );
    }

    #[test]
    fn test_event_fans_out_to_handler() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("cmdq.db");
        setup_handler(&db);

        let json = run_json(
            &db,
            &[
                "trigger",
                "on-event",
                "--handler",
                "notify",
                "--event",
                "pedido_creado",
            ],
        );
        assert!(json["data"]["event_type_id"].is_i64());
        assert!(json["data"]["interval_expr"].is_null());

        run_json(
            &db,
            &[
                "event",
                "emit",
                "--type",
                "pedido_creado",
                "--payload",
                r#"{"order":7}"#,
            ],
        );
        let json = run_json(&db, &["event", "process"]);
        assert_eq!(json["data"]["processed"], 1);

        let json = run_json(&db, &["event", "pending"]);
        assert_eq!(json["data"]["count"], 0);

        run_json(&db, &["queue", "process"]);
        let json = run_json(&db, &["queue", "list", "--state", "completed"]);
        assert_eq!(json["data"]["count"], 1);
        assert_eq!(json["data"]["items"][0]["output"], r#"{"order":7}"#);
    }

    #[test]
    fn test_handler_for_unregistered_command_is_rejected() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("cmdq.db");

        let json = run_error(
            &db,
            &[
                "handler",
                "register",
                "--code",
                "ghost",
                "--path",
                "mail send",
            ],
        );
        assert!(json["error"].as_str().unwrap().contains("mail send"));
    }

    #[test]
    fn test_scheduled_trigger_validates_interval() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("cmdq.db");
        setup_handler(&db);

        run_error(
            &db,
            &[
                "trigger",
                "scheduled",
                "--handler",
                "notify",
                "--interval",
                "every hour",
            ],
        );

        let json = run_json(
            &db,
            &[
                "trigger",
                "scheduled",
                "--handler",
                "notify",
                "--interval",
                "00:01:00:00",
            ],
        );
        assert_eq!(json["data"]["interval_expr"], "00:01:00:00");

        let json = run_json(&db, &["trigger", "list", "--handler", "notify"]);
        assert_eq!(json["data"]["count"], 1);
    }

    #[test]
    fn test_handler_list_and_deactivate() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("cmdq.db");
        setup_handler(&db);

        let json = run_json(&db, &["handler", "list"]);
        assert_eq!(json["data"]["count"], 1);
        assert_eq!(json["data"]["items"][0]["path"], "system echo");

        run_json(&db, &["handler", "deactivate", "--code", "notify"]);
        let json = run_json(&db, &["handler", "list"]);
        assert_eq!(json["data"]["count"], 0);
    }
}

#[test]
fn test_invalid_config_file_is_reported() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("cmdq.db");
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "max_parallelism = 0\n").unwrap();

    cmdq(&db)
        .arg("--config")
        .arg(&config)
        .args(["queue", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_parallelism"));
}

#[test]
fn test_completions_bash() {
    let dir = tempdir().unwrap();
    cmdq(&dir.path().join("cmdq.db"))
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cmdq"));
}
