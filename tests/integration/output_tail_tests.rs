//! Integration tests for reading the tail of a rover's output file.

use super::test_helpers::{harness, LONG_RUNNING_ENGINE, ROVER_SERIAL};

fn write_output(h: &super::test_helpers::Harness, content: &str) {
    let path = h.config.output_path_for(ROVER_SERIAL);
    std::fs::create_dir_all(path.parent().expect("output dir")).expect("create output dir");
    std::fs::write(path, content).expect("write output");
}

#[tokio::test]
async fn short_file_is_returned_whole_in_order() {
    let h = harness(LONG_RUNNING_ENGINE);
    write_output(&h, "% header\nfirst\n  second  \nthird\n");

    let tail = h.supervisor.get_output_tail(ROVER_SERIAL, 10).await;
    assert_eq!(tail, vec!["% header", "first", "second", "third"]);
}

#[tokio::test]
async fn long_file_is_limited_to_requested_lines() {
    let h = harness(LONG_RUNNING_ENGINE);
    let content: String = (1..=50).map(|i| format!("line {i}\n")).collect();
    write_output(&h, &content);

    let tail = h.supervisor.get_output_tail(ROVER_SERIAL, 3).await;
    assert_eq!(tail, vec!["line 48", "line 49", "line 50"]);

    let none = h.supervisor.get_output_tail(ROVER_SERIAL, 0).await;
    assert!(none.is_empty());
}

#[tokio::test]
async fn missing_output_file_yields_empty_tail() {
    let h = harness(LONG_RUNNING_ENGINE);
    assert!(h.supervisor.get_output_tail(ROVER_SERIAL, 20).await.is_empty());
    assert!(h.supervisor.get_output_tail("NEVERSEEN", 20).await.is_empty());
}

#[tokio::test]
async fn invalid_serial_yields_single_diagnostic_line() {
    let h = harness(LONG_RUNNING_ENGINE);
    let tail = h.supervisor.get_output_tail("../etc/passwd", 20).await;
    assert_eq!(tail.len(), 1);
    assert!(tail[0].starts_with("device:"), "tail: {tail:?}");
}

#[tokio::test]
async fn unreadable_output_yields_single_diagnostic_line() {
    let h = harness(LONG_RUNNING_ENGINE);
    // A directory where the file should be cannot be read as a file.
    std::fs::create_dir_all(h.config.output_path_for(ROVER_SERIAL)).expect("mkdir");

    let tail = h.supervisor.get_output_tail(ROVER_SERIAL, 20).await;
    assert_eq!(tail.len(), 1);
    assert!(tail[0].starts_with("failed to read output file"), "tail: {tail:?}");
}

#[tokio::test]
async fn invalid_utf8_is_replaced_not_rejected() {
    let h = harness(LONG_RUNNING_ENGINE);
    let path = h.config.output_path_for(ROVER_SERIAL);
    std::fs::create_dir_all(path.parent().expect("output dir")).expect("mkdir");
    std::fs::write(&path, b"ok\n\xff\xfe bad\n").expect("write");

    let tail = h.supervisor.get_output_tail(ROVER_SERIAL, 5).await;
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0], "ok");
    assert!(tail[1].ends_with("bad"));
}
