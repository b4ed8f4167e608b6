use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write_page(dir: &Path) -> PathBuf {
    let filler = "filler text ".repeat(12);
    let html = format!(
        "<html><body>\
         <p id=\"alpha\">Alpha section. {filler}</p>\
         <p id=\"beta\">Beta section. {filler}</p>\
         </body></html>"
    );
    let path = dir.join("page.html");
    fs::write(&path, html).expect("write page");
    path
}

fn outliner() -> Command {
    Command::cargo_bin("outliner").expect("binary")
}

#[test]
fn outline_labels_every_chunk() {
    let temp = tempdir().expect("tempdir");
    let page = write_page(temp.path());

    outliner()
        .arg("outline")
        .arg(&page)
        .arg("--host")
        .arg("blog.example")
        .assert()
        .success()
        .stdout(predicate::str::contains("Alphasection."))
        .stdout(predicate::str::contains("Betasection."))
        .stdout(predicate::str::contains("[alpha]"))
        .stdout(predicate::str::contains("[beta]"))
        .stderr(predicate::str::contains("2 chunks via"));
}

#[test]
fn tiny_batches_still_settle_the_whole_outline() {
    let temp = tempdir().expect("tempdir");
    let page = write_page(temp.path());

    // One chunk per batch, so the outline settles only if every push
    // drives a re-fetch that queues the batch after it.
    outliner()
        .arg("outline")
        .arg(&page)
        .arg("--host")
        .arg("blog.example")
        .arg("--batch-size")
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains("Alphasection."))
        .stdout(predicate::str::contains("Betasection."))
        .stderr(predicate::str::contains("finished"));
}

#[test]
fn chunks_previews_the_segmentation() {
    let temp = tempdir().expect("tempdir");
    let page = write_page(temp.path());

    outliner()
        .arg("chunks")
        .arg(&page)
        .arg("--host")
        .arg("blog.example")
        .assert()
        .success()
        .stdout(predicate::str::contains("[alpha]"))
        .stdout(predicate::str::contains("Alpha section. filler"));
}

#[test]
fn segmenter_overrides_change_the_packing() {
    let temp = tempdir().expect("tempdir");
    let html = format!(
        "<html><body><p>{}</p><p>{}</p><p>{}</p></body></html>",
        "a".repeat(40),
        "b".repeat(40),
        "c".repeat(40),
    );
    let page = temp.path().join("page.html");
    fs::write(&page, html).expect("write page");
    let config = temp.path().join("segmenter.toml");
    fs::write(&config, "min_chunk_chars = 10\n").expect("write config");

    // Three 40-char paragraphs pack into one chunk under the default
    // minimum, and stand alone under the lowered one.
    outliner()
        .arg("chunks")
        .arg(&page)
        .assert()
        .success()
        .stderr(predicate::str::contains("1 chunks via"));

    outliner()
        .arg("chunks")
        .arg(&page)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stderr(predicate::str::contains("3 chunks via"));
}

#[test]
fn missing_page_fails_with_its_path() {
    outliner()
        .arg("outline")
        .arg("/nonexistent/page.html")
        .assert()
        .failure()
        .stderr(predicate::str::contains("/nonexistent/page.html"));
}

#[test]
fn inverted_config_bounds_are_rejected() {
    let temp = tempdir().expect("tempdir");
    let page = write_page(temp.path());
    let config = temp.path().join("segmenter.toml");
    fs::write(&config, "min_chunk_chars = 5000\n").expect("write config");

    outliner()
        .arg("chunks")
        .arg(&page)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("min_chunk_chars"));
}

#[test]
fn zero_batch_size_is_rejected() {
    let temp = tempdir().expect("tempdir");
    let page = write_page(temp.path());

    outliner()
        .arg("outline")
        .arg(&page)
        .arg("--batch-size")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("batch_size"));
}
