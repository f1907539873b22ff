use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use sha2::{Digest, Sha256};

fn binary_path() -> PathBuf {
    std::env::var("CARGO_BIN_EXE_sheet-verify")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            let target_base = std::env::var("CARGO_TARGET_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    manifest_dir
                        .parent()
                        .and_then(|p| p.parent())
                        .map(|p| p.join("target"))
                        .expect("failed to determine workspace target directory")
                });

            let mut path = target_base;
            path.push("debug");
            path.push(if cfg!(windows) { "sheet-verify.exe" } else { "sheet-verify" });
            path
        })
}

fn write_record_line(image_path: &std::path::Path) -> String {
    let bytes = std::fs::read(image_path).expect("reading fixture image");
    let hash = hex::encode(Sha256::digest(&bytes));

    format!(
        r#"{{"id":"rec-1","document_id":"doc-1","source_path":"{}","content_hash":"{}","lot_no":"1234","auction_date":"2026-01-15","auction_venue":"USS Tokyo","score":"4","score_numeric":4.0,"final_bid_yen":500000,"full_text":"","damage_locations":[],"evidence":{{"lot_no":{{"value":"1234","confidence":0.99,"bbox":null,"crop_path":null,"source":"header"}},"auction_date":{{"value":"2026-01-15","confidence":0.98,"bbox":null,"crop_path":null,"source":"header"}},"auction_venue":{{"value":"USS Tokyo","confidence":0.97,"bbox":null,"crop_path":null,"source":"header"}},"score":{{"value":"4","confidence":0.95,"bbox":null,"crop_path":null,"source":"header"}},"final_bid":{{"value":"500000","confidence":0.96,"bbox":null,"crop_path":null,"source":"header"}}}},"evidence_meta":{{"header_engine":"mock","sheet_engine":"mock","sheet_mileage_km":null,"sheet_mileage_raw":null}},"needs_review":false,"review_reason":null}}"#,
        image_path.display().to_string().replace('\\', "\\\\"),
        hash,
    )
}

#[test]
fn verifies_a_clean_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image_path = dir.path().join("sample.png");
    std::fs::write(&image_path, b"not a real png, just bytes to hash").expect("write fixture image");

    let records_path = dir.path().join("records.jsonl");
    let mut f = std::fs::File::create(&records_path).expect("create records file");
    writeln!(f, "{}", write_record_line(&image_path)).expect("write record line");
    drop(f);

    let output = Command::new(binary_path())
        .arg(&records_path)
        .output()
        .expect("failed to invoke sheet-verify binary");

    assert!(
        output.status.success(),
        "binary failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("VERIFIED"), "unexpected stdout: {}", stdout);
}

#[test]
fn flags_a_tampered_image() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image_path = dir.path().join("sample.png");
    std::fs::write(&image_path, b"original bytes").expect("write fixture image");

    let records_path = dir.path().join("records.jsonl");
    let mut f = std::fs::File::create(&records_path).expect("create records file");
    writeln!(f, "{}", write_record_line(&image_path)).expect("write record line");
    drop(f);

    // Tamper with the image after its hash was recorded.
    std::fs::write(&image_path, b"tampered bytes").expect("overwrite fixture image");

    let output = Command::new(binary_path())
        .arg(&records_path)
        .output()
        .expect("failed to invoke sheet-verify binary");

    assert!(!output.status.success(), "expected failure exit code for tampered image");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("FAILED"), "unexpected stdout: {}", stdout);
}
