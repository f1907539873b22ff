//! Batch CLI: run the extraction pipeline over a directory of auction
//! sheet images, writing one JSON record per line (spec §2 ADDED
//! binary). Content-hash dedup via `InMemoryRecordStore`, matching the
//! upload-dedup contract of spec §5/§6.

use anyhow::{Context, Result};
use clap::Parser;
use sha2::{Digest, Sha256};
use sheet_extract::config::Settings;
use sheet_extract::ocr::engine::{MockLineOcrBackend, MockVlBackend};
use sheet_extract::ocr::{OcrRouter, VlOptions};
use sheet_extract::storage::{InMemoryObjectStore, InMemoryRecordStore, RecordStore};
use sheet_extract::{pipeline, types::AuctionRecord};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "extract-sheet", about = "Batch-extract auction-sheet records from a directory of images")]
struct Args {
    /// Directory to walk for input images.
    input_dir: PathBuf,

    /// Output JSONL path; defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Optional TOML config file (see `config::Settings`).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(serde::Serialize)]
struct OutputRecord {
    id: String,
    document_id: String,
    source_path: String,
    content_hash: String,
    #[serde(flatten)]
    record: AuctionRecord,
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref());

    eprintln!(
        "[extract-sheet] pipeline_version={} ocr_device={:?}",
        settings.pipeline_version, settings.ocr_device
    );
    eprintln!("[extract-sheet] no OCR engine adapters configured; using empty-response stand-ins (wire a real VlBackend/LineOcrBackend for production use)");

    let router = default_router();
    let vl_opts = VlOptions {
        max_new_tokens: settings.vl_max_new_tokens,
        max_pixels: settings.vl_max_pixels,
        min_pixels: settings.vl_min_pixels,
        use_ocr_for_image_block: true,
    };
    let record_store = InMemoryRecordStore::new();
    let evidence_store = InMemoryObjectStore::new();

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?),
        None => Box::new(std::io::stdout()),
    };

    for entry in WalkDir::new(&args.input_dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else { continue };
        if !IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            continue;
        }

        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let content_hash = hex::encode(Sha256::digest(&bytes));

        if let Some(existing_id) = record_store.find_by_hash(&content_hash)? {
            eprintln!("[extract-sheet] skip duplicate {} (matches {existing_id})", path.display());
            continue;
        }

        let document_id = Uuid::new_v4().to_string();
        match pipeline::run(&bytes, &router, &vl_opts, &document_id, &evidence_store) {
            Ok(record) => {
                record_store.insert(&document_id, &content_hash, record.clone())?;
                let output = OutputRecord {
                    id: Uuid::new_v4().to_string(),
                    document_id,
                    source_path: path.display().to_string(),
                    content_hash,
                    record,
                };
                writeln!(out, "{}", serde_json::to_string(&output)?)?;
            }
            Err(err) => {
                eprintln!("[extract-sheet] failed {}: {err}", path.display());
            }
        }
    }

    Ok(())
}

/// Engine adapters are external services per spec §1/§6; this default
/// wiring uses empty-response stand-ins purely so the binary is
/// runnable end-to-end without a live model server.
fn default_router() -> OcrRouter {
    let vl = Arc::new(MockVlBackend::new(Vec::new()));
    let paddle = Arc::new(MockLineOcrBackend::new(Vec::new()));
    let tesseract = Arc::new(MockLineOcrBackend::new(Vec::new()));
    OcrRouter::new(vl, vec![paddle, tesseract])
}
