// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for QR check-in
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Scanning one code from a camera (or image files)
//! - Decoding a code from a single image

use qr_checkin::backends::camera::BackendKind;
use qr_checkin::backends::camera::still::load_image_frame;
use qr_checkin::errors::CaptureErrorKind;
use qr_checkin::frame_processor::sampling::sample_frame;
use qr_checkin::frame_processor::{RqrrDecoder, StrategyChain};
use qr_checkin::session::LogReporter;
use qr_checkin::{
    Classifier, DeviceCatalog, QualityTier, ScanOutcome, ScannerConfig, SessionController,
    SessionError, get_backend,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Options of the `scan` command
pub struct ScanArgs {
    pub device: Option<String>,
    pub quality: Option<QualityTier>,
    pub context: Option<u64>,
    pub torch: bool,
    pub images: Vec<PathBuf>,
}

/// List all available cameras
pub fn list_cameras(config: ScannerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut catalog = DeviceCatalog::new(get_backend(&config));
    let devices = catalog.list_devices()?;

    if devices.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    let default_id = catalog
        .default_device(config.preferred_device.as_deref())
        .map(|d| d.id.clone());

    println!("Available cameras:");
    println!();
    for device in &devices {
        let marker = if Some(&device.id) == default_id.as_ref() {
            "*"
        } else {
            " "
        };
        println!("{} {}  {}", marker, device.id, device.label);
        println!("      Role: {} ({})", device.role, device.facing_hint);
    }
    println!();

    Ok(())
}

/// Run one scan session and print the outcome
pub fn scan(mut config: ScannerConfig, mut args: ScanArgs) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(quality) = args.quality {
        config.quality = quality;
    }
    if args.context.is_some() {
        config.context_id = args.context;
    }
    if !args.images.is_empty() {
        config.backend = BackendKind::Still;
        config.still_images = std::mem::take(&mut args.images);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_scan(config, args))
}

async fn run_scan(config: ScannerConfig, args: ScanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let report = config.context_id.is_some();
    let controller = SessionController::new(get_backend(&config), config);

    if let Some(id) = &args.device {
        controller.select_device(id).await?;
    }

    start_with_recovery(&controller).await?;
    if let Some(device) = controller.snapshot().device {
        eprintln!("Scanning with {} ({})", device.label, device.id);
    }

    if args.torch && !controller.set_torch(true).await {
        eprintln!("Torch not available on this camera");
    }

    let result = tokio::select! {
        result = scan_once(&controller, report) => result,
        _ = tokio::signal::ctrl_c() => {
            controller.stop().await?;
            Err(SessionError::Cancelled)
        }
    };

    match result {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Err(SessionError::Cancelled) => {
            eprintln!("Scan stopped.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn scan_once(controller: &SessionController, report: bool) -> Result<ScanOutcome, SessionError> {
    if report {
        let (outcome, _) = controller.scan_and_report(&LogReporter).await?;
        Ok(outcome)
    } else {
        controller.scan().await
    }
}

/// Start, recovering once from a busy device and stepping down the
/// quality tier while the camera cannot satisfy it
async fn start_with_recovery(controller: &SessionController) -> Result<(), SessionError> {
    let mut retried_busy = false;
    loop {
        let err = match controller.start().await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        match err.capture_kind() {
            Some(CaptureErrorKind::DeviceBusy) if !retried_busy => {
                eprintln!("Camera busy, retrying...");
                retried_busy = true;
                controller.retry_after_busy_error().await?;
            }
            Some(CaptureErrorKind::ConstraintUnsatisfiable) => {
                let Some(looser) = controller.snapshot().quality.looser() else {
                    return Err(err);
                };
                eprintln!("Camera cannot deliver this quality, trying {}", looser);
                controller.change_quality(looser).await?;
            }
            _ => return Err(err),
        }
    }
}

/// Decode a code from a single image file
pub fn decode_image(config: ScannerConfig, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let frame = load_image_frame(path, 0)?;
    let sampled = sample_frame(&frame, config.max_decode_dimension)?;
    let chain = StrategyChain::standard(Arc::new(RqrrDecoder::new()), config.contrast_gain);

    let Some(result) = chain.run(&sampled) else {
        return Err(format!("No QR code found in {}", path.display()).into());
    };

    let classifier = Classifier::new(config.identifier_keys.iter().cloned());
    let outcome = classifier.classify(&result);
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}
