// SPDX-License-Identifier: AGPL-3.0
// PicMover CLI - subcommand implementations

use picmover_core::{
    lan_candidates, probe_peer, scan as scan_hosts, AppError, BackupMode, BackupOrchestrator,
    BackupStatus, ClientSettings, DirectoryLibrary, FailureTracker, JsonFailureStore,
    SettingsStore,
};
use std::path::PathBuf;
use std::sync::Arc;

fn load_settings(config: Option<PathBuf>) -> Result<ClientSettings, AppError> {
    let store = match config {
        Some(path) => SettingsStore::at(path)?,
        None => SettingsStore::new()?,
    };
    let settings = store.get();
    settings.validate()?;
    Ok(settings)
}

fn open_tracker() -> Result<FailureTracker, AppError> {
    let store = JsonFailureStore::new()?;
    tracing::debug!("Failed photos file: {:?}", store.path());
    Ok(FailureTracker::new(store))
}

pub async fn scan(config: Option<PathBuf>, hosts: Vec<String>) -> Result<(), AppError> {
    let settings = load_settings(config)?;
    let hosts = if hosts.is_empty() {
        lan_candidates()
    } else {
        hosts
    };

    println!("Scanning {} hosts on port {}...", hosts.len(), settings.port);
    let found = scan_hosts(&hosts, &settings).await;

    if found.is_empty() {
        println!("No PicMover server found in LAN");
    } else {
        for peer in found {
            println!("{}\t{}", peer.host, peer.name);
        }
    }
    Ok(())
}

pub async fn backup(
    config: Option<PathBuf>,
    host: String,
    dir: PathBuf,
    failed_only: bool,
    port: Option<u16>,
) -> Result<(), AppError> {
    let mut settings = load_settings(config)?;
    if let Some(port) = port {
        settings.port = port;
    }

    let peer = probe_peer(&host, &settings).await?;
    println!("Server Name: {}", peer.name);
    println!("IP Address: {}", peer.host);
    println!("Port: {}", settings.port);

    let tracker = Arc::new(open_tracker()?);
    let mode = if failed_only {
        if tracker.count() == 0 {
            println!("No failed photos to retry");
            return Ok(());
        }
        println!("Retrying {} failed photos", tracker.count());
        BackupMode::FailedOnly
    } else {
        BackupMode::All
    };

    let library = Arc::new(DirectoryLibrary::new(dir));
    let backup = BackupOrchestrator::new(peer, settings, library, tracker.clone())?;

    let mut updates = backup.subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let status = updates.borrow_and_update().clone();
            render(&status);
            if status.state.is_terminal() {
                break;
            }
        }
    });

    let cancel = backup.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling backup");
            cancel.cancel();
        }
    });

    let result = backup.run(mode).await;
    if let Err(e) = printer.await {
        tracing::warn!("Status printer stopped: {}", e);
    }

    let summary = result?;
    println!(
        "Sent {} photos in {} batches, {} failed ({} waiting for retry)",
        summary.submitted,
        summary.batches,
        summary.failed(),
        tracker.count()
    );
    Ok(())
}

fn render(status: &BackupStatus) {
    println!("[{}] {}", status.state.action_label(), status.description);
}

pub fn list_failed() -> Result<(), AppError> {
    let tracker = open_tracker()?;
    let mut identifiers = tracker.list();
    identifiers.sort();

    for id in &identifiers {
        println!("{}", id);
    }
    println!("{} failed photos", identifiers.len());
    Ok(())
}

pub fn clear_failed() -> Result<(), AppError> {
    let tracker = open_tracker()?;
    let count = tracker.count();
    tracker.clear();
    tracker.try_save()?;
    println!("Cleared {} failed photos", count);
    Ok(())
}
