// ===============================
// src/recorder.rs
// ===============================
//
// JSONL journal untuk hasil analisis:
// - Tulis setiap Event ke file .jsonl (append).
// - BufWriter + flush periodik tiap 1s dan/atau tiap 100 event.
// - Otomatis membuat parent directory jika belum ada.
// - Jika tulis gagal, coba reopen file dan lanjut.
//
// ENV: set `RECORD_FILE=/path/to/analyses.jsonl` agar aktif (lihat main.rs).
//
use std::path::Path;

use tokio::{
    fs::{self, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
    time::{interval, timeout, Duration, MissedTickBehavior},
};
use tracing::{error, info, warn};

use crate::domain::Event;
use crate::metrics::JOURNAL_DROPPED;

const FLUSH_EVERY_N_EVENTS: u32 = 100;
const CHANNEL_CAPACITY: usize = 1024;
const FINISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Start the journal task. The task ends (after a final flush) once every
/// clone of the returned sender is dropped.
pub fn spawn(path: String) -> (mpsc::Sender<Event>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<Event>(CHANNEL_CAPACITY);
    (tx, tokio::spawn(run(rx, path)))
}

/// Queue an event without blocking the caller. A full or closed channel
/// drops the event; the drop is logged and counted.
pub fn record(tx: &mpsc::Sender<Event>, ev: Event) -> bool {
    match tx.try_send(ev) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            JOURNAL_DROPPED.with_label_values(&["full"]).inc();
            warn!("recorder: channel full, event dropped");
            false
        }
        Err(TrySendError::Closed(_)) => {
            JOURNAL_DROPPED.with_label_values(&["closed"]).inc();
            warn!("recorder: channel closed, event dropped");
            false
        }
    }
}

/// Wait for the journal task to drain and flush. Call after dropping all senders,
/// before the runtime goes away.
pub async fn finish(task: JoinHandle<()>) {
    match timeout(FINISH_TIMEOUT, task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(?e, "recorder: task failed"),
        Err(_) => warn!(timeout_ms = FINISH_TIMEOUT.as_millis() as u64, "recorder: still running at shutdown, giving up"),
    }
}

async fn open_writer(path: &str) -> std::io::Result<BufWriter<fs::File>> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path).await?;
    Ok(BufWriter::new(file))
}

async fn write_line(writer: &mut BufWriter<fs::File>, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await
}

pub async fn run(mut rx: mpsc::Receiver<Event>, path: String) {
    let mut writer = match open_writer(&path).await {
        Ok(w) => w,
        Err(e) => {
            error!(?e, %path, "recorder: open failed, journal disabled");
            return;
        }
    };
    info!(%path, "recorder: started");

    let mut tick = interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut since_last_flush: u32 = 0;

    loop {
        tokio::select! {
            maybe_ev = rx.recv() => {
                let Some(ev) = maybe_ev else {
                    // Channel closed: flush dan keluar
                    let _ = writer.flush().await;
                    info!("recorder: channel closed, stopped");
                    break;
                };

                let line = match serde_json::to_string(&ev) {
                    Ok(s) => s,
                    Err(e) => {
                        error!(?e, "recorder: serialize error, skip event");
                        continue;
                    }
                };

                if let Err(e) = write_line(&mut writer, &line).await {
                    error!(?e, "recorder: write failed, attempting reopen");
                    match open_writer(&path).await {
                        Ok(w) => writer = w,
                        Err(e2) => {
                            error!(?e2, "recorder: reopen failed, drop event");
                            continue;
                        }
                    }
                    if let Err(e3) = write_line(&mut writer, &line).await {
                        error!(?e3, "recorder: write failed again after reopen, drop event");
                        continue;
                    }
                }

                since_last_flush += 1;
                if since_last_flush >= FLUSH_EVERY_N_EVENTS {
                    let _ = writer.flush().await;
                    since_last_flush = 0;
                }
            }

            _ = tick.tick() => {
                let _ = writer.flush().await;
                since_last_flush = 0;
            }
        }
    }
}
