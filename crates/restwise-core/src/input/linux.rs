//! evdev capture: one reader thread per readable `/dev/input/event*` node.
//!
//! Reading the nodes usually requires membership of the `input` group; when
//! nothing can be opened the source reports itself unavailable.

use async_trait::async_trait;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{EventSink, InputEvent, InputSource};
use crate::error::CoreError;

const EVENT_SIZE: usize = std::mem::size_of::<libc::input_event>();

const EV_KEY: u16 = 0x01;
const EV_REL: u16 = 0x02;
const REL_HWHEEL: u16 = 0x06;
const REL_WHEEL: u16 = 0x08;
const BTN_LEFT: u16 = 0x110;
const BTN_TASK: u16 = 0x117;
const KEY_DOWN: i32 = 1;

pub struct EvdevSource {
    dir: PathBuf,
    cancel: Option<CancellationToken>,
    readers: Vec<JoinHandle<()>>,
}

impl EvdevSource {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cancel: None,
            readers: Vec::new(),
        }
    }

    fn open_devices(&self) -> Result<Vec<(PathBuf, File)>, CoreError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            CoreError::EventSourceUnavailable(format!("cannot list {}: {e}", self.dir.display()))
        })?;

        let mut devices = Vec::new();
        let mut last_error = None;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_event_node = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("event"));
            if !is_event_node {
                continue;
            }
            match File::open(&path) {
                Ok(file) => devices.push((path, file)),
                Err(e) => last_error = Some(format!("{}: {e}", path.display())),
            }
        }

        if devices.is_empty() {
            let reason = last_error.unwrap_or_else(|| {
                format!("no event devices under {}", self.dir.display())
            });
            return Err(CoreError::EventSourceUnavailable(reason));
        }
        Ok(devices)
    }
}

#[async_trait]
impl InputSource for EvdevSource {
    fn name(&self) -> &'static str {
        "evdev"
    }

    async fn start(&mut self, sink: EventSink) -> Result<(), CoreError> {
        let devices = self.open_devices()?;
        let cancel = CancellationToken::new();

        for (path, file) in devices {
            let sink = sink.clone();
            let cancel = cancel.clone();
            let spawned = std::thread::Builder::new()
                .name("restwise-evdev".to_string())
                .spawn(move || read_device(&path, file, &sink, &cancel));
            match spawned {
                Ok(handle) => self.readers.push(handle),
                Err(e) => log::warn!("Failed to spawn evdev reader: {e}"),
            }
        }

        log::info!("Listening on {} input devices", self.readers.len());
        self.cancel = Some(cancel);
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        // Readers block in read(2) and exit on their next event; they are not joined.
        self.readers.clear();
    }
}

fn read_device(path: &Path, mut file: File, sink: &EventSink, cancel: &CancellationToken) {
    let mut buf = [0u8; EVENT_SIZE];
    while !cancel.is_cancelled() && !sink.is_closed() {
        if let Err(e) = file.read_exact(&mut buf) {
            log::debug!("Stopped reading {}: {e}", path.display());
            return;
        }
        if let Some(event) = decode(&buf) {
            sink.push(event);
        }
    }
}

/// Decode one `struct input_event`. Type, code and value are the trailing
/// 8 bytes regardless of the size of the leading timestamp.
fn decode(buf: &[u8; EVENT_SIZE]) -> Option<InputEvent> {
    let tail = EVENT_SIZE - 8;
    let kind = u16::from_ne_bytes([buf[tail], buf[tail + 1]]);
    let code = u16::from_ne_bytes([buf[tail + 2], buf[tail + 3]]);
    let value = i32::from_ne_bytes([buf[tail + 4], buf[tail + 5], buf[tail + 6], buf[tail + 7]]);

    match kind {
        EV_KEY if value == KEY_DOWN => {
            if (BTN_LEFT..=BTN_TASK).contains(&code) {
                Some(InputEvent::MouseClick)
            } else {
                Some(InputEvent::KeyPress)
            }
        }
        EV_REL if code == REL_WHEEL || code == REL_HWHEEL => Some(InputEvent::MouseScroll),
        EV_REL => Some(InputEvent::MouseMove),
        _ => None,
    }
}
