use crate::domain::{
    config::LoggerConfig,
    error::{RawComError, RawComResult},
};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Append-only file recording raw device traffic.
#[derive(Debug)]
pub struct TrafficLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl TrafficLog {
    pub fn create(path: PathBuf) -> RawComResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| RawComError::config(format!("Failed to open log file {}: {}", path.display(), e)))?;
        info!("Logging device traffic to {}", path.display());
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, data: &[u8]) {
        let result = match self.file.lock() {
            Ok(mut file) => file.write_all(data),
            Err(_) => return,
        };
        if let Err(e) = result {
            warn!("Failed to write log file {}: {}", self.path.display(), e);
        }
    }
}

/// The optional devlog (inbound only) and talklog (both directions) files of a session.
#[derive(Debug, Default)]
pub struct LogSinks {
    devlog: Option<TrafficLog>,
    talklog: Option<TrafficLog>,
}

impl LogSinks {
    /// Create the files enabled in `config`, named after the device and the current time.
    pub fn open(device_name: &str, config: &LoggerConfig) -> RawComResult<Self> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();

        let devlog = if config.devlog {
            let path = config.directory.join(format!("dev_{}_{}.log", device_name, stamp));
            Some(TrafficLog::create(path)?)
        } else {
            None
        };
        let talklog = if config.talklog {
            let path = config.directory.join(format!("talk_{}_{}.log", device_name, stamp));
            Some(TrafficLog::create(path)?)
        } else {
            None
        };

        Ok(Self { devlog, talklog })
    }

    pub fn devlog(&self) -> Option<&TrafficLog> {
        self.devlog.as_ref()
    }

    pub fn talklog(&self) -> Option<&TrafficLog> {
        self.talklog.as_ref()
    }

    /// Bytes that came from the device
    pub fn record_inbound(&self, data: &[u8]) {
        if let Some(log) = &self.devlog {
            log.append(data);
        }
        if let Some(log) = &self.talklog {
            log.append(data);
        }
    }

    /// Bytes that were sent to the device
    pub fn record_outbound(&self, data: &[u8]) {
        if let Some(log) = &self.talklog {
            log.append(data);
        }
    }
}
