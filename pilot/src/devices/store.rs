use anyhow::Context;
use chrono::{DateTime, Local};
use image::{Rgb, RgbImage};
use log::{info, warn};
use reflexcore::interface::{PlayHistory, SessionReport};
use reflexcore::prelude::{CollaboratorError, Frame, ResultStore};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Play-history JSON file plus a per-session folder of debug images.
pub struct JsonResultStore {
    report_path: PathBuf,
    debug_dir: PathBuf,
}

impl JsonResultStore {
    /// Rotates any debug folder left by a previous run out of the way, then
    /// creates a fresh one for this session.
    pub fn create(
        report_path: impl Into<PathBuf>,
        debug_dir: impl Into<PathBuf>,
        now: DateTime<Local>,
    ) -> anyhow::Result<Self> {
        let debug_dir = debug_dir.into();
        if let Some(rotated) = rotate_dir(&debug_dir, now)? {
            info!(
                "previous debug images moved to {}",
                rotated.display()
            );
        }
        fs::create_dir_all(&debug_dir)
            .with_context(|| format!("creating debug folder {}", debug_dir.display()))?;

        Ok(Self {
            report_path: report_path.into(),
            debug_dir,
        })
    }

    #[cfg(test)]
    pub fn debug_dir(&self) -> &Path {
        &self.debug_dir
    }

    fn load_history(&self) -> anyhow::Result<PlayHistory> {
        let contents = match fs::read_to_string(&self.report_path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(PlayHistory::default()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("reading {}", self.report_path.display()))
            }
        };

        match PlayHistory::from_json(&contents) {
            Ok(history) => Ok(history),
            Err(err) => {
                let aside = suffixed(
                    &self.report_path,
                    &format!(".corrupt-{}", Local::now().format("%Y%m%d_%H%M%S")),
                );
                warn!(
                    "{} is unreadable ({}); moving it to {} and starting a new history",
                    self.report_path.display(),
                    err,
                    aside.display()
                );
                fs::rename(&self.report_path, &aside)
                    .with_context(|| format!("moving aside {}", self.report_path.display()))?;
                Ok(PlayHistory::default())
            }
        }
    }

    fn write_history(&self, history: &PlayHistory) -> anyhow::Result<()> {
        if let Some(parent) = self.report_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let staging = suffixed(&self.report_path, ".tmp");
        fs::write(&staging, history.to_json_pretty()?)
            .with_context(|| format!("writing {}", staging.display()))?;
        fs::rename(&staging, &self.report_path)
            .with_context(|| format!("replacing {}", self.report_path.display()))?;
        Ok(())
    }
}

impl ResultStore for JsonResultStore {
    fn persist_artifact(
        &mut self,
        frame: &Frame,
        sequence: usize,
        captured_at: DateTime<Local>,
    ) -> Result<PathBuf, CollaboratorError> {
        let path = self.debug_dir.join(artifact_name(sequence, captured_at));
        let image = RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
            Rgb(frame.sample(x, y).unwrap_or([0, 0, 0]))
        });
        image
            .save(&path)
            .map_err(|err| CollaboratorError::Transient(format!("{}: {}", path.display(), err)))?;
        Ok(path)
    }

    fn append_report(&mut self, report: &SessionReport) -> Result<(), CollaboratorError> {
        let mut history = self
            .load_history()
            .map_err(|err| CollaboratorError::Fatal(format!("{:#}", err)))?;
        history
            .append(report)
            .map_err(|err| CollaboratorError::Fatal(err.to_string()))?;
        self.write_history(&history)
            .map_err(|err| CollaboratorError::Fatal(format!("{:#}", err)))?;
        info!(
            "session appended to {} ({} sessions recorded)",
            self.report_path.display(),
            history.len()
        );
        Ok(())
    }
}

/// `jump_0007_20261016_093005_123.png`
pub fn artifact_name(sequence: usize, captured_at: DateTime<Local>) -> String {
    format!(
        "jump_{:04}_{}.png",
        sequence,
        captured_at.format("%Y%m%d_%H%M%S_%3f")
    )
}

/// Renames an existing `dir` to `dir_<timestamp>` (plus a counter if that is
/// taken). Returns the new location when something was moved.
pub fn rotate_dir(dir: &Path, now: DateTime<Local>) -> anyhow::Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }
    let stamp = now.format("%Y%m%d_%H%M%S").to_string();
    let mut target = suffixed(dir, &format!("_{}", stamp));
    let mut attempt = 1;
    while target.exists() {
        target = suffixed(dir, &format!("_{}_{}", stamp, attempt));
        attempt += 1;
    }
    fs::rename(dir, &target)
        .with_context(|| format!("rotating {} to {}", dir.display(), target.display()))?;
    Ok(Some(target))
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reflexcore::prelude::Region;
    use serde_json::Value;
    use tempfile::TempDir;

    fn at(second: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 16, 9, 30, second).unwrap()
    }

    fn report(jumps: usize) -> SessionReport {
        SessionReport {
            play_start_time: "2026-10-16 09:30:00".into(),
            total_play_time_seconds: 12.5,
            jump_count: jumps,
            debug_image_count: jumps,
            roi: Region::new(0, 0, 100, 50).unwrap(),
        }
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn reports_accumulate_across_sessions() {
        let dir = TempDir::new().unwrap();
        let report_path = dir.path().join("play_history.json");
        fs::write(&report_path, r#"{"owner": "me", "play_history": []}"#).unwrap();

        let mut store =
            JsonResultStore::create(&report_path, dir.path().join("debug"), at(0)).unwrap();
        store.append_report(&report(3)).unwrap();
        store.append_report(&report(5)).unwrap();

        let value = read_json(&report_path);
        assert_eq!(value["owner"], "me");
        assert_eq!(value["play_history"].as_array().unwrap().len(), 2);
        assert_eq!(value["play_history"][1]["jump_count"], 5);
    }

    #[test]
    fn corrupt_history_is_moved_aside() {
        let dir = TempDir::new().unwrap();
        let report_path = dir.path().join("play_history.json");
        fs::write(&report_path, "{not json").unwrap();

        let mut store =
            JsonResultStore::create(&report_path, dir.path().join("debug"), at(0)).unwrap();
        store.append_report(&report(1)).unwrap();

        let value = read_json(&report_path);
        assert_eq!(value["play_history"].as_array().unwrap().len(), 1);
        let aside = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().contains(".corrupt-"))
            .count();
        assert_eq!(aside, 1);
    }

    #[test]
    fn previous_debug_folder_is_rotated_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let debug = dir.path().join("debug_captures");
        fs::create_dir_all(&debug).unwrap();
        fs::write(debug.join("jump_0001.png"), b"old").unwrap();

        let store = JsonResultStore::create(dir.path().join("h.json"), &debug, at(5)).unwrap();

        let rotated = dir.path().join("debug_captures_20261016_093005");
        assert!(rotated.join("jump_0001.png").exists());
        assert!(store.debug_dir().exists());
        assert_eq!(fs::read_dir(store.debug_dir()).unwrap().count(), 0);

        // Same second again: the counter keeps both earlier folders.
        JsonResultStore::create(dir.path().join("h.json"), &debug, at(5)).unwrap();
        assert!(dir.path().join("debug_captures_20261016_093005_1").exists());
    }

    #[test]
    fn artifacts_are_named_by_counter_and_time() {
        let dir = TempDir::new().unwrap();
        let mut store =
            JsonResultStore::create(dir.path().join("h.json"), dir.path().join("debug"), at(0))
                .unwrap();
        let frame = Frame::from_fn(8, 4, |x, _| [x as u8 * 30, 0, 0]).unwrap();

        let path = store.persist_artifact(&frame, 7, at(5)).unwrap();

        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "jump_0007_20261016_093005_000.png"
        );
        let saved = image::open(&path).unwrap().to_rgb8();
        assert_eq!(saved.dimensions(), (8, 4));
        assert_eq!(saved.get_pixel(3, 2).0, [90, 0, 0]);
    }
}
