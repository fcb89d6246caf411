use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

/// Where a single report run is expected to write its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTarget {
    /// `{prefix}_{unix_millis}.{ext}`
    pub tmp_name: String,
    pub path: PathBuf,
}

impl ReportTarget {
    /// Compute a fresh target under `dir`. Names are unique within the process.
    pub fn new(dir: &Path, prefix: &str, extension: &str) -> Self {
        Self::with_stamp(dir, prefix, extension, next_stamp())
    }

    pub fn with_stamp(dir: &Path, prefix: &str, extension: &str, stamp: i64) -> Self {
        let tmp_name = format!("{}_{}.{}", prefix, stamp, extension);
        Self {
            path: dir.join(&tmp_name),
            tmp_name,
        }
    }
}

/// Current unix time in milliseconds, bumped past the previous value if the
/// clock has not advanced.
fn next_stamp() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let mut last = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_STAMP.compare_exchange_weak(
            last,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_name_format() {
        let target = ReportTarget::with_stamp(
            Path::new("/srv/reports"),
            "userActivity",
            "csv",
            1700000000123,
        );
        assert_eq!(target.tmp_name, "userActivity_1700000000123.csv");
        assert_eq!(target.path, PathBuf::from("/srv/reports/userActivity_1700000000123.csv"));
    }

    #[test]
    fn test_back_to_back_targets_never_collide() {
        let dir = Path::new("/tmp");
        let names: HashSet<String> = (0..500)
            .map(|_| ReportTarget::new(dir, "userActivity", "csv").tmp_name)
            .collect();
        assert_eq!(names.len(), 500);
    }

    #[test]
    fn test_stamp_tracks_wall_clock() {
        let before = chrono::Utc::now().timestamp_millis();
        let stamp = next_stamp();
        assert!(stamp >= before);
    }
}
