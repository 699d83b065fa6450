use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use vesselcore::prelude::{TrackingError, TrackingResult};
use vesselcore::processing::{ResultStore, ResultTable, StoredResult};
use vesselcore::schedule::{CycleReport, ResultSink, RunSummary};

/// Appends every cycle's new results to a CSV file.
///
/// The header is written only when the file does not exist yet, so repeated
/// runs keep extending the same log.
pub struct CsvSink {
    path: PathBuf,
    written: usize,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            written: 0,
        }
    }

    fn append_rows(&mut self, entries: &[StoredResult]) -> Result<(), ::csv::Error> {
        if entries.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let exists = self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = ::csv::WriterBuilder::new()
            .has_headers(!exists)
            .from_writer(file);
        for row in ResultTable::from_entries(entries).rows() {
            writer.serialize(row)?;
        }
        writer.flush()?;
        self.written += entries.len();
        Ok(())
    }
}

impl ResultSink for CsvSink {
    fn name(&self) -> &str {
        "csv-log"
    }

    fn cycle_completed(
        &mut self,
        report: &CycleReport,
        appended: &[StoredResult],
        _store: &ResultStore,
    ) -> TrackingResult<()> {
        self.append_rows(appended)
            .map_err(|err| TrackingError::Sink(format!("{}: {}", self.path.display(), err)))?;
        log::debug!(
            "cycle {} appended {} rows to {}",
            report.index,
            appended.len(),
            self.path.display()
        );
        Ok(())
    }

    fn run_finished(&mut self, _table: &ResultTable, _summary: &RunSummary) -> TrackingResult<()> {
        log::info!("{} rows logged to {}", self.written, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vesselcore::ais_interface::ObjectReport;
    use vesselcore::processing::{validate, PredictionEngine};

    fn store(ids: &[&str], cycle: usize) -> ResultStore {
        let mut store = ResultStore::new();
        for id in ids {
            let report = ObjectReport::new(*id, "BARGE", 51.9, 4.4, 45.0, 6.0, "Cargo", Utc::now());
            let predicted = PredictionEngine::new()
                .predict_state(report.validate().unwrap(), chrono::Duration::minutes(2))
                .unwrap();
            store
                .append(cycle, validate(&predicted, &report, 10.0).unwrap())
                .unwrap();
        }
        store
    }

    #[test]
    fn header_written_once_across_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/vessels.csv");

        let first = store(&["1", "2"], 0);
        let mut sink = CsvSink::new(&path);
        sink.cycle_completed(&CycleReport::new(0, Default::default()), first.entries(), &first)
            .unwrap();

        let second = store(&["3"], 1);
        let mut reopened = CsvSink::new(&path);
        reopened
            .cycle_completed(&CycleReport::new(1, Default::default()), second.entries(), &second)
            .unwrap();

        let mut reader = ::csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "cycle");
        assert_eq!(&headers[1], "identifier");
        let rows: Vec<_> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[2][0], "1");
        assert_eq!(&rows[2][1], "3");
        assert_eq!(&rows[0][16], "true");
    }

    #[test]
    fn empty_cycle_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vessels.csv");
        let mut sink = CsvSink::new(&path);
        let empty = ResultStore::new();
        sink.cycle_completed(&CycleReport::new(0, Default::default()), &[], &empty)
            .unwrap();
        assert!(!path.exists());
    }
}
