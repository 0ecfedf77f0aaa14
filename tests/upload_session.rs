mod common;

use common::bad_amounts;
use common::report;
use common::xls;
use common::xlsx;
use common::Value::Date;
use common::Value::Number;
use common::Value::Text;
use common::JAN_1_2025;
use rusty_intake::intake::Rejection;
use rusty_intake::intake::MAX_FILE_SIZE;
use rusty_intake::session::DroppedFile;
use rusty_intake::session::Selection;
use rusty_intake::session::SelectionOutcome;
use rusty_intake::session::UploadSession;
use std::sync::Arc;
use std::thread;

const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const XLS: &str = "application/vnd.ms-excel";

#[test]
fn valid_workbook_can_be_submitted() {
    let session = UploadSession::default();
    let bytes = xlsx(&report(vec![vec![Text("Alice"), Number(3.0), Date(JAN_1_2025)]]));
    let size = bytes.len() as u64;
    let selection = session.drop_files(&[DroppedFile::new("report.xlsx", Some(XLSX), bytes)]);
    assert!(selection.rejected.is_empty());
    assert_eq!(
        selection.outcome,
        SelectionOutcome::Accepted {
            file_name: "report.xlsx".to_owned(),
            size,
        }
    );
    assert!(session.can_submit());
}

#[test]
fn invalid_workbook_blocks_submission() {
    let session = UploadSession::default();
    let selection = session.drop_files(&[DroppedFile::new("report.xls", Some(XLS), xls(&bad_amounts(12)))]);
    match &selection.outcome {
        SelectionOutcome::Invalid { file_name, result } => {
            assert_eq!(file_name, "report.xls");
            assert_eq!(result.total_error_count, 12);
            assert_eq!(result.errors.len(), 11);
        }
        outcome => panic!("unexpected outcome {outcome:?}"),
    }
    assert!(!session.can_submit());
}

#[test]
fn oversized_and_extra_files_are_rejected_without_validation() {
    let session = UploadSession::default();
    let oversized = vec![0u8; MAX_FILE_SIZE as usize + 1];
    let selection = session.drop_files(&[DroppedFile::new("huge.xlsx", Some(XLSX), oversized)]);
    assert_eq!(selection.outcome, SelectionOutcome::None);
    assert_eq!(selection.rejected[0].reasons, vec![Rejection::TooLarge]);

    let bytes = xlsx(&report(Vec::new()));
    let selection = session.drop_files(&[
        DroppedFile::new("a.xlsx", Some(XLSX), bytes.clone()),
        DroppedFile::new("b.xlsx", Some(XLSX), bytes),
    ]);
    assert_eq!(selection.outcome, SelectionOutcome::None);
    assert_eq!(selection.rejected.len(), 2);
    assert!(selection.rejected.iter().all(|file| file.messages() == vec!["Too many files"]));
    assert!(!session.can_submit());
}

#[test]
fn latest_selection_wins_across_threads() {
    let session = Arc::new(UploadSession::default());
    let slow = session.begin_selection();

    let worker = {
        let session = Arc::clone(&session);
        thread::spawn(move || {
            session.drop_files(&[DroppedFile::new("new.xlsx", Some(XLSX), xlsx(&report(Vec::new())))])
        })
    };
    let published = worker.join().expect("worker thread");
    assert!(matches!(published.outcome, SelectionOutcome::Accepted { .. }));
    assert!(session.can_submit());

    assert!(!session.complete_selection(slow, Selection::default()));
    assert_eq!(session.selection(), published);
    assert!(session.can_submit());
}
