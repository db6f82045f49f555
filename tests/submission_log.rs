use cardr::{card::CardRequest, submission_log::SubmissionLog};
use std::sync::Arc;

#[test]
fn concurrent_appends_are_not_interleaved() {
    let directory = tempfile::tempdir().unwrap();
    let submission_log = Arc::new(SubmissionLog::new(
        directory.path().join("submissions_log.csv"),
    ));

    let workers: Vec<_> = (0..4)
        .map(|worker_index| {
            let submission_log = submission_log.clone();
            std::thread::spawn(move || {
                for request_index in 0..10 {
                    let request = CardRequest {
                        name: format!("Worker {} request {}", worker_index, request_index),
                        role: "Engineer, Platform".into(),
                        email: "worker@example.com".into(),
                        phone: "123".into(),
                    };
                    submission_log.append(&request).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let log_contents = std::fs::read_to_string(submission_log.path()).unwrap();
    assert_eq!(log_contents.lines().count(), 41);
    assert_eq!(
        log_contents.lines().next().unwrap(),
        "Full Name,Role,Email,Contact Number,Submission Time"
    );

    let records = submission_log.records().unwrap();
    assert_eq!(records.len(), 40);
    assert!(records.iter().all(|record| record.role == "Engineer, Platform"));
    assert!(records
        .windows(2)
        .all(|pair| pair[0].submission_time <= pair[1].submission_time));
}

#[test]
fn existing_logs_are_appended_to() {
    let directory = tempfile::tempdir().unwrap();
    let log_path = directory.path().join("submissions_log.csv");
    let request = CardRequest {
        name: "Ada Lovelace".into(),
        role: "Analyst".into(),
        email: "ada@example.com".into(),
        phone: "1815".into(),
    };

    SubmissionLog::new(log_path.clone()).append(&request).unwrap();
    let record = SubmissionLog::new(log_path.clone()).append(&request).unwrap();

    let log_contents = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(log_contents.lines().count(), 3);
    assert!(log_contents.ends_with(&format!(
        "Ada Lovelace,Analyst,ada@example.com,1815,{}\n",
        record.submission_time
    )));
}
