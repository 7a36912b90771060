//! Human-readable stdout output: per-job lines, dry-run listing, summary.

use std::path::Path;

use camera_pdfs::{JobPlan, JobReport, PeriodScan, RunSummary};

pub(crate) fn render_report_line(done: usize, total: usize, report: &JobReport) -> String {
    format!(
        "[{done}/{total}] {} {} -> {}",
        report.outcome,
        report.url,
        report.destination.display()
    )
}

pub(crate) fn render_period_line(scan: &PeriodScan) -> String {
    let noun = if scan.links == 1 { "link" } else { "links" };
    format!("leg{} {}: {} {noun}", scan.legislature, scan.period, scan.links)
}

pub(crate) fn render_plan_lines(plan: &JobPlan) -> Vec<String> {
    plan.jobs
        .iter()
        .map(|job| {
            format!(
                "{}\t{}\t{}",
                job.category,
                job.url(),
                job.destination.display()
            )
        })
        .collect()
}

pub(crate) fn render_summary_lines(summary: &RunSummary, error_log: Option<&Path>) -> Vec<String> {
    let mut lines = vec![format!(
        "Periods: {} discovered, {} scanned. Links: {} found, {} distinct documents.",
        summary.periods_discovered, summary.periods_scanned, summary.links_found, summary.jobs
    )];
    if summary.dry_run {
        lines.push("Dry run: no documents were downloaded.".to_string());
    } else {
        lines.push(format!(
            "Downloaded: {}, skipped (already present): {}, failed: {}.",
            summary.downloaded, summary.skipped, summary.failed
        ));
    }
    if summary.interrupted {
        lines.push("Interrupted. Run again to resume; finished files are kept.".to_string());
    }
    if summary.errors_logged > 0 {
        match error_log {
            Some(path) => lines.push(format!(
                "{} error(s) recorded in {}",
                summary.errors_logged,
                path.display()
            )),
            None => lines.push(format!("{} error(s) recorded", summary.errors_logged)),
        }
    }
    lines
}

pub(crate) fn print_period(scan: &PeriodScan) {
    println!("{}", render_period_line(scan));
}

pub(crate) fn print_plan(plan: &JobPlan) {
    for line in render_plan_lines(plan) {
        println!("{line}");
    }
}

pub(crate) fn print_summary(summary: &RunSummary, error_log: Option<&Path>) {
    for line in render_summary_lines(summary, error_log) {
        println!("{line}");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use camera_pdfs::{Outcome, Period};

    use super::*;

    #[test]
    fn test_report_line() {
        let report = JobReport {
            index: 0,
            url: "https://docs.example/a.pdf".to_string(),
            destination: PathBuf::from("pdfs/a.pdf"),
            outcome: Outcome::Downloaded { bytes: 12 },
        };
        assert_eq!(
            render_report_line(1, 3, &report),
            "[1/3] downloaded (12 bytes) https://docs.example/a.pdf -> pdfs/a.pdf"
        );
    }

    #[test]
    fn test_period_line() {
        let scan = PeriodScan {
            legislature: 19,
            period: Period::new(2023, 6),
            links: 3,
        };
        assert_eq!(render_period_line(&scan), "leg19 2023-06: 3 links");
        let single = PeriodScan { links: 1, ..scan };
        assert_eq!(render_period_line(&single), "leg19 2023-06: 1 link");
    }

    #[test]
    fn test_summary_mentions_error_log_only_on_errors() {
        let clean = RunSummary {
            jobs: 2,
            downloaded: 2,
            ..RunSummary::default()
        };
        let lines = render_summary_lines(&clean, Some(Path::new("pdfs/errors.log")));
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("Downloaded: 2"));

        let failing = RunSummary {
            failed: 1,
            errors_logged: 1,
            ..clean
        };
        let lines = render_summary_lines(&failing, Some(Path::new("pdfs/errors.log")));
        assert!(lines.last().unwrap().contains("pdfs/errors.log"));
    }

    #[test]
    fn test_dry_run_summary() {
        let summary = RunSummary {
            dry_run: true,
            jobs: 4,
            ..RunSummary::default()
        };
        let lines = render_summary_lines(&summary, None);
        assert!(lines[1].starts_with("Dry run"));
    }
}
