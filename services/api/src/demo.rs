use crate::infra::{parse_amount, parse_date, InMemoryStore, LoggingNotifier};
use chrono::{Local, NaiveDate, NaiveTime};
use clap::Args;
use iskolar::error::AppError;
use iskolar::workflows::scholarship::{
    format_peso, parse_releases_from_path, releases_for_view, AdminContext, AdminRole,
    ApplicantAttributes, ApplicantIdentity, ApplicationFilter, ApplicationSubmission,
    BudgetSummary, CriteriaConfig, CriterionKind, CriterionStatus, EligibilityEvaluator,
    EligibilityReport, Release, ReleaseDraft, ReleaseView, ReviewDecision, ScholarshipService,
    SemesterBudget, SemesterId, UserId,
};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct BudgetReportArgs {
    /// Semester budget ceiling, e.g. 150000 or ₱150,000.00
    #[arg(long, value_parser = parse_amount)]
    pub(crate) budget: Decimal,
    /// Release schedule CSV export
    #[arg(long)]
    pub(crate) releases: PathBuf,
    /// Semester label attached to the imported releases
    #[arg(long, default_value = "current")]
    pub(crate) semester: String,
    /// Reference date for marking releases as done (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Semester budget used for the release portion of the demo
    #[arg(long, value_parser = parse_amount, default_value = "100000")]
    pub(crate) budget: Decimal,
    /// Skip the release scheduling portion of the demo
    #[arg(long)]
    pub(crate) skip_releases: bool,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            budget: Decimal::from(100_000),
            skip_releases: false,
        }
    }
}

pub(crate) fn run_budget_report(args: BudgetReportArgs) -> Result<(), AppError> {
    let BudgetReportArgs {
        budget,
        releases,
        semester,
        today,
    } = args;

    let semester_id = SemesterId(semester);
    let budget = SemesterBudget::new(budget).map_err(|err| AppError::Service(err.into()))?;
    let releases = parse_releases_from_path(&releases, &semester_id)?;
    let today = today.unwrap_or_else(|| Local::now().date_naive());

    let summary = BudgetSummary::compute(semester_id, Some(budget), &releases);
    render_budget_summary(&summary);
    render_release_tabs(&releases, today);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        budget,
        skip_releases,
    } = args;

    println!("IskoLAR back office demo");
    let store = Arc::new(InMemoryStore::default());
    let notifier = Arc::new(LoggingNotifier::default());
    let evaluator = EligibilityEvaluator::new(CriteriaConfig::default())
        .map_err(|err| AppError::Service(err.into()))?;
    let service = ScholarshipService::new(store, notifier.clone(), evaluator);
    let reviewer = AdminContext {
        admin_id: "demo-admin".to_string(),
        email: Some("admin@iskolar.example".to_string()),
        role: AdminRole::Admin,
    };
    let semester = SemesterId("2025-1".to_string());

    println!("\nApplication intake");
    let mut records = Vec::new();
    for submission in demo_submissions(&semester) {
        match service.submit(submission) {
            Ok(record) => {
                println!(
                    "- {} ({}, {}) -> {} / eligibility {}",
                    record.application_id,
                    record.applicant.full_name(),
                    record.applicant.barangay,
                    record.status.label(),
                    record.eligibility.overall().label()
                );
                render_eligibility(&record.eligibility);
                records.push(record);
            }
            Err(err) => println!("- Submission rejected: {err}"),
        }
    }

    println!("\nManual review");
    if let Some(borderline) = records
        .iter()
        .find(|record| record.eligibility.overall() == CriterionStatus::Attention)
    {
        let report = service.override_criterion(
            &reviewer,
            &borderline.application_id,
            CriterionKind::FamilyIncome,
            CriterionStatus::Passed,
            Some("income certificate verified by barangay".to_string()),
        )?;
        for entry in report.audit_trail() {
            println!(
                "- {} {} {:?}: computed {} -> overridden {} by {}",
                borderline.application_id,
                entry.criterion.label(),
                entry.action,
                entry.computed.label(),
                entry
                    .overridden_to
                    .map(CriterionStatus::label)
                    .unwrap_or("cleared"),
                entry.set_by
            );
        }
    }

    for record in &records {
        let current = service.get(&record.application_id)?;
        let decision = if current.eligibility.overall() == CriterionStatus::Failed {
            ReviewDecision::Reject {
                reason: Some("does not meet eligibility criteria".to_string()),
            }
        } else {
            ReviewDecision::Approve
        };
        let reviewed = service.review(&reviewer, &record.application_id, decision)?;
        println!(
            "- {} {}{}",
            reviewed.application_id,
            reviewed.status.label(),
            reviewed
                .rejection_reason
                .as_deref()
                .map(|reason| format!(" ({reason})"))
                .unwrap_or_default()
        );
    }

    let page = service.list_applications(Some(&semester), &ApplicationFilter::default(), 1)?;
    println!(
        "\nApplication table: page {}/{} ({} total)",
        page.page,
        page.total_pages.max(1),
        page.total_items
    );
    for item in &page.items {
        println!(
            "  - {} | {} | {} | {}",
            item.name,
            item.school,
            item.status.label(),
            item.eligibility.label()
        );
    }

    let events = notifier.events();
    if events.is_empty() {
        println!("  Notifications: none dispatched");
    } else {
        println!("  Notifications:");
        for event in events {
            println!(
                "    - template={} -> {}",
                event.template,
                event.recipient.as_deref().unwrap_or("(no address)")
            );
        }
    }

    if skip_releases {
        return Ok(());
    }

    println!("\nRelease schedule");
    let allowance = service.create_release(
        &reviewer,
        &semester,
        demo_release("allowance", (2025, 9, 15), "Ususan", 1_000, Some(5)),
    )?;
    let books = service.create_release(
        &reviewer,
        &semester,
        demo_release("book allowance", (2025, 8, 20), "Wawa", 2_000, Some(2)),
    )?;
    service.set_archived(&reviewer, books.release_id, true)?;
    println!(
        "- scheduled {} and archived {}",
        allowance.release_id, books.release_id
    );

    let summary = service.budget_summary(&semester, Some(budget))?;
    render_budget_summary(&summary);

    service.set_archived(&reviewer, books.release_id, false)?;
    let summary = service.budget_summary(&semester, Some(budget))?;
    println!("After restoring release {}:", books.release_id);
    render_budget_summary(&summary);

    let today = Local::now().date_naive();
    let mut releases = service.releases(&semester, ReleaseView::Active)?;
    releases.extend(service.releases(&semester, ReleaseView::Archived)?);
    render_release_tabs(&releases, today);

    Ok(())
}

fn render_eligibility(report: &EligibilityReport) {
    for assessment in report.assessments.values() {
        if assessment.computed != CriterionStatus::Passed {
            println!(
                "    {} {}: {}",
                assessment.criterion.label(),
                assessment.computed.label(),
                assessment.notes
            );
        }
    }
}

fn render_budget_summary(summary: &BudgetSummary) {
    println!("Semester {} budget", summary.semester_id);
    if let Some(budget) = summary.budget {
        println!("- Budget:            {}", format_peso(budget));
    }
    println!("- Total active:      {}", format_peso(summary.total_active));
    if let Some(remaining) = summary.remaining {
        let marker = if summary.over_budget {
            " (over budget)"
        } else {
            ""
        };
        println!("- Remaining:         {}{marker}", format_peso(remaining));
    }
    println!(
        "- Releases:          {} active / {} archived, {} recipients",
        summary.active_releases, summary.archived_releases, summary.active_recipients
    );
}

fn render_release_tabs(releases: &[Release], today: NaiveDate) {
    let now = today.and_time(NaiveTime::MIN);
    for (title, view) in [
        ("Active releases", ReleaseView::Active),
        ("Archived releases", ReleaseView::Archived),
    ] {
        let tab = releases_for_view(releases, view);
        println!("{title} ({})", tab.len());
        for release in tab {
            let done = if release.is_done(now) { " [Done]" } else { "" };
            println!(
                "  - #{} {} {} {} @ {} | {} x {} = {}{done}",
                release.release_id,
                release.release_date,
                release.release_time.format("%H:%M"),
                release.release_type,
                release.barangay,
                format_peso(release.amount_per_student),
                release
                    .recipients
                    .map(|count| count.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                format_peso(release.payout())
            );
        }
    }
}

fn demo_submissions(semester: &SemesterId) -> Vec<ApplicationSubmission> {
    let base = ApplicantAttributes {
        years_of_residency: 6,
        registered_voter: true,
        monthly_family_income: Decimal::from(16_000),
        age: 19,
        gpa: 3.2,
        enrolled: true,
        enrolled_units: 21,
        has_failing_grades: false,
        awaiting_documents: BTreeSet::new(),
    };

    let borderline = ApplicantAttributes {
        monthly_family_income: Decimal::from(24_600),
        ..base.clone()
    };
    let over_income = ApplicantAttributes {
        monthly_family_income: Decimal::from(31_000),
        awaiting_documents: BTreeSet::from([CriterionKind::Residency]),
        ..base.clone()
    };

    [
        ("Maria", "Santos", "Ususan", base),
        ("Jose", "Reyes", "Wawa", borderline),
        ("Andrea", "Cruz", "Bagumbayan", over_income),
    ]
    .into_iter()
    .enumerate()
    .map(
        |(index, (first, last, barangay, attributes))| ApplicationSubmission {
            semester_id: semester.clone(),
            user_id: UserId(format!("demo-user-{}", index + 1)),
            applicant: ApplicantIdentity {
                first_name: first.to_string(),
                last_name: last.to_string(),
                barangay: barangay.to_string(),
                school: "Taguig City University".to_string(),
                email_address: format!("{}@example.ph", first.to_lowercase()),
            },
            attributes,
        },
    )
    .collect()
}

fn demo_release(
    release_type: &str,
    (year, month, day): (i32, u32, u32),
    barangay: &str,
    amount: i64,
    recipients: Option<u32>,
) -> ReleaseDraft {
    ReleaseDraft {
        release_type: release_type.to_string(),
        release_date: NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default(),
        release_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
        barangay: barangay.to_string(),
        location: "Barangay Hall".to_string(),
        amount_per_student: Decimal::from(amount),
        recipients,
        additional_notes: None,
    }
}
