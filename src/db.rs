use std::collections::HashMap;

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::assignments::{self, AssignmentDraft};
use crate::models::{Assignment, AssignmentType, Enrollment, EnrollmentStatus, Student, TransferCredit};

/// One student's enrollments and assignments, read in a single transaction.
#[derive(Debug, Clone)]
pub struct StudentSnapshot {
    pub student: Student,
    pub enrollments: Vec<Enrollment>,
    pub assignments: HashMap<Uuid, Vec<Assignment>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;

    let students = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Avery Lee",
            "avery.lee@groupscholar.com",
            "Computer Science",
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Jules Moreno",
            "jules.moreno@groupscholar.com",
            "History",
        ),
    ];
    for (id, name, email, program) in students {
        upsert_student(&mut tx, id, name, email, program).await?;
    }

    let courses = vec![
        ("CS101", "Introduction to Programming", "2026S", 3),
        ("MATH201", "Linear Algebra", "2026S", 4),
        ("HIST110", "World History", "2026S", 3),
        ("ENG100", "Academic Writing", "2025F", 3),
    ];
    for (code, title, semester, credits) in courses {
        upsert_course(&mut tx, code, title, semester, credits).await?;
    }

    let enrollments = vec![
        ("avery.lee@groupscholar.com", "CS101", "2026S", EnrollmentStatus::Active, None),
        ("avery.lee@groupscholar.com", "MATH201", "2026S", EnrollmentStatus::Active, None),
        ("avery.lee@groupscholar.com", "HIST110", "2026S", EnrollmentStatus::Dropped, None),
        (
            "avery.lee@groupscholar.com",
            "ENG100",
            "2025F",
            EnrollmentStatus::Completed,
            Some(("B", 3.0)),
        ),
        ("jules.moreno@groupscholar.com", "HIST110", "2026S", EnrollmentStatus::Active, None),
    ];
    for (email, code, semester, status, transfer) in enrollments {
        let course_id = course_id(&mut tx, code, semester).await?;
        let student_id: Uuid = sqlx::query("SELECT id FROM gradebook.students WHERE email = $1")
            .bind(email)
            .fetch_one(&mut *tx)
            .await?
            .get("id");

        sqlx::query(
            r#"
            INSERT INTO gradebook.enrollments
            (id, student_id, course_id, status, transfer_label, transfer_grade_point)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (student_id, course_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(course_id)
        .bind(status.as_str())
        .bind(transfer.map(|(label, _)| label))
        .bind(transfer.map(|(_, points)| points))
        .execute(&mut *tx)
        .await?;
    }

    let grades = vec![
        ("seed-001", "avery.lee@groupscholar.com", "CS101", "2026S", "exam", "Midterm", 92.0),
        ("seed-002", "avery.lee@groupscholar.com", "CS101", "2026S", "project", "Compiler", 88.0),
        ("seed-003", "avery.lee@groupscholar.com", "MATH201", "2026S", "quiz", "Quiz 1", 71.0),
        ("seed-004", "avery.lee@groupscholar.com", "HIST110", "2026S", "exam", "Midterm", 45.0),
        ("seed-005", "jules.moreno@groupscholar.com", "HIST110", "2026S", "assignment", "Essay", 83.5),
    ];
    for (source_key, email, code, semester, kind, name, score) in grades {
        let enrollment_id = enrollment_id(&mut tx, email, code, semester).await?;
        let assignment = assignments::record_assignment(
            AssignmentDraft {
                enrollment_id,
                kind: kind.parse()?,
                name: name.to_string(),
                score,
                comments: None,
                graded_date: NaiveDate::from_ymd_opt(2026, 3, 2).context("invalid date")?,
                days_late: 0,
            },
            None,
        )?;
        insert_assignment(&mut tx, &assignment, Some(source_key)).await?;
    }

    tx.commit().await?;
    Ok(())
}

async fn upsert_student(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    full_name: &str,
    email: &str,
    program: &str,
) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO gradebook.students (id, full_name, email, program)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            program = COALESCE(NULLIF(EXCLUDED.program, ''), gradebook.students.program)
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(full_name)
    .bind(email)
    .bind(program)
    .fetch_one(&mut **tx)
    .await?
    .get("id");

    Ok(id)
}

async fn upsert_course(
    tx: &mut Transaction<'_, Postgres>,
    code: &str,
    title: &str,
    semester: &str,
    credits: i32,
) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO gradebook.courses (id, code, semester, title, credits)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (code, semester) DO UPDATE
        SET title = EXCLUDED.title, credits = EXCLUDED.credits
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(code)
    .bind(semester)
    .bind(title)
    .bind(credits)
    .fetch_one(&mut **tx)
    .await?
    .get("id");

    Ok(id)
}

async fn course_id(
    tx: &mut Transaction<'_, Postgres>,
    code: &str,
    semester: &str,
) -> anyhow::Result<Uuid> {
    let row = sqlx::query("SELECT id FROM gradebook.courses WHERE code = $1 AND semester = $2")
        .bind(code)
        .bind(semester)
        .fetch_optional(&mut **tx)
        .await?
        .with_context(|| format!("no course {code} in semester {semester}"))?;

    Ok(row.get("id"))
}

async fn enrollment_id(
    tx: &mut Transaction<'_, Postgres>,
    email: &str,
    code: &str,
    semester: &str,
) -> anyhow::Result<Uuid> {
    let row = sqlx::query(
        "SELECT e.id FROM gradebook.enrollments e \
         JOIN gradebook.students s ON s.id = e.student_id \
         JOIN gradebook.courses c ON c.id = e.course_id \
         WHERE s.email = $1 AND c.code = $2 AND c.semester = $3",
    )
    .bind(email)
    .bind(code)
    .bind(semester)
    .fetch_optional(&mut **tx)
    .await?
    .with_context(|| format!("{email} is not enrolled in {code} ({semester})"))?;

    Ok(row.get("id"))
}

async fn insert_assignment(
    tx: &mut Transaction<'_, Postgres>,
    assignment: &Assignment,
    source_key: Option<&str>,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO gradebook.assignments
        (id, enrollment_id, assignment_type, name, score, comments, graded_date, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(assignment.id)
    .bind(assignment.enrollment_id)
    .bind(assignment.kind.as_str())
    .bind(&assignment.name)
    .bind(assignment.score)
    .bind(&assignment.comments)
    .bind(assignment.graded_date)
    .bind(source_key)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Record one professor-submitted grade for the student's enrollment in
/// `course_code` during `semester`.
pub async fn record_grade(
    pool: &PgPool,
    email: &str,
    course_code: &str,
    semester: &str,
    draft: impl FnOnce(Uuid) -> AssignmentDraft,
    late_penalty_percent_per_day: Option<f64>,
) -> anyhow::Result<Assignment> {
    let mut tx = pool.begin().await?;
    let enrollment_id = enrollment_id(&mut tx, email, course_code, semester).await?;
    let assignment = assignments::record_assignment(draft(enrollment_id), late_penalty_percent_per_day)?;
    insert_assignment(&mut tx, &assignment, None).await?;
    tx.commit().await?;
    Ok(assignment)
}

/// A transfer enrollment needs both its label and its grade point.
fn transfer_credit(
    label: Option<String>,
    grade_point: Option<f64>,
) -> anyhow::Result<Option<TransferCredit>> {
    match (label, grade_point) {
        (Some(label), Some(grade_point)) => Ok(Some(TransferCredit { label, grade_point })),
        (None, None) => Ok(None),
        (Some(label), None) => {
            anyhow::bail!("transfer label '{label}' has no transfer grade point")
        }
        (None, Some(grade_point)) => {
            anyhow::bail!("transfer grade point {grade_point} has no transfer label")
        }
    }
}

pub async fn load_snapshot(pool: &PgPool, email: &str) -> anyhow::Result<StudentSnapshot> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
        .execute(&mut *tx)
        .await?;

    let row = sqlx::query(
        "SELECT id, full_name, email, program FROM gradebook.students WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(&mut *tx)
    .await?
    .with_context(|| format!("no student with email {email}"))?;

    let student = Student {
        id: row.get("id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        program: row.get("program"),
    };

    let rows = sqlx::query(
        "SELECT e.id, e.student_id, e.course_id, c.code, c.semester, c.credits, e.status, \
         e.transfer_label, e.transfer_grade_point \
         FROM gradebook.enrollments e \
         JOIN gradebook.courses c ON c.id = e.course_id \
         WHERE e.student_id = $1 \
         ORDER BY c.semester, c.code",
    )
    .bind(student.id)
    .fetch_all(&mut *tx)
    .await?;

    let mut enrollments = Vec::new();
    for row in rows {
        let status: String = row.get("status");
        let credits: i32 = row.get("credits");
        let transfer_label: Option<String> = row.get("transfer_label");
        let transfer_grade_point: Option<f64> = row.get("transfer_grade_point");

        let id: Uuid = row.get("id");

        enrollments.push(Enrollment {
            id,
            student_id: row.get("student_id"),
            course_id: row.get("course_id"),
            course_code: row.get("code"),
            semester: row.get("semester"),
            credits: u32::try_from(credits).context("negative credits in gradebook.courses")?,
            status: status.parse()?,
            transfer: transfer_credit(transfer_label, transfer_grade_point)
                .with_context(|| format!("enrollment {id}"))?,
        });
    }

    let enrollment_ids: Vec<Uuid> = enrollments.iter().map(|e| e.id).collect();
    let rows = sqlx::query(
        "SELECT id, enrollment_id, assignment_type, name, score, comments, graded_date \
         FROM gradebook.assignments \
         WHERE enrollment_id = ANY($1) \
         ORDER BY graded_date, name",
    )
    .bind(enrollment_ids.as_slice())
    .fetch_all(&mut *tx)
    .await?;

    let mut assignments: HashMap<Uuid, Vec<Assignment>> = HashMap::new();
    for row in rows {
        let kind: String = row.get("assignment_type");
        let assignment = Assignment {
            id: row.get("id"),
            enrollment_id: row.get("enrollment_id"),
            kind: kind.parse::<AssignmentType>()?,
            name: row.get("name"),
            score: row.get("score"),
            comments: row.get("comments"),
            graded_date: row.get("graded_date"),
        };
        assignments
            .entry(assignment.enrollment_id)
            .or_default()
            .push(assignment);
    }

    tx.commit().await?;

    tracing::debug!(
        student = %student.email,
        enrollments = enrollments.len(),
        "loaded grade snapshot"
    );

    Ok(StudentSnapshot {
        student,
        enrollments,
        assignments,
    })
}

pub async fn import_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
    late_penalty_percent_per_day: Option<f64>,
) -> anyhow::Result<ImportSummary> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        email: String,
        course_code: String,
        course_title: String,
        semester: String,
        credits: u32,
        assignment_type: String,
        name: String,
        score: f64,
        comments: Option<String>,
        graded_date: NaiveDate,
        days_late: Option<u32>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut summary = ImportSummary::default();
    let mut tx = pool.begin().await?;

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("malformed row on line {line}"))?;

        let kind = match row.assignment_type.parse::<AssignmentType>() {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!(line, "skipping row: {e}");
                summary.rejected += 1;
                continue;
            }
        };
        if let Err(e) = assignments::check_credits(row.credits) {
            tracing::warn!(line, "skipping row: {e}");
            summary.rejected += 1;
            continue;
        }

        let draft = AssignmentDraft {
            enrollment_id: Uuid::nil(),
            kind,
            name: row.name,
            score: row.score,
            comments: row.comments,
            graded_date: row.graded_date,
            days_late: row.days_late.unwrap_or(0),
        };
        let mut assignment =
            match assignments::record_assignment(draft, late_penalty_percent_per_day) {
                Ok(assignment) => assignment,
                Err(e) => {
                    tracing::warn!(line, "skipping row: {e}");
                    summary.rejected += 1;
                    continue;
                }
            };

        let student_id =
            upsert_student(&mut tx, Uuid::new_v4(), &row.full_name, &row.email, "").await?;
        let course_id = upsert_course(
            &mut tx,
            &row.course_code,
            &row.course_title,
            &row.semester,
            i32::try_from(row.credits).context("credits out of range")?,
        )
        .await?;

        let enrollment_id: Uuid = sqlx::query(
            r#"
            INSERT INTO gradebook.enrollments (id, student_id, course_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (student_id, course_id) DO UPDATE SET student_id = EXCLUDED.student_id
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await?
        .get("id");

        assignment.enrollment_id = enrollment_id;
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));
        if insert_assignment(&mut tx, &assignment, Some(&source_key)).await? {
            summary.inserted += 1;
        } else {
            summary.duplicates += 1;
        }
    }

    tx.commit().await?;
    Ok(summary)
}
